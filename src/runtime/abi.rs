//! Minimal Solidity ABI support: signature hashing, 32-byte word codec and
//! head/tail encoding for the types a query can declare.

use num_bigint::{BigInt, Sign};
use num_traits::{One, Signed, ToPrimitive};
use sha3::{Digest, Keccak256};

use crate::program::ProgramError;
use crate::types::{SolidityType, Value};

const WORD: usize = 32;

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// `Name(type1,type2)` with canonical type names.
pub fn canonical_signature(name: &str, types: &[SolidityType]) -> String {
    let types: Vec<String> = types.iter().map(|t| t.to_string()).collect();
    format!("{}({})", name, types.join(","))
}

pub fn event_topic(signature: &str) -> [u8; 32] {
    keccak256(signature.as_bytes())
}

pub fn function_selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

fn decode_error(what: &SolidityType, message: impl Into<String>) -> ProgramError {
    ProgramError::Decode {
        what: what.to_string(),
        message: message.into(),
    }
}

// ── Decoding ────────────────────────────────────────────────────────────

/// Indexed parameters of dynamic type are stored as their keccak hash, so
/// they decode to the raw 32-byte topic.
pub fn decode_topic(ty: &SolidityType, topic: &[u8]) -> Result<Value, ProgramError> {
    if topic.len() != WORD {
        return Err(decode_error(ty, format!("topic has {} bytes", topic.len())));
    }
    if ty.is_dynamic() {
        return Ok(Value::Bytes(topic.to_vec()));
    }
    decode_word(ty, topic)
}

pub fn decode_data(types: &[SolidityType], data: &[u8]) -> Result<Vec<Value>, ProgramError> {
    decode_tuple(types, data, 0)
}

fn decode_tuple(types: &[SolidityType], data: &[u8], base: usize) -> Result<Vec<Value>, ProgramError> {
    types
        .iter()
        .enumerate()
        .map(|(i, ty)| {
            let at = i
                .checked_mul(WORD)
                .and_then(|rel| base.checked_add(rel))
                .ok_or_else(|| out_of_range(ty))?;
            let head = read_word(ty, data, at)?;
            if ty.is_dynamic() {
                let offset = word_to_usize(ty, head)?;
                let at = base.checked_add(offset).ok_or_else(|| out_of_range(ty))?;
                decode_dynamic(ty, data, at)
            } else {
                decode_word(ty, head)
            }
        })
        .collect()
}

fn decode_dynamic(ty: &SolidityType, data: &[u8], at: usize) -> Result<Value, ProgramError> {
    let len = word_to_usize(ty, read_word(ty, data, at)?)?;
    // read_word succeeded, so `at + WORD` is within the data
    let start = at + WORD;
    let available = data.len().saturating_sub(start);
    match ty {
        SolidityType::Array(element) => {
            // every element occupies at least one head word
            if len.checked_mul(WORD).map_or(true, |size| size > available) {
                return Err(decode_error(ty, format!("length {} runs past the end of the data", len)));
            }
            let types = vec![element.as_ref().clone(); len];
            decode_tuple(&types, data, start).map(Value::Array)
        }
        _ => {
            if len > available {
                return Err(decode_error(ty, format!("length {} runs past the end of the data", len)));
            }
            let bytes = data
                .get(start..start + len)
                .ok_or_else(|| decode_error(ty, "content runs past the end of the data"))?;
            if *ty == SolidityType::String {
                String::from_utf8(bytes.to_vec())
                    .map(Value::Str)
                    .map_err(|_| decode_error(ty, "invalid utf-8"))
            } else {
                Ok(Value::Bytes(bytes.to_vec()))
            }
        }
    }
}

fn read_word<'d>(ty: &SolidityType, data: &'d [u8], at: usize) -> Result<&'d [u8], ProgramError> {
    at.checked_add(WORD)
        .and_then(|end| data.get(at..end))
        .ok_or_else(|| decode_error(ty, format!("no word at offset {}", at)))
}

fn out_of_range(ty: &SolidityType) -> ProgramError {
    decode_error(ty, "offset out of range")
}

fn word_to_usize(ty: &SolidityType, word: &[u8]) -> Result<usize, ProgramError> {
    BigInt::from_bytes_be(Sign::Plus, word)
        .to_usize()
        .ok_or_else(|| decode_error(ty, "offset or length out of range"))
}

pub fn decode_word(ty: &SolidityType, word: &[u8]) -> Result<Value, ProgramError> {
    match ty {
        SolidityType::Address => Ok(Value::Address(word[WORD - 20..].to_vec())),
        SolidityType::Bool => Ok(Value::Bool(word.iter().any(|b| *b != 0))),
        SolidityType::Int { signed: false, .. } => Ok(Value::Int(BigInt::from_bytes_be(Sign::Plus, word))),
        SolidityType::Int { signed: true, .. } => Ok(Value::Int(BigInt::from_signed_bytes_be(word))),
        SolidityType::Bytes(Some(len)) => Ok(Value::Bytes(word[..*len as usize].to_vec())),
        _ => Err(decode_error(ty, "not a single-word type")),
    }
}

// ── Encoding ────────────────────────────────────────────────────────────

/// Head/tail encoding of a parameter list.
pub fn encode(params: &[(SolidityType, Value)]) -> Result<Vec<u8>, ProgramError> {
    let mut head = Vec::with_capacity(params.len() * WORD);
    let mut tail = Vec::new();
    for (ty, value) in params {
        if ty.is_dynamic() {
            head.extend_from_slice(&usize_word(params.len() * WORD + tail.len()));
            tail.extend(encode_dynamic(ty, value)?);
        } else {
            head.extend_from_slice(&encode_word(ty, value)?);
        }
    }
    head.extend(tail);
    Ok(head)
}

/// Function selector followed by the encoded arguments.
pub fn encode_call(signature: &str, params: &[(SolidityType, Value)]) -> Result<Vec<u8>, ProgramError> {
    let mut calldata = function_selector(signature).to_vec();
    calldata.extend(encode(params)?);
    Ok(calldata)
}

fn encode_dynamic(ty: &SolidityType, value: &Value) -> Result<Vec<u8>, ProgramError> {
    match (ty, value) {
        (SolidityType::Array(element), Value::Array(items)) => {
            let mut out = usize_word(items.len()).to_vec();
            let params: Vec<(SolidityType, Value)> = items
                .iter()
                .map(|item| (element.as_ref().clone(), item.clone()))
                .collect();
            out.extend(encode(&params)?);
            Ok(out)
        }
        (SolidityType::String, Value::Str(s)) => Ok(padded_bytes(s.as_bytes())),
        (SolidityType::Bytes(None), Value::Bytes(b)) => Ok(padded_bytes(b)),
        _ => Err(encode_error(ty, value)),
    }
}

fn padded_bytes(bytes: &[u8]) -> Vec<u8> {
    let mut out = usize_word(bytes.len()).to_vec();
    out.extend_from_slice(bytes);
    let padding = (WORD - bytes.len() % WORD) % WORD;
    out.resize(out.len() + padding, 0);
    out
}

pub fn encode_word(ty: &SolidityType, value: &Value) -> Result<[u8; 32], ProgramError> {
    let mut word = [0u8; WORD];
    match (ty, value) {
        (SolidityType::Address, Value::Address(bytes)) if bytes.len() == 20 => {
            word[WORD - 20..].copy_from_slice(bytes);
        }
        (SolidityType::Bool, Value::Bool(b)) => word[WORD - 1] = u8::from(*b),
        (SolidityType::Int { .. }, Value::Int(n)) => {
            let n = if n.is_negative() {
                (BigInt::one() << 256) + n
            } else {
                n.clone()
            };
            let (_, bytes) = n.to_bytes_be();
            if bytes.len() > WORD {
                return Err(encode_error(ty, value));
            }
            word[WORD - bytes.len()..].copy_from_slice(&bytes);
        }
        (SolidityType::Bytes(Some(len)), Value::Bytes(bytes)) if bytes.len() == *len as usize => {
            word[..bytes.len()].copy_from_slice(bytes);
        }
        _ => return Err(encode_error(ty, value)),
    }
    Ok(word)
}

fn usize_word(n: usize) -> [u8; 32] {
    let mut word = [0u8; WORD];
    word[WORD - 8..].copy_from_slice(&(n as u64).to_be_bytes());
    word
}

fn encode_error(ty: &SolidityType, value: &Value) -> ProgramError {
    ProgramError::type_error(format!("cannot encode {} as {}", value.type_name(), ty))
}
