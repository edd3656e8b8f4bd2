//! Built-in functions callable from queries.
//!
//! Overloads are resolved by static argument types during analysis; the
//! composer stores the resolved entry so the interpreter never dispatches by
//! name.

use std::fmt;

use num_bigint::BigInt;
use num_traits::Zero;
use regex::Regex;

use crate::program::ProgramError;
use crate::types::{SolidityType, Value};
use self::ParamKind as P;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Integer,
    String,
    Address,
    Bool,
    Bytes,
}

impl ParamKind {
    pub fn accepts(&self, ty: &SolidityType) -> bool {
        match self {
            ParamKind::Integer => ty.is_integer(),
            ParamKind::String => *ty == SolidityType::String,
            ParamKind::Address => ty.is_address(),
            ParamKind::Bool => ty.is_bool(),
            ParamKind::Bytes => matches!(ty, SolidityType::Bytes(_)),
        }
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParamKind::Integer => "int",
            ParamKind::String => "string",
            ParamKind::Address => "address",
            ParamKind::Bool => "bool",
            ParamKind::Bytes => "bytes",
        };
        write!(f, "{}", name)
    }
}

pub type LibraryFn = fn(&[Value]) -> Result<Value, ProgramError>;

#[derive(Debug)]
pub struct LibraryMethod {
    pub name: &'static str,
    pub params: &'static [ParamKind],
    pub returns: SolidityType,
    pub func: LibraryFn,
}

impl LibraryMethod {
    pub fn invoke(&self, args: &[Value]) -> Result<Value, ProgramError> {
        (self.func)(args)
    }

    pub fn accepts(&self, arg_types: &[SolidityType]) -> bool {
        self.params.len() == arg_types.len()
            && self.params.iter().zip(arg_types).all(|(p, t)| p.accepts(t))
    }
}

impl fmt::Display for LibraryMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params: Vec<String> = self.params.iter().map(|p| p.to_string()).collect();
        write!(f, "{}({}) -> {}", self.name, params.join(", "), self.returns)
    }
}

const INT256: SolidityType = SolidityType::Int {
    signed: true,
    bits: 256,
};
const UINT256: SolidityType = SolidityType::Int {
    signed: false,
    bits: 256,
};

static METHODS: &[LibraryMethod] = &[
    // ── Arithmetic ──────────────────────────────────────────────────────
    LibraryMethod { name: "add", params: &[P::Integer, P::Integer], returns: INT256, func: int_add },
    LibraryMethod { name: "subtract", params: &[P::Integer, P::Integer], returns: INT256, func: int_subtract },
    LibraryMethod { name: "multiply", params: &[P::Integer, P::Integer], returns: INT256, func: int_multiply },
    LibraryMethod { name: "divide", params: &[P::Integer, P::Integer], returns: INT256, func: int_divide },
    LibraryMethod { name: "modulo", params: &[P::Integer, P::Integer], returns: INT256, func: int_modulo },
    LibraryMethod { name: "isZero", params: &[P::Integer], returns: SolidityType::Bool, func: int_is_zero },
    // ── Text ────────────────────────────────────────────────────────────
    LibraryMethod { name: "concat", params: &[P::String, P::String], returns: SolidityType::String, func: text_concat },
    LibraryMethod { name: "lowercase", params: &[P::String], returns: SolidityType::String, func: text_lowercase },
    LibraryMethod { name: "matches", params: &[P::String, P::String], returns: SolidityType::Bool, func: text_matches },
    LibraryMethod { name: "length", params: &[P::String], returns: UINT256, func: text_length },
    LibraryMethod { name: "length", params: &[P::Bytes], returns: UINT256, func: bytes_length },
    // ── Conversion ──────────────────────────────────────────────────────
    LibraryMethod { name: "toString", params: &[P::Integer], returns: SolidityType::String, func: to_string },
    LibraryMethod { name: "toString", params: &[P::Address], returns: SolidityType::String, func: to_string },
    LibraryMethod { name: "toString", params: &[P::Bool], returns: SolidityType::String, func: to_string },
    LibraryMethod { name: "toString", params: &[P::Bytes], returns: SolidityType::String, func: to_string },
    LibraryMethod { name: "toString", params: &[P::String], returns: SolidityType::String, func: to_string },
];

pub fn methods() -> &'static [LibraryMethod] {
    METHODS
}

pub fn has_method(name: &str) -> bool {
    METHODS.iter().any(|m| m.name == name)
}

/// First overload of `name` whose parameters accept the argument types.
pub fn resolve(name: &str, arg_types: &[SolidityType]) -> Option<&'static LibraryMethod> {
    METHODS
        .iter()
        .find(|m| m.name == name && m.accepts(arg_types))
}

// ── Argument helpers ────────────────────────────────────────────────────

fn library_error(method: &str, message: impl Into<String>) -> ProgramError {
    ProgramError::Library {
        method: method.to_string(),
        message: message.into(),
    }
}

fn get_int<'a>(args: &'a [Value], idx: usize, name: &str) -> Result<&'a BigInt, ProgramError> {
    args.get(idx)
        .and_then(Value::as_int)
        .ok_or_else(|| library_error(name, format!("argument {} must be an integer", idx + 1)))
}

fn get_str<'a>(args: &'a [Value], idx: usize, name: &str) -> Result<&'a str, ProgramError> {
    args.get(idx)
        .and_then(Value::as_str)
        .ok_or_else(|| library_error(name, format!("argument {} must be a string", idx + 1)))
}

// ── Implementations ─────────────────────────────────────────────────────

fn int_add(args: &[Value]) -> Result<Value, ProgramError> {
    Ok(Value::Int(get_int(args, 0, "add")? + get_int(args, 1, "add")?))
}

fn int_subtract(args: &[Value]) -> Result<Value, ProgramError> {
    Ok(Value::Int(
        get_int(args, 0, "subtract")? - get_int(args, 1, "subtract")?,
    ))
}

fn int_multiply(args: &[Value]) -> Result<Value, ProgramError> {
    Ok(Value::Int(
        get_int(args, 0, "multiply")? * get_int(args, 1, "multiply")?,
    ))
}

fn int_divide(args: &[Value]) -> Result<Value, ProgramError> {
    let divisor = get_int(args, 1, "divide")?;
    if divisor.is_zero() {
        return Err(library_error("divide", "division by zero"));
    }
    Ok(Value::Int(get_int(args, 0, "divide")? / divisor))
}

fn int_modulo(args: &[Value]) -> Result<Value, ProgramError> {
    let divisor = get_int(args, 1, "modulo")?;
    if divisor.is_zero() {
        return Err(library_error("modulo", "division by zero"));
    }
    Ok(Value::Int(get_int(args, 0, "modulo")? % divisor))
}

fn int_is_zero(args: &[Value]) -> Result<Value, ProgramError> {
    Ok(Value::Bool(get_int(args, 0, "isZero")?.is_zero()))
}

fn text_concat(args: &[Value]) -> Result<Value, ProgramError> {
    let mut s = get_str(args, 0, "concat")?.to_string();
    s.push_str(get_str(args, 1, "concat")?);
    Ok(Value::Str(s))
}

fn text_lowercase(args: &[Value]) -> Result<Value, ProgramError> {
    Ok(Value::Str(get_str(args, 0, "lowercase")?.to_lowercase()))
}

fn text_matches(args: &[Value]) -> Result<Value, ProgramError> {
    let text = get_str(args, 0, "matches")?;
    let pattern = get_str(args, 1, "matches")?;
    let re = Regex::new(pattern)
        .map_err(|e| library_error("matches", format!("invalid pattern: {}", e)))?;
    Ok(Value::Bool(re.is_match(text)))
}

fn text_length(args: &[Value]) -> Result<Value, ProgramError> {
    Ok(Value::int(get_str(args, 0, "length")?.chars().count() as u64))
}

fn bytes_length(args: &[Value]) -> Result<Value, ProgramError> {
    let bytes = args
        .first()
        .and_then(Value::as_bytes)
        .ok_or_else(|| library_error("length", "argument 1 must be bytes"))?;
    Ok(Value::int(bytes.len() as u64))
}

fn to_string(args: &[Value]) -> Result<Value, ProgramError> {
    let value = args
        .first()
        .ok_or_else(|| library_error("toString", "expected one argument"))?;
    Ok(Value::Str(value.to_string()))
}
