use num_bigint::{BigInt, Sign};
use num_traits::One;
use thiserror::Error;

use super::{SolidityType, Value};

/// A literal as written in the query text. Integer text may carry a leading
/// minus sign; hex text keeps its `0x` prefix.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Integer(String),
    Hex(String),
    Str(String),
    Bool(bool),
    Array(Vec<Literal>),
}

impl Literal {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Literal::Integer(_) => "integer",
            Literal::Hex(_) => "hex",
            Literal::Str(_) => "string",
            Literal::Bool(_) => "bool",
            Literal::Array(_) => "array",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LiteralError {
    #[error("'{text}' is not an integer")]
    NotAnInteger { text: String },
    #[error("{text} does not fit in {ty}")]
    OutOfRange { text: String, ty: SolidityType },
    #[error("'{text}' must start with 0x")]
    MissingHexPrefix { text: String },
    #[error("'{text}' has an odd number of hex digits")]
    OddNibbles { text: String },
    #[error("'{text}' is not valid hex")]
    InvalidHex { text: String },
    #[error("{ty} needs {expected} bytes, '{text}' has {found}")]
    WrongLength {
        text: String,
        ty: SolidityType,
        expected: usize,
        found: usize,
    },
    #[error("a {literal} literal cannot be used as {ty}")]
    Mismatch {
        literal: &'static str,
        ty: SolidityType,
    },
    #[error("element {index}: {source}")]
    Element {
        index: usize,
        source: Box<LiteralError>,
    },
}

/// The type a literal has on its own, without a declaration giving context.
/// Empty array literals have no type of their own.
pub fn type_of(literal: &Literal) -> Option<SolidityType> {
    match literal {
        Literal::Integer(text) if text.starts_with('-') => Some(SolidityType::int256()),
        Literal::Integer(_) => Some(SolidityType::uint256()),
        Literal::Hex(text) if text.len() == 42 => Some(SolidityType::Address),
        Literal::Hex(_) => Some(SolidityType::Bytes(None)),
        Literal::Str(_) => Some(SolidityType::String),
        Literal::Bool(_) => Some(SolidityType::Bool),
        Literal::Array(items) => items
            .first()
            .and_then(type_of)
            .map(SolidityType::array_of),
    }
}

pub fn parse_literal(literal: &Literal, ty: &SolidityType) -> Result<Value, LiteralError> {
    match (literal, ty) {
        (Literal::Integer(text), SolidityType::Int { signed, bits }) => {
            let n = parse_integer(text)?;
            if !fits(&n, *signed, *bits) {
                return Err(LiteralError::OutOfRange {
                    text: text.clone(),
                    ty: ty.clone(),
                });
            }
            Ok(Value::Int(n))
        }
        (Literal::Hex(text), SolidityType::Address) => {
            let bytes = parse_hex(text)?;
            check_length(text, ty, 20, bytes.len())?;
            Ok(Value::Address(bytes))
        }
        (Literal::Hex(text), SolidityType::Bytes(len)) => {
            let bytes = parse_hex(text)?;
            if let Some(len) = len {
                check_length(text, ty, *len as usize, bytes.len())?;
            }
            Ok(Value::Bytes(bytes))
        }
        (Literal::Str(s), SolidityType::String) => Ok(Value::Str(s.clone())),
        (Literal::Bool(b), SolidityType::Bool) => Ok(Value::Bool(*b)),
        (Literal::Array(items), SolidityType::Array(element)) => {
            let mut values = Vec::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                let value = parse_literal(item, element).map_err(|e| LiteralError::Element {
                    index,
                    source: Box::new(e),
                })?;
                values.push(value);
            }
            Ok(Value::Array(values))
        }
        (literal, ty) => Err(LiteralError::Mismatch {
            literal: literal.kind_name(),
            ty: ty.clone(),
        }),
    }
}

/// Parse a literal using the type it has on its own.
pub fn parse_untyped(literal: &Literal) -> Result<Value, LiteralError> {
    match type_of(literal) {
        Some(ty) => parse_literal(literal, &ty),
        None => Ok(Value::Array(Vec::new())),
    }
}

fn parse_integer(text: &str) -> Result<BigInt, LiteralError> {
    let digits = text.strip_prefix('-').unwrap_or(text);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(LiteralError::NotAnInteger {
            text: text.to_string(),
        });
    }
    text.parse::<BigInt>().map_err(|_| LiteralError::NotAnInteger {
        text: text.to_string(),
    })
}

pub(crate) fn fits(n: &BigInt, signed: bool, bits: u16) -> bool {
    let bits = bits as usize;
    if signed {
        let limit = BigInt::one() << (bits - 1);
        let min = -limit.clone();
        *n >= min && *n < limit
    } else {
        n.sign() != Sign::Minus && *n < (BigInt::one() << bits)
    }
}

pub(crate) fn parse_hex(text: &str) -> Result<Vec<u8>, LiteralError> {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .ok_or_else(|| LiteralError::MissingHexPrefix {
            text: text.to_string(),
        })?;
    if digits.len() % 2 != 0 {
        return Err(LiteralError::OddNibbles {
            text: text.to_string(),
        });
    }
    hex::decode(digits).map_err(|_| LiteralError::InvalidHex {
        text: text.to_string(),
    })
}

fn check_length(
    text: &str,
    ty: &SolidityType,
    expected: usize,
    found: usize,
) -> Result<(), LiteralError> {
    if expected == found {
        Ok(())
    } else {
        Err(LiteralError::WrongLength {
            text: text.to_string(),
            ty: ty.clone(),
            expected,
            found,
        })
    }
}
