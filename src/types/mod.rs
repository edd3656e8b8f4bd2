//! Typed value model: the Solidity type lattice used by the analyzers and
//! the run-time values bound to query variables.

pub mod literal;
pub mod value;

use std::fmt;

pub use literal::{parse_literal, type_of, Literal, LiteralError};
pub use value::Value;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SolidityType {
    Address,
    Bool,
    /// `bytesN` when the length is known, `bytes` when dynamic.
    Bytes(Option<u8>),
    Int { signed: bool, bits: u16 },
    String,
    Array(Box<SolidityType>),
}

impl SolidityType {
    pub fn uint256() -> Self {
        SolidityType::Int { signed: false, bits: 256 }
    }

    pub fn int256() -> Self {
        SolidityType::Int { signed: true, bits: 256 }
    }

    pub fn bytes32() -> Self {
        SolidityType::Bytes(Some(32))
    }

    pub fn array_of(element: SolidityType) -> Self {
        SolidityType::Array(Box::new(element))
    }

    /// Parse a Solidity type name such as `uint256`, `bytes32`, `address[]`.
    pub fn parse(name: &str) -> Option<Self> {
        if let Some(base) = name.strip_suffix("[]") {
            return SolidityType::parse(base).map(SolidityType::array_of);
        }
        match name {
            "address" => return Some(SolidityType::Address),
            "bool" => return Some(SolidityType::Bool),
            "string" => return Some(SolidityType::String),
            "bytes" => return Some(SolidityType::Bytes(None)),
            "int" => return Some(SolidityType::int256()),
            "uint" => return Some(SolidityType::uint256()),
            _ => {}
        }
        if let Some(len) = name.strip_prefix("bytes") {
            let len: u8 = len.parse().ok()?;
            return (1..=32).contains(&len).then_some(SolidityType::Bytes(Some(len)));
        }
        let (signed, bits) = if let Some(bits) = name.strip_prefix("uint") {
            (false, bits)
        } else if let Some(bits) = name.strip_prefix("int") {
            (true, bits)
        } else {
            return None;
        };
        let bits: u16 = bits.parse().ok()?;
        if bits == 0 || bits > 256 || bits % 8 != 0 {
            return None;
        }
        Some(SolidityType::Int { signed, bits })
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, SolidityType::Int { .. })
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, SolidityType::Bool)
    }

    pub fn is_address(&self) -> bool {
        matches!(self, SolidityType::Address)
    }

    pub fn element(&self) -> Option<&SolidityType> {
        match self {
            SolidityType::Array(inner) => Some(inner),
            _ => None,
        }
    }

    /// Dynamic types are ABI-encoded behind an offset and hashed when indexed.
    pub fn is_dynamic(&self) -> bool {
        matches!(
            self,
            SolidityType::String | SolidityType::Bytes(None) | SolidityType::Array(_)
        )
    }
}

impl fmt::Display for SolidityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolidityType::Address => write!(f, "address"),
            SolidityType::Bool => write!(f, "bool"),
            SolidityType::Bytes(None) => write!(f, "bytes"),
            SolidityType::Bytes(Some(len)) => write!(f, "bytes{}", len),
            SolidityType::Int { signed: true, bits } => write!(f, "int{}", bits),
            SolidityType::Int { signed: false, bits } => write!(f, "uint{}", bits),
            SolidityType::String => write!(f, "string"),
            SolidityType::Array(inner) => write!(f, "{}[]", inner),
        }
    }
}

/// Integers coerce across widths and signedness, bytes across lengths, and
/// arrays follow their element types.
pub fn are_compatible(a: &SolidityType, b: &SolidityType) -> bool {
    match (a, b) {
        (a, b) if a == b => true,
        (SolidityType::Int { .. }, SolidityType::Int { .. }) => true,
        (SolidityType::Bytes(_), SolidityType::Bytes(_)) => true,
        (SolidityType::Array(a), SolidityType::Array(b)) => are_compatible(a, b),
        _ => false,
    }
}
