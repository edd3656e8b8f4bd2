use std::fmt;

use crate::ast::ScopeKind;
use crate::types::{value::to_hex, SolidityType, Value};

use super::{Predicate, ProgramError, ProgramState, ValueAccessor};

#[derive(Debug, Clone)]
pub enum Selector {
    BlockRange(BlockRangeSelector),
    Transaction(TransactionSelector),
    LogEntry(LogEntrySelector),
    SmartContract(SmartContractSelector),
    Generic(Predicate),
}

impl Selector {
    pub fn kind(&self) -> ScopeKind {
        match self {
            Selector::BlockRange(_) => ScopeKind::BlockRange,
            Selector::Transaction(_) => ScopeKind::Transaction,
            Selector::LogEntry(_) => ScopeKind::LogEntry,
            Selector::SmartContract(_) => ScopeKind::SmartContract,
            Selector::Generic(_) => ScopeKind::Generic,
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::BlockRange(s) => write!(f, "[{}, {}]", s.from, s.to),
            Selector::Transaction(s) => write!(f, "from {} to {}", s.senders, s.recipients),
            Selector::LogEntry(s) => write!(f, "{} at {}", s.signature(), s.addresses),
            Selector::SmartContract(s) => {
                let calls: Vec<&str> = s.queries.iter().map(|q| q.signature.as_str()).collect();
                write!(f, "{} [{}]", s.address, calls.join(", "))
            }
            Selector::Generic(predicate) => write!(f, "if {}", predicate),
        }
    }
}

// ── Block range ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum BlockNumber {
    Number(u64),
    Variable(String),
    Earliest,
    Current,
    Pending,
    Continuous,
}

impl fmt::Display for BlockNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockNumber::Number(n) => write!(f, "{}", n),
            BlockNumber::Variable(name) => write!(f, "{}", name),
            BlockNumber::Earliest => write!(f, "EARLIEST"),
            BlockNumber::Current => write!(f, "CURRENT"),
            BlockNumber::Pending => write!(f, "PENDING"),
            BlockNumber::Continuous => write!(f, "CONTINUOUS"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BlockRangeSelector {
    pub from: BlockNumber,
    pub to: BlockNumber,
}

impl BlockRangeSelector {
    pub fn is_continuous(&self) -> bool {
        self.to == BlockNumber::Continuous
    }
}

// ── Address filters ─────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum AddressFilter {
    Any,
    Literals(Vec<Vec<u8>>),
    /// Re-resolved from the state every time the filter is evaluated.
    Variable(String),
}

impl AddressFilter {
    /// The explicit address set, or `None` for the wildcard.
    pub fn resolve(&self, state: &ProgramState<'_>) -> Result<Option<Vec<Vec<u8>>>, ProgramError> {
        match self {
            AddressFilter::Any => Ok(None),
            AddressFilter::Literals(addresses) => Ok(Some(addresses.clone())),
            AddressFilter::Variable(name) => match state.lookup(name)? {
                Value::Address(bytes) => Ok(Some(vec![bytes.clone()])),
                Value::Array(items) => items
                    .iter()
                    .map(|item| match item {
                        Value::Address(bytes) => Ok(bytes.clone()),
                        other => Err(address_type_error(name, other)),
                    })
                    .collect::<Result<Vec<_>, _>>()
                    .map(Some),
                other => Err(address_type_error(name, other)),
            },
        }
    }

    /// A missing address (e.g. the recipient of a contract creation) only
    /// matches the wildcard.
    pub fn matches(&self, address: Option<&[u8]>, state: &ProgramState<'_>) -> Result<bool, ProgramError> {
        Ok(match self.resolve(state)? {
            None => true,
            Some(allowed) => address.is_some_and(|a| allowed.iter().any(|b| b.as_slice() == a)),
        })
    }
}

fn address_type_error(name: &str, value: &Value) -> ProgramError {
    ProgramError::type_error(format!(
        "'{}' must hold an address or address list, got {}",
        name,
        value.type_name()
    ))
}

impl fmt::Display for AddressFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressFilter::Any => write!(f, "ANY"),
            AddressFilter::Literals(addresses) => {
                let list: Vec<String> = addresses.iter().map(|a| to_hex(a)).collect();
                write!(f, "{}", list.join(", "))
            }
            AddressFilter::Variable(name) => write!(f, "{}", name),
        }
    }
}

// ── Transactions ────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct TransactionSelector {
    pub senders: AddressFilter,
    pub recipients: AddressFilter,
}

// ── Log entries ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct EventParameter {
    pub name: String,
    pub ty: SolidityType,
    pub indexed: bool,
}

#[derive(Debug, Clone)]
pub struct LogEntrySelector {
    pub addresses: AddressFilter,
    pub event_name: String,
    pub params: Vec<EventParameter>,
    /// keccak256 of the canonical event signature.
    pub topic0: [u8; 32],
}

impl LogEntrySelector {
    pub fn signature(&self) -> String {
        let types: Vec<String> = self.params.iter().map(|p| p.ty.to_string()).collect();
        format!("{}({})", self.event_name, types.join(","))
    }

    pub fn topic_count(&self) -> usize {
        1 + self.params.iter().filter(|p| p.indexed).count()
    }
}

// ── Smart contracts ─────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ContractInput {
    /// Generated parameter name; queries only carry types and values.
    pub name: String,
    pub ty: SolidityType,
    pub value: ValueAccessor,
}

#[derive(Debug, Clone)]
pub struct ContractQuerySpec {
    pub method: String,
    pub signature: String,
    pub function_selector: [u8; 4],
    pub inputs: Vec<ContractInput>,
    pub outputs: Vec<(String, SolidityType)>,
}

#[derive(Debug, Clone)]
pub struct SmartContractSelector {
    pub address: AddressFilter,
    pub queries: Vec<ContractQuerySpec>,
}
