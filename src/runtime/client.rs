//! Blockchain data source used by the interpreter, plus a fixture-backed
//! implementation for tests and offline runs.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use num_bigint::BigInt;
use num_traits::{Num, ToPrimitive};
use serde::Deserialize;
use thiserror::Error;

use crate::runtime::abi;
use crate::types::{literal::parse_hex, parse_literal, Literal, SolidityType, Value};

#[derive(Debug, Error)]
pub enum ClientError {
    /// Transient failure; retrying is up to the client's caller.
    #[error("temporary client failure: {0}")]
    Retryable(String),
    #[error("client failure: {0}")]
    Fatal(String),
    #[error("block {0} is not available")]
    MissingBlock(u64),
}

impl ClientError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ClientError::Retryable(_))
    }
}

// ── Chain model ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Block {
    pub number: u64,
    pub hash: Vec<u8>,
    pub parent_hash: Vec<u8>,
    pub timestamp: u64,
    pub miner: Vec<u8>,
    pub gas_used: BigInt,
    pub gas_limit: BigInt,
    pub transactions: Vec<Transaction>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transaction {
    pub hash: Vec<u8>,
    pub index: u64,
    pub block_number: u64,
    pub from: Vec<u8>,
    /// `None` for contract creations.
    pub to: Option<Vec<u8>>,
    pub value: BigInt,
    pub gas: BigInt,
    pub gas_price: BigInt,
    pub nonce: u64,
    pub input: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogEntry {
    pub address: Vec<u8>,
    pub log_index: u64,
    pub block_number: u64,
    pub transaction_hash: Vec<u8>,
    pub topics: Vec<Vec<u8>>,
    pub data: Vec<u8>,
    pub removed: bool,
}

/// Logs of one block, optionally narrowed to one transaction, emitter set
/// and first topic.
#[derive(Debug, Clone, PartialEq)]
pub struct LogQuery {
    pub block_number: u64,
    pub transaction_hash: Option<Vec<u8>>,
    pub addresses: Option<Vec<Vec<u8>>>,
    pub topic0: Option<[u8; 32]>,
}

impl LogQuery {
    pub fn matches(&self, entry: &LogEntry) -> bool {
        entry.block_number == self.block_number
            && self
                .transaction_hash
                .as_ref()
                .map_or(true, |h| *h == entry.transaction_hash)
            && self
                .addresses
                .as_ref()
                .map_or(true, |list| list.contains(&entry.address))
            && self
                .topic0
                .map_or(true, |t| entry.topics.first().is_some_and(|t0| t0.as_slice() == &t[..]))
    }
}

/// A read-only contract call evaluated at `block_number`.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractCall {
    pub address: Vec<u8>,
    pub block_number: u64,
    pub signature: String,
    pub calldata: Vec<u8>,
    pub output_types: Vec<SolidityType>,
}

pub trait BlockchainClient {
    fn head_height(&self) -> Result<u64, ClientError>;
    fn block(&self, height: u64) -> Result<Block, ClientError>;
    fn logs(&self, query: &LogQuery) -> Result<Vec<LogEntry>, ClientError>;
    fn call(&self, call: &ContractCall) -> Result<Vec<Value>, ClientError>;

    /// Wait between head polls of a continuous block range.
    fn poll_interval(&self) -> Duration {
        Duration::from_secs(1)
    }
}

// ── Fixture client ──────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct FixtureCall {
    pub address: Vec<u8>,
    pub signature: String,
    /// Only answer calls at this height; any height when `None`.
    pub block: Option<u64>,
    pub outputs: Vec<serde_json::Value>,
}

/// In-memory chain loaded from JSON or assembled in code.
#[derive(Debug, Clone, Default)]
pub struct FixtureClient {
    blocks: BTreeMap<u64, Block>,
    logs: Vec<LogEntry>,
    calls: Vec<FixtureCall>,
    head: Option<u64>,
    poll_interval: Duration,
}

impl FixtureClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_block(mut self, block: Block) -> Self {
        self.blocks.insert(block.number, block);
        self
    }

    pub fn with_log(mut self, entry: LogEntry) -> Self {
        self.logs.push(entry);
        self
    }

    pub fn with_call(mut self, call: FixtureCall) -> Self {
        self.calls.push(call);
        self
    }

    pub fn with_head(mut self, head: u64) -> Self {
        self.head = Some(head);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn from_path(path: &Path) -> Result<Self, ClientError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ClientError::Fatal(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ClientError> {
        let file: FixtureFile = serde_json::from_str(text)
            .map_err(|e| ClientError::Fatal(format!("invalid fixture: {}", e)))?;

        let mut client = FixtureClient::new();
        client.head = file.head;
        client.poll_interval = Duration::from_millis(file.poll_interval_ms.unwrap_or(1000));

        for raw in file.blocks {
            let (block, logs) = raw.into_block()?;
            client.logs.extend(logs);
            client.blocks.insert(block.number, block);
        }
        for raw in file.calls {
            client.calls.push(FixtureCall {
                address: decode_hex(&raw.address)?,
                signature: raw.signature,
                block: raw.block,
                outputs: raw.outputs,
            });
        }
        Ok(client)
    }
}

impl BlockchainClient for FixtureClient {
    fn head_height(&self) -> Result<u64, ClientError> {
        Ok(self
            .head
            .or_else(|| self.blocks.keys().next_back().copied())
            .unwrap_or(0))
    }

    fn block(&self, height: u64) -> Result<Block, ClientError> {
        self.blocks
            .get(&height)
            .cloned()
            .ok_or(ClientError::MissingBlock(height))
    }

    fn logs(&self, query: &LogQuery) -> Result<Vec<LogEntry>, ClientError> {
        let mut logs: Vec<LogEntry> = self.logs.iter().filter(|e| query.matches(e)).cloned().collect();
        logs.sort_by_key(|e| e.log_index);
        Ok(logs)
    }

    fn call(&self, call: &ContractCall) -> Result<Vec<Value>, ClientError> {
        let fixture = self
            .calls
            .iter()
            .find(|c| {
                c.address == call.address
                    && c.signature == call.signature
                    && c.block.map_or(true, |b| b == call.block_number)
            })
            .ok_or_else(|| {
                ClientError::Fatal(format!(
                    "no fixture answers {} on {} at block {}",
                    call.signature,
                    crate::types::value::to_hex(&call.address),
                    call.block_number
                ))
            })?;

        if fixture.outputs.len() != call.output_types.len() {
            return Err(ClientError::Fatal(format!(
                "{} returns {} values in the fixture, {} were requested",
                call.signature,
                fixture.outputs.len(),
                call.output_types.len()
            )));
        }
        fixture
            .outputs
            .iter()
            .zip(&call.output_types)
            .map(|(json, ty)| json_to_value(json, ty))
            .collect()
    }

    fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}

// ── Fixture file format ─────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FixtureFile {
    #[serde(default)]
    head: Option<u64>,
    #[serde(default)]
    poll_interval_ms: Option<u64>,
    #[serde(default)]
    blocks: Vec<RawBlock>,
    #[serde(default)]
    calls: Vec<RawCall>,
}

/// JSON number, decimal string or `0x` hex string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Quantity {
    Number(u64),
    Text(String),
}

impl Quantity {
    fn to_bigint(&self) -> Result<BigInt, ClientError> {
        match self {
            Quantity::Number(n) => Ok(BigInt::from(*n)),
            Quantity::Text(text) => {
                let parsed = match text.strip_prefix("0x") {
                    Some(digits) => BigInt::from_str_radix(digits, 16),
                    None => BigInt::from_str_radix(text, 10),
                };
                parsed.map_err(|_| ClientError::Fatal(format!("invalid quantity '{}'", text)))
            }
        }
    }

    fn to_u64(&self) -> Result<u64, ClientError> {
        self.to_bigint()?
            .to_u64()
            .ok_or_else(|| ClientError::Fatal(format!("quantity {:?} does not fit in u64", self)))
    }
}

fn quantity_or_zero(q: &Option<Quantity>) -> Result<BigInt, ClientError> {
    q.as_ref().map_or(Ok(BigInt::from(0)), Quantity::to_bigint)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBlock {
    number: u64,
    hash: Option<String>,
    parent_hash: Option<String>,
    timestamp: Option<Quantity>,
    miner: Option<String>,
    gas_used: Option<Quantity>,
    gas_limit: Option<Quantity>,
    #[serde(default)]
    transactions: Vec<RawTransaction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTransaction {
    hash: Option<String>,
    from: String,
    to: Option<String>,
    value: Option<Quantity>,
    gas: Option<Quantity>,
    gas_price: Option<Quantity>,
    nonce: Option<Quantity>,
    input: Option<String>,
    #[serde(default)]
    logs: Vec<RawLog>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLog {
    address: String,
    #[serde(default)]
    topics: Vec<String>,
    data: Option<String>,
    #[serde(default)]
    removed: bool,
}

#[derive(Debug, Deserialize)]
struct RawCall {
    address: String,
    signature: String,
    block: Option<u64>,
    #[serde(default)]
    outputs: Vec<serde_json::Value>,
}

impl RawBlock {
    /// Missing hashes are derived from the block number and transaction
    /// position so that logs stay attributable to their transaction.
    fn into_block(self) -> Result<(Block, Vec<LogEntry>), ClientError> {
        let number = self.number;
        let mut logs = Vec::new();
        let mut transactions = Vec::with_capacity(self.transactions.len());

        for (index, raw) in self.transactions.into_iter().enumerate() {
            let hash = match &raw.hash {
                Some(h) => decode_hex(h)?,
                None => abi::keccak256(format!("tx:{}:{}", number, index).as_bytes()).to_vec(),
            };
            for raw_log in raw.logs {
                logs.push(LogEntry {
                    address: decode_hex(&raw_log.address)?,
                    log_index: logs.len() as u64,
                    block_number: number,
                    transaction_hash: hash.clone(),
                    topics: raw_log
                        .topics
                        .iter()
                        .map(|t| decode_hex(t))
                        .collect::<Result<_, _>>()?,
                    data: optional_hex(&raw_log.data)?,
                    removed: raw_log.removed,
                });
            }
            transactions.push(Transaction {
                hash,
                index: index as u64,
                block_number: number,
                from: decode_hex(&raw.from)?,
                to: raw.to.as_deref().map(decode_hex).transpose()?,
                value: quantity_or_zero(&raw.value)?,
                gas: quantity_or_zero(&raw.gas)?,
                gas_price: quantity_or_zero(&raw.gas_price)?,
                nonce: raw.nonce.as_ref().map_or(Ok(0), Quantity::to_u64)?,
                input: optional_hex(&raw.input)?,
            });
        }

        let block = Block {
            number,
            hash: match &self.hash {
                Some(h) => decode_hex(h)?,
                None => abi::keccak256(format!("block:{}", number).as_bytes()).to_vec(),
            },
            parent_hash: match &self.parent_hash {
                Some(h) => decode_hex(h)?,
                None => vec![0u8; 32],
            },
            timestamp: self.timestamp.as_ref().map_or(Ok(0), Quantity::to_u64)?,
            miner: match &self.miner {
                Some(m) => decode_hex(m)?,
                None => vec![0u8; 20],
            },
            gas_used: quantity_or_zero(&self.gas_used)?,
            gas_limit: quantity_or_zero(&self.gas_limit)?,
            transactions,
        };
        Ok((block, logs))
    }
}

fn decode_hex(text: &str) -> Result<Vec<u8>, ClientError> {
    parse_hex(text).map_err(|e| ClientError::Fatal(e.to_string()))
}

fn optional_hex(text: &Option<String>) -> Result<Vec<u8>, ClientError> {
    text.as_deref().map_or(Ok(Vec::new()), decode_hex)
}

/// Fixture outputs are written the way literals are written in a query.
fn json_to_value(json: &serde_json::Value, ty: &SolidityType) -> Result<Value, ClientError> {
    let literal = json_to_literal(json, ty)?;
    parse_literal(&literal, ty).map_err(|e| ClientError::Fatal(e.to_string()))
}

fn json_to_literal(json: &serde_json::Value, ty: &SolidityType) -> Result<Literal, ClientError> {
    use serde_json::Value as Json;
    match (json, ty) {
        (Json::Number(n), _) => Ok(Literal::Integer(n.to_string())),
        (Json::Bool(b), _) => Ok(Literal::Bool(*b)),
        (Json::String(s), SolidityType::Int { .. }) => {
            let n = Quantity::Text(s.clone()).to_bigint()?;
            Ok(Literal::Integer(n.to_string()))
        }
        (Json::String(s), SolidityType::Address | SolidityType::Bytes(_)) => Ok(Literal::Hex(s.clone())),
        (Json::String(s), _) => Ok(Literal::Str(s.clone())),
        (Json::Array(items), SolidityType::Array(element)) => items
            .iter()
            .map(|item| json_to_literal(item, element))
            .collect::<Result<_, _>>()
            .map(Literal::Array),
        (other, ty) => Err(ClientError::Fatal(format!(
            "fixture value {} cannot be read as {}",
            other, ty
        ))),
    }
}
