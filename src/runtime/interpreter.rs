//! Recursive execution of a [`Program`] against a blockchain client.
//!
//! Documents are visited in chain order: ascending block height, then
//! transaction index, then log index. Each scope iteration runs its children
//! in a fresh variable frame.

use std::rc::Rc;

use num_traits::ToPrimitive;
use tracing::{debug, info, warn};

use crate::ast::ScopeKind;
use crate::program::selector::{
    BlockNumber, BlockRangeSelector, LogEntrySelector, SmartContractSelector, TransactionSelector,
};
use crate::program::{
    CancelFlag, Instruction, Predicate, Program, ProgramError, ProgramState, Scope, Selector,
    ValueAccessor, XesField,
};
use crate::runtime::abi;
use crate::runtime::client::{Block, BlockchainClient, ContractCall, LogEntry, LogQuery, Transaction};
use crate::runtime::sink::{OutputSink, XesIds, XesValue};
use crate::scope;
use crate::types::{SolidityType, Value};

/// Runs the program to completion, until cancellation, or until the first
/// error. Output written before an error stays written; the sink is flushed
/// either way.
pub fn run(
    program: &Program,
    client: &dyn BlockchainClient,
    sink: &mut dyn OutputSink,
    cancel: CancelFlag,
) -> Result<(), ProgramError> {
    info!(scopes = program.scope_count(), "run started");
    let mut state = ProgramState::new(client, sink, cancel);

    state.push_frame();
    let result = execute_all(&program.instructions, &mut state);
    state.pop_frame();

    let flushed = state.sink.flush();
    result?;
    flushed?;

    if state.is_cancelled() {
        info!("run cancelled");
    } else {
        info!("run finished");
    }
    Ok(())
}

fn execute_all(instructions: &[Instruction], state: &mut ProgramState<'_>) -> Result<(), ProgramError> {
    for instruction in instructions {
        instruction.execute(state)?;
    }
    Ok(())
}

/// Runs `children` inside a new frame seeded with `bindings`.
fn execute_in_frame(
    children: &[Instruction],
    bindings: Vec<(&str, Value)>,
    state: &mut ProgramState<'_>,
) -> Result<(), ProgramError> {
    state.push_frame();
    for (name, value) in bindings {
        state.bind(name, value);
    }
    let result = execute_all(children, state);
    state.pop_frame();
    result
}

fn evaluate_all(accessors: &[ValueAccessor], state: &ProgramState<'_>) -> Result<Vec<Value>, ProgramError> {
    accessors.iter().map(|a| a.evaluate(state)).collect()
}

fn evaluate_optional(
    accessor: &Option<ValueAccessor>,
    state: &ProgramState<'_>,
) -> Result<Option<Value>, ProgramError> {
    accessor.as_ref().map(|a| a.evaluate(state)).transpose()
}

// ── Leaves ──────────────────────────────────────────────────────────────

impl Instruction {
    pub fn execute(&self, state: &mut ProgramState<'_>) -> Result<(), ProgramError> {
        match self {
            Instruction::Mutate { target, value } => {
                let value = value.evaluate(state)?;
                target.apply(state, value)
            }
            Instruction::Call { method, args } => {
                let values = evaluate_all(args, state)?;
                method.invoke(&values)?;
                Ok(())
            }
            Instruction::CsvRow { table, columns } => {
                let row = columns
                    .iter()
                    .map(|(name, accessor)| Ok((name.clone(), accessor.evaluate(state)?)))
                    .collect::<Result<Vec<_>, ProgramError>>()?;
                state.sink.write_csv_row(table, &row)?;
                Ok(())
            }
            Instruction::LogLine { values } => {
                let values = evaluate_all(values, state)?;
                state.sink.write_log_line(&values)?;
                Ok(())
            }
            Instruction::XesEvent {
                pid,
                piid,
                eid,
                attributes,
            } => {
                let ids = XesIds {
                    pid: evaluate_optional(pid, state)?,
                    piid: evaluate_optional(piid, state)?,
                    eid: evaluate_optional(eid, state)?,
                };
                let attributes = evaluate_xes(attributes, state)?;
                state.sink.write_xes_event(&ids, &attributes)?;
                Ok(())
            }
            Instruction::XesTrace {
                pid,
                piid,
                attributes,
            } => {
                let ids = XesIds {
                    pid: evaluate_optional(pid, state)?,
                    piid: evaluate_optional(piid, state)?,
                    eid: None,
                };
                let attributes = evaluate_xes(attributes, state)?;
                state.sink.write_xes_trace(&ids, &attributes)?;
                Ok(())
            }
            Instruction::Scope(scope) => scope.execute(state),
        }
    }
}

fn evaluate_xes(fields: &[XesField], state: &ProgramState<'_>) -> Result<Vec<XesValue>, ProgramError> {
    fields
        .iter()
        .map(|field| {
            let value = field.value.evaluate(state)?;
            let xes_type = field
                .xes_type
                .clone()
                .unwrap_or_else(|| default_xes_type(&value).to_string());
            Ok(XesValue {
                key: field.name.clone(),
                xes_type,
                value,
            })
        })
        .collect()
}

pub fn default_xes_type(value: &Value) -> &'static str {
    match value {
        Value::Int(_) => "xs:int",
        Value::Bool(_) => "xs:boolean",
        _ => "xs:string",
    }
}

// ── Scopes ──────────────────────────────────────────────────────────────

impl Scope {
    pub fn execute(&self, state: &mut ProgramState<'_>) -> Result<(), ProgramError> {
        let result = match &self.selector {
            Selector::BlockRange(selector) => run_block_range(selector, &self.children, state),
            Selector::Transaction(selector) => run_transactions(selector, &self.children, state),
            Selector::LogEntry(selector) => run_log_entries(selector, &self.children, state),
            Selector::SmartContract(selector) => run_smart_contract(selector, &self.children, state),
            Selector::Generic(predicate) => run_generic(predicate, &self.children, state),
        };
        result.map_err(|e| e.within(self))
    }
}

fn resolve_bound(bound: &BlockNumber, head: u64, state: &ProgramState<'_>) -> Result<u64, ProgramError> {
    match bound {
        BlockNumber::Number(n) => Ok(*n),
        BlockNumber::Variable(name) => {
            let value = state.lookup(name)?;
            value.as_int().and_then(|n| n.to_u64()).ok_or_else(|| {
                ProgramError::type_error(format!("block number '{}' is {}", name, value))
            })
        }
        BlockNumber::Earliest => Ok(0),
        BlockNumber::Current | BlockNumber::Pending => Ok(head),
        BlockNumber::Continuous => Err(ProgramError::type_error(
            "CONTINUOUS can only be used as the upper bound",
        )),
    }
}

/// Consecutive empty polls of a continuous range between two warnings.
const IDLE_POLLS_BEFORE_WARN: u32 = 60;

fn run_block_range(
    selector: &BlockRangeSelector,
    children: &[Instruction],
    state: &mut ProgramState<'_>,
) -> Result<(), ProgramError> {
    let mut head = state.client.head_height()?;
    let from = resolve_bound(&selector.from, head, state)?;
    let to = if selector.is_continuous() {
        None
    } else {
        Some(resolve_bound(&selector.to, head, state)?)
    };
    debug!(from, to = ?to, head, "block range");

    let previous = state.cursor.block.take();
    let mut height = from;
    let mut idle_polls: u32 = 0;
    let result = loop {
        if to.is_some_and(|to| height > to) {
            break Ok(());
        }
        if state.is_cancelled() {
            info!(height, "block range stopped by cancellation");
            break Ok(());
        }
        if to.is_none() && height > head {
            head = match state.client.head_height() {
                Ok(h) => h,
                Err(e) => break Err(ProgramError::from(e)),
            };
            if height > head {
                idle_polls = idle_polls.saturating_add(1);
                if idle_polls % IDLE_POLLS_BEFORE_WARN == 0 {
                    warn!(height, head, polls = idle_polls, "no new block for a while");
                } else {
                    debug!(height, head, "no new block yet");
                }
                std::thread::sleep(state.client.poll_interval());
                continue;
            }
            idle_polls = 0;
        }

        let block = match state.client.block(height) {
            Ok(block) => Rc::new(block),
            Err(e) => break Err(ProgramError::from(e)),
        };
        debug!(number = block.number, transactions = block.transactions.len(), "block");
        state.cursor.block = Some(block.clone());
        if let Err(e) = execute_in_frame(children, block_bindings(&block), state) {
            break Err(e);
        }
        match height.checked_add(1) {
            Some(next) => height = next,
            None => break Ok(()),
        }
    };
    state.cursor.block = previous;
    result
}

fn block_bindings(block: &Block) -> Vec<(&'static str, Value)> {
    vec![
        (scope::BLOCK_NUMBER, Value::int(block.number)),
        (scope::BLOCK_HASH, Value::Bytes(block.hash.clone())),
        (scope::BLOCK_PARENT_HASH, Value::Bytes(block.parent_hash.clone())),
        (scope::BLOCK_TIMESTAMP, Value::int(block.timestamp)),
        (scope::BLOCK_MINER, Value::Address(block.miner.clone())),
        (scope::BLOCK_GAS_USED, Value::Int(block.gas_used.clone())),
        (scope::BLOCK_GAS_LIMIT, Value::Int(block.gas_limit.clone())),
        (
            scope::BLOCK_TRANSACTION_COUNT,
            Value::int(block.transactions.len() as u64),
        ),
    ]
}

fn run_transactions(
    selector: &TransactionSelector,
    children: &[Instruction],
    state: &mut ProgramState<'_>,
) -> Result<(), ProgramError> {
    let block = state
        .cursor
        .block
        .clone()
        .ok_or(ProgramError::MissingContext(ScopeKind::Transaction, "block"))?;

    let previous = state.cursor.transaction.take();
    let mut result = Ok(());
    for tx in &block.transactions {
        let selected = selector.senders.matches(Some(tx.from.as_slice()), state).and_then(|from_ok| {
            Ok(from_ok && selector.recipients.matches(tx.to.as_deref(), state)?)
        });
        match selected {
            Ok(true) => {}
            Ok(false) => continue,
            Err(e) => {
                result = Err(e);
                break;
            }
        }
        debug!(index = tx.index, "transaction");
        state.cursor.transaction = Some(Rc::new(tx.clone()));
        if let Err(e) = execute_in_frame(children, transaction_bindings(tx), state) {
            result = Err(e);
            break;
        }
    }
    state.cursor.transaction = previous;
    result
}

fn transaction_bindings(tx: &Transaction) -> Vec<(&'static str, Value)> {
    vec![
        (scope::TX_HASH, Value::Bytes(tx.hash.clone())),
        (scope::TX_INDEX, Value::int(tx.index)),
        (scope::TX_FROM, Value::Address(tx.from.clone())),
        (
            scope::TX_TO,
            tx.to.clone().map_or(Value::Null, Value::Address),
        ),
        (scope::TX_VALUE, Value::Int(tx.value.clone())),
        (scope::TX_GAS, Value::Int(tx.gas.clone())),
        (scope::TX_GAS_PRICE, Value::Int(tx.gas_price.clone())),
        (scope::TX_NONCE, Value::int(tx.nonce)),
        (scope::TX_INPUT, Value::Bytes(tx.input.clone())),
    ]
}

fn run_log_entries(
    selector: &LogEntrySelector,
    children: &[Instruction],
    state: &mut ProgramState<'_>,
) -> Result<(), ProgramError> {
    let block = state
        .cursor
        .block
        .clone()
        .ok_or(ProgramError::MissingContext(ScopeKind::LogEntry, "block"))?;

    let query = LogQuery {
        block_number: block.number,
        transaction_hash: state.cursor.transaction.as_ref().map(|tx| tx.hash.clone()),
        addresses: selector.addresses.resolve(state)?,
        topic0: Some(selector.topic0),
    };
    let entries = state.client.logs(&query)?;

    let previous = state.cursor.log_entry.take();
    let mut result = Ok(());
    for entry in entries {
        // Clients may over-approximate the filter; the topic count separates
        // events that share a signature hash but differ in indexing.
        if !query.matches(&entry) || entry.topics.len() != selector.topic_count() {
            continue;
        }
        let bindings = match log_bindings(selector, &entry) {
            Ok(b) => b,
            Err(e) => {
                result = Err(e);
                break;
            }
        };
        debug!(log_index = entry.log_index, event = %selector.event_name, "log entry");
        state.cursor.log_entry = Some(Rc::new(entry));
        let bindings = bindings.iter().map(|(n, v)| (n.as_str(), v.clone())).collect();
        if let Err(e) = execute_in_frame(children, bindings, state) {
            result = Err(e);
            break;
        }
    }
    state.cursor.log_entry = previous;
    result
}

/// Entry constants plus every event parameter, indexed ones decoded from
/// the topics and the rest from the data section.
fn log_bindings(selector: &LogEntrySelector, entry: &LogEntry) -> Result<Vec<(String, Value)>, ProgramError> {
    let mut bindings = vec![
        (scope::ENTRY_ADDRESS.to_string(), Value::Address(entry.address.clone())),
        (scope::ENTRY_LOG_INDEX.to_string(), Value::int(entry.log_index)),
        (
            scope::ENTRY_TRANSACTION_HASH.to_string(),
            Value::Bytes(entry.transaction_hash.clone()),
        ),
        (scope::ENTRY_REMOVED.to_string(), Value::Bool(entry.removed)),
    ];

    let data_types: Vec<SolidityType> = selector
        .params
        .iter()
        .filter(|p| !p.indexed)
        .map(|p| p.ty.clone())
        .collect();
    let mut data_values = abi::decode_data(&data_types, &entry.data)?.into_iter();
    let mut topics = entry.topics.iter().skip(1);

    for param in &selector.params {
        let value = if param.indexed {
            let topic = topics.next().ok_or_else(|| ProgramError::Decode {
                what: param.ty.to_string(),
                message: format!("missing topic for '{}'", param.name),
            })?;
            abi::decode_topic(&param.ty, topic)?
        } else {
            data_values.next().ok_or_else(|| ProgramError::Decode {
                what: param.ty.to_string(),
                message: format!("missing data for '{}'", param.name),
            })?
        };
        bindings.push((param.name.clone(), value));
    }
    Ok(bindings)
}

fn run_smart_contract(
    selector: &SmartContractSelector,
    children: &[Instruction],
    state: &mut ProgramState<'_>,
) -> Result<(), ProgramError> {
    let block = state
        .cursor
        .block
        .clone()
        .ok_or(ProgramError::MissingContext(ScopeKind::SmartContract, "block"))?;

    let address = match selector.address.resolve(state)? {
        Some(mut list) if list.len() == 1 => list.remove(0),
        _ => {
            return Err(ProgramError::type_error(format!(
                "smart contract address '{}' must resolve to a single address",
                selector.address
            )))
        }
    };

    let mut bindings = vec![(scope::CONTRACT_ADDRESS.to_string(), Value::Address(address.clone()))];
    for query in &selector.queries {
        let mut inputs = Vec::with_capacity(query.inputs.len());
        for input in &query.inputs {
            let value = input.value.evaluate(state)?;
            debug!(param = %input.name, value = %value, "contract call input");
            inputs.push((input.ty.clone(), value));
        }
        let call = ContractCall {
            address: address.clone(),
            block_number: block.number,
            signature: query.signature.clone(),
            calldata: abi::encode_call(&query.signature, &inputs)?,
            output_types: query.outputs.iter().map(|(_, ty)| ty.clone()).collect(),
        };
        debug!(signature = %call.signature, block = call.block_number, "contract call");
        let values = state.client.call(&call)?;
        if values.len() != query.outputs.len() {
            return Err(ProgramError::Decode {
                what: query.signature.clone(),
                message: format!(
                    "expected {} return values, got {}",
                    query.outputs.len(),
                    values.len()
                ),
            });
        }
        for ((name, _), value) in query.outputs.iter().zip(values) {
            bindings.push((name.clone(), value));
        }
    }

    let bindings = bindings.iter().map(|(n, v)| (n.as_str(), v.clone())).collect();
    execute_in_frame(children, bindings, state)
}

fn run_generic(
    predicate: &Predicate,
    children: &[Instruction],
    state: &mut ProgramState<'_>,
) -> Result<(), ProgramError> {
    if predicate.test(state)? {
        execute_in_frame(children, Vec::new(), state)
    } else {
        Ok(())
    }
}
