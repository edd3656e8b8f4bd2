//! Compile-time variable frames and the scope nesting rule.
//!
//! Both the analyzers and the composer push one frame per open scope, so the
//! nesting rule lives here next to the table rather than in either of them.

use std::collections::HashMap;

use thiserror::Error;

use crate::ast::{ContractQuery, Filter, ScopeKind, ScopeNode, ValueExpr};
use crate::library;
use crate::types::{self, SolidityType};

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub ty: SolidityType,
    pub is_constant: bool,
}

impl Variable {
    pub fn constant(name: &str, ty: SolidityType) -> Self {
        Self {
            name: name.to_string(),
            ty,
            is_constant: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("variable '{name}' is already defined")]
pub struct AlreadyDefined {
    pub name: String,
}

// ── Scope table ─────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct ScopeTable {
    frames: Vec<HashMap<String, Variable>>,
}

impl ScopeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter_scope(&mut self, constants: Vec<Variable>) {
        let frame = constants
            .into_iter()
            .map(|var| (var.name.clone(), var))
            .collect();
        self.frames.push(frame);
    }

    /// Panics when no scope is open: an unmatched exit is a caller bug.
    pub fn exit_scope(&mut self) {
        self.frames
            .pop()
            .expect("exit_scope called without a matching enter_scope");
    }

    /// Declares a user variable in the innermost frame. A name visible in
    /// any open frame cannot be declared again.
    pub fn declare(&mut self, name: &str, ty: SolidityType) -> Result<(), AlreadyDefined> {
        if self.resolve(name).is_some() {
            return Err(AlreadyDefined {
                name: name.to_string(),
            });
        }
        let frame = self
            .frames
            .last_mut()
            .expect("declare called outside of any scope");
        frame.insert(
            name.to_string(),
            Variable {
                name: name.to_string(),
                ty,
                is_constant: false,
            },
        );
        Ok(())
    }

    pub fn resolve(&self, name: &str) -> Option<&Variable> {
        self.frames.iter().rev().find_map(|frame| frame.get(name))
    }

    /// Static type of a value expression. `None` when a name is unknown, a
    /// call has no matching overload, or an array literal is empty.
    pub fn type_of(&self, expr: &ValueExpr) -> Option<SolidityType> {
        match expr {
            ValueExpr::Literal { literal, .. } => types::type_of(literal),
            ValueExpr::Variable { name, .. } => self.resolve(name).map(|v| v.ty.clone()),
            ValueExpr::Call(call) => {
                let arg_types = call
                    .args
                    .iter()
                    .map(|arg| self.type_of(arg))
                    .collect::<Option<Vec<_>>>()?;
                library::resolve(&call.name, &arg_types).map(|m| m.returns.clone())
            }
        }
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }
}

// ── Implicit constants ──────────────────────────────────────────────────

pub const BLOCK_NUMBER: &str = "block.number";
pub const BLOCK_HASH: &str = "block.hash";
pub const BLOCK_PARENT_HASH: &str = "block.parentHash";
pub const BLOCK_TIMESTAMP: &str = "block.timestamp";
pub const BLOCK_MINER: &str = "block.miner";
pub const BLOCK_GAS_USED: &str = "block.gasUsed";
pub const BLOCK_GAS_LIMIT: &str = "block.gasLimit";
pub const BLOCK_TRANSACTION_COUNT: &str = "block.transactionCount";

pub const TX_HASH: &str = "tx.hash";
pub const TX_INDEX: &str = "tx.index";
pub const TX_FROM: &str = "tx.from";
pub const TX_TO: &str = "tx.to";
pub const TX_VALUE: &str = "tx.value";
pub const TX_GAS: &str = "tx.gas";
pub const TX_GAS_PRICE: &str = "tx.gasPrice";
pub const TX_NONCE: &str = "tx.nonce";
pub const TX_INPUT: &str = "tx.input";

pub const ENTRY_ADDRESS: &str = "entry.address";
pub const ENTRY_LOG_INDEX: &str = "entry.logIndex";
pub const ENTRY_TRANSACTION_HASH: &str = "entry.transactionHash";
pub const ENTRY_REMOVED: &str = "entry.removed";

pub const CONTRACT_ADDRESS: &str = "contract.address";

pub fn block_constants() -> Vec<Variable> {
    vec![
        Variable::constant(BLOCK_NUMBER, SolidityType::uint256()),
        Variable::constant(BLOCK_HASH, SolidityType::bytes32()),
        Variable::constant(BLOCK_PARENT_HASH, SolidityType::bytes32()),
        Variable::constant(BLOCK_TIMESTAMP, SolidityType::uint256()),
        Variable::constant(BLOCK_MINER, SolidityType::Address),
        Variable::constant(BLOCK_GAS_USED, SolidityType::uint256()),
        Variable::constant(BLOCK_GAS_LIMIT, SolidityType::uint256()),
        Variable::constant(BLOCK_TRANSACTION_COUNT, SolidityType::uint256()),
    ]
}

pub fn transaction_constants() -> Vec<Variable> {
    vec![
        Variable::constant(TX_HASH, SolidityType::bytes32()),
        Variable::constant(TX_INDEX, SolidityType::uint256()),
        Variable::constant(TX_FROM, SolidityType::Address),
        Variable::constant(TX_TO, SolidityType::Address),
        Variable::constant(TX_VALUE, SolidityType::uint256()),
        Variable::constant(TX_GAS, SolidityType::uint256()),
        Variable::constant(TX_GAS_PRICE, SolidityType::uint256()),
        Variable::constant(TX_NONCE, SolidityType::uint256()),
        Variable::constant(TX_INPUT, SolidityType::Bytes(None)),
    ]
}

/// Constants a scope brings into view. Event parameters and contract query
/// outputs are bound as constants of their scope.
pub fn constants_for(node: &ScopeNode) -> Vec<Variable> {
    match &node.filter {
        Filter::Blocks { .. } => block_constants(),
        Filter::Transactions { .. } => transaction_constants(),
        Filter::LogEntries { event, .. } => {
            let mut vars = vec![
                Variable::constant(ENTRY_ADDRESS, SolidityType::Address),
                Variable::constant(ENTRY_LOG_INDEX, SolidityType::uint256()),
                Variable::constant(ENTRY_TRANSACTION_HASH, SolidityType::bytes32()),
                Variable::constant(ENTRY_REMOVED, SolidityType::Bool),
            ];
            vars.extend(
                event
                    .params
                    .iter()
                    .map(|p| Variable::constant(&p.name, p.ty.clone())),
            );
            vars
        }
        Filter::SmartContract { queries, .. } => {
            let mut vars = vec![Variable::constant(CONTRACT_ADDRESS, SolidityType::Address)];
            vars.extend(
                queries
                    .iter()
                    .flat_map(ContractQuery::outputs)
                    .map(|o| Variable::constant(&o.name, o.ty.clone())),
            );
            vars
        }
        Filter::Generic { .. } => Vec::new(),
    }
}

// ── Nesting rule ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("a {child} scope {requirement}")]
pub struct NestingViolation {
    pub child: ScopeKind,
    pub requirement: &'static str,
}

/// Checks whether `child` may open given the scopes already open, outermost
/// first. Generic scopes are transparent: they never count as a parent kind.
pub fn check_nesting(open: &[ScopeKind], child: ScopeKind) -> Result<(), NestingViolation> {
    let count = |kind: ScopeKind| open.iter().filter(|k| **k == kind).count();
    let block_ranges = count(ScopeKind::BlockRange);
    let transactions = count(ScopeKind::Transaction);
    let log_entries = count(ScopeKind::LogEntry);
    let contracts = count(ScopeKind::SmartContract);

    let violation = |requirement| {
        Err(NestingViolation {
            child,
            requirement,
        })
    };

    match child {
        ScopeKind::Program => {
            if !open.is_empty() {
                return violation("must be the outermost scope");
            }
        }
        ScopeKind::BlockRange => {
            if open.is_empty() {
                return violation("must be inside the program");
            }
            if block_ranges + transactions + log_entries + contracts > 0 {
                return violation("may only be enclosed by the program or generic filters");
            }
        }
        ScopeKind::Transaction | ScopeKind::SmartContract => {
            if block_ranges != 1 {
                return violation("must be enclosed by exactly one block range");
            }
            if transactions + log_entries + contracts > 0 {
                return violation(
                    "cannot be enclosed by a transaction, log entry or smart contract scope",
                );
            }
        }
        ScopeKind::LogEntry => {
            if block_ranges != 1 {
                return violation("must be enclosed by exactly one block range");
            }
            if transactions > 1 {
                return violation("may be enclosed by at most one transaction");
            }
            if log_entries > 0 {
                return violation("cannot be enclosed by another log entry scope");
            }
        }
        ScopeKind::Generic => {
            if open.is_empty() {
                return violation("must be inside the program");
            }
        }
    }
    Ok(())
}
