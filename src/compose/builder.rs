//! Walk listener that turns a checked document into a [`Program`].

use tracing::debug;

use crate::ast::walk::{walk, ConditionEvent, QueryListener, ScopeEntry};
use crate::ast::{
    AddressList, BlockBound, ContractQuery, Document, EmitStatement, EventSignature, Filter,
    MethodCall, SourceLocation, Statement, ValueExpr, XesAttribute,
};
use crate::library::{self, LibraryMethod};
use crate::program::selector::{
    AddressFilter, BlockNumber, BlockRangeSelector, ContractInput, ContractQuerySpec,
    EventParameter, LogEntrySelector, SmartContractSelector, TransactionSelector,
};
use crate::program::{Instruction, Program, Selector, ValueAccessor, ValueMutator, XesField};
use crate::runtime::abi;
use crate::scope::{self, ScopeTable};
use crate::types::{parse_literal, Literal, SolidityType};
use crate::types::literal::parse_untyped;

use super::{BuildError, ConditionNode, PredicateBuilder, SpecificationComposer};

/// Prefix of the names generated for smart-contract call inputs.
const PARAM_PREFIX: &str = "param";

/// Builds the program for a document that passed analysis.
pub fn build_program(document: &Document) -> Result<Program, BuildError> {
    let mut builder = ProgramBuilder::new();
    walk(document, &mut builder);
    builder.into_program()
}

enum Pending {
    Program,
    Ready(Selector),
    Generic(PredicateBuilder),
    /// Opened after an earlier failure; only kept to balance the stacks.
    Skipped,
}

/// Mirrors the walk into a [`SpecificationComposer`]. Keeps its own scope
/// table so library overloads resolve from static argument types. The
/// first error stops construction and is returned by
/// [`ProgramBuilder::into_program`].
#[derive(Default)]
pub struct ProgramBuilder {
    composer: SpecificationComposer,
    table: ScopeTable,
    pending: Vec<Pending>,
    error: Option<BuildError>,
}

impl ProgramBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_program(self) -> Result<Program, BuildError> {
        if let Some(error) = self.error {
            return Err(error);
        }
        let program = self.composer.build_program()?;
        debug!(scopes = program.scope_count(), "program built");
        Ok(program)
    }

    fn record(&mut self, result: Result<(), BuildError>) {
        if let Err(error) = result {
            self.error.get_or_insert(error);
        }
    }

    fn open(&mut self, entry: ScopeEntry<'_>) -> Result<Pending, BuildError> {
        let pending = match entry.filter() {
            None => Pending::Program,
            Some(filter) => self.selector(filter)?,
        };
        self.composer.prepare(entry.kind(), entry.loc().clone())?;
        Ok(pending)
    }

    fn close(&mut self, pending: Option<Pending>) -> Result<(), BuildError> {
        match pending {
            // The root stays open for build_program.
            Some(Pending::Program) => Ok(()),
            Some(Pending::Ready(selector)) => self.composer.build(selector),
            Some(Pending::Generic(predicate)) => {
                let predicate = predicate.finish()?;
                self.composer.build(Selector::Generic(predicate))
            }
            Some(Pending::Skipped) | None => Err(BuildError::NothingOpen),
        }
    }

    // ── Selectors ───────────────────────────────────────────────────────

    fn selector(&mut self, filter: &Filter) -> Result<Pending, BuildError> {
        let selector = match filter {
            Filter::Blocks { from, to } => Selector::BlockRange(BlockRangeSelector {
                from: self.block_number(from)?,
                to: self.block_number(to)?,
            }),
            Filter::Transactions {
                senders,
                recipients,
            } => Selector::Transaction(TransactionSelector {
                senders: self.address_filter(senders)?,
                recipients: self.address_filter(recipients)?,
            }),
            Filter::LogEntries { addresses, event } => {
                Selector::LogEntry(self.log_entry_selector(addresses, event)?)
            }
            Filter::SmartContract { address, queries } => {
                let address = self.address_filter(address)?;
                let queries = queries
                    .iter()
                    .map(|q| self.contract_query(q))
                    .collect::<Result<Vec<_>, _>>()?;
                Selector::SmartContract(SmartContractSelector { address, queries })
            }
            Filter::Generic { .. } => return Ok(Pending::Generic(PredicateBuilder::new())),
        };
        Ok(Pending::Ready(selector))
    }

    fn block_number(&self, bound: &BlockBound) -> Result<BlockNumber, BuildError> {
        Ok(match bound {
            BlockBound::Number { text, loc } => {
                BlockNumber::Number(text.parse().map_err(|_| BuildError::BlockNumber {
                    text: text.clone(),
                    loc: loc.clone(),
                })?)
            }
            BlockBound::Variable { name, loc } => {
                self.require_variable(name, loc)?;
                BlockNumber::Variable(name.clone())
            }
            BlockBound::Earliest(_) => BlockNumber::Earliest,
            BlockBound::Current(_) => BlockNumber::Current,
            BlockBound::Pending(_) => BlockNumber::Pending,
            BlockBound::Continuous(_) => BlockNumber::Continuous,
        })
    }

    fn address_filter(&self, list: &AddressList) -> Result<AddressFilter, BuildError> {
        match list {
            AddressList::Any(_) => Ok(AddressFilter::Any),
            AddressList::Literals { addresses, loc } => addresses
                .iter()
                .map(|text| {
                    parse_literal(&Literal::Hex(text.clone()), &SolidityType::Address)
                        .map(|value| value.as_bytes().map(<[u8]>::to_vec).unwrap_or_default())
                        .map_err(|source| BuildError::Literal {
                            source,
                            loc: loc.clone(),
                        })
                })
                .collect::<Result<Vec<_>, _>>()
                .map(AddressFilter::Literals),
            AddressList::Variable { name, loc } => {
                self.require_variable(name, loc)?;
                Ok(AddressFilter::Variable(name.clone()))
            }
        }
    }

    fn log_entry_selector(
        &self,
        addresses: &AddressList,
        event: &EventSignature,
    ) -> Result<LogEntrySelector, BuildError> {
        let params: Vec<EventParameter> = event
            .params
            .iter()
            .map(|p| EventParameter {
                name: p.name.clone(),
                ty: p.ty.clone(),
                indexed: p.indexed,
            })
            .collect();
        let types: Vec<SolidityType> = params.iter().map(|p| p.ty.clone()).collect();
        let signature = abi::canonical_signature(&event.name, &types);
        Ok(LogEntrySelector {
            addresses: self.address_filter(addresses)?,
            event_name: event.name.clone(),
            params,
            topic0: abi::event_topic(&signature),
        })
    }

    fn contract_query(&mut self, query: &ContractQuery) -> Result<ContractQuerySpec, BuildError> {
        let (method, inputs) = match query {
            // Public state variables are read through their generated getter.
            ContractQuery::Variable(output) => (output.name.clone(), Vec::new()),
            ContractQuery::Function { method, inputs, .. } => {
                let mut converted = Vec::with_capacity(inputs.len());
                for input in inputs {
                    converted.push(ContractInput {
                        name: self.composer.generate_name(PARAM_PREFIX),
                        ty: input.ty.clone(),
                        value: self.typed_accessor(&input.value, &input.ty)?,
                    });
                }
                (method.clone(), converted)
            }
        };
        let input_types: Vec<SolidityType> = inputs.iter().map(|i| i.ty.clone()).collect();
        let signature = abi::canonical_signature(&method, &input_types);
        Ok(ContractQuerySpec {
            function_selector: abi::function_selector(&signature),
            method,
            signature,
            inputs,
            outputs: query
                .outputs()
                .iter()
                .map(|o| (o.name.clone(), o.ty.clone()))
                .collect(),
        })
    }

    // ── Values ──────────────────────────────────────────────────────────

    fn require_variable(&self, name: &str, loc: &SourceLocation) -> Result<(), BuildError> {
        match self.table.resolve(name) {
            Some(_) => Ok(()),
            None => Err(BuildError::UnknownVariable {
                name: name.to_string(),
                loc: loc.clone(),
            }),
        }
    }

    fn accessor(&self, expr: &ValueExpr) -> Result<ValueAccessor, BuildError> {
        match expr {
            ValueExpr::Literal { literal, loc } => parse_untyped(literal)
                .map(ValueAccessor::Literal)
                .map_err(|source| BuildError::Literal {
                    source,
                    loc: loc.clone(),
                }),
            ValueExpr::Variable { name, loc } => {
                self.require_variable(name, loc)?;
                Ok(ValueAccessor::Variable(name.clone()))
            }
            ValueExpr::Call(call) => self.call_accessor(call),
        }
    }

    /// Literals take the expected type; everything else is typed by its
    /// own expression.
    fn typed_accessor(&self, expr: &ValueExpr, ty: &SolidityType) -> Result<ValueAccessor, BuildError> {
        match expr {
            ValueExpr::Literal { literal, loc } => parse_literal(literal, ty)
                .map(ValueAccessor::Literal)
                .map_err(|source| BuildError::Literal {
                    source,
                    loc: loc.clone(),
                }),
            other => self.accessor(other),
        }
    }

    fn call_accessor(&self, call: &MethodCall) -> Result<ValueAccessor, BuildError> {
        let (method, args) = self.resolve_call(call)?;
        Ok(ValueAccessor::Call { method, args })
    }

    fn resolve_call(
        &self,
        call: &MethodCall,
    ) -> Result<(&'static LibraryMethod, Vec<ValueAccessor>), BuildError> {
        let unresolved = || BuildError::UnresolvedMethod {
            name: call.name.clone(),
            loc: call.loc.clone(),
        };
        let arg_types = call
            .args
            .iter()
            .map(|arg| self.table.type_of(arg))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(unresolved)?;
        let method = library::resolve(&call.name, &arg_types).ok_or_else(unresolved)?;
        let args = call
            .args
            .iter()
            .map(|arg| self.accessor(arg))
            .collect::<Result<Vec<_>, _>>()?;
        Ok((method, args))
    }

    fn optional_accessor(&self, expr: &Option<ValueExpr>) -> Result<Option<ValueAccessor>, BuildError> {
        expr.as_ref().map(|e| self.accessor(e)).transpose()
    }

    fn xes_fields(&self, attributes: &[XesAttribute]) -> Result<Vec<XesField>, BuildError> {
        attributes
            .iter()
            .map(|a| {
                Ok(XesField {
                    name: a.name.clone(),
                    xes_type: a.xes_type.clone(),
                    value: self.accessor(&a.value)?,
                })
            })
            .collect()
    }

    // ── Statements ──────────────────────────────────────────────────────

    /// Scopes arrive through `enter_scope`, so they yield no instruction here.
    fn instruction(&mut self, statement: &Statement) -> Result<Option<Instruction>, BuildError> {
        Ok(Some(match statement {
            Statement::Declaration {
                ty,
                name,
                value,
                loc,
            } => {
                let value = self.typed_accessor(value, ty)?;
                self.table
                    .declare(name, ty.clone())
                    .map_err(|source| BuildError::Declaration {
                        source,
                        loc: loc.clone(),
                    })?;
                Instruction::Mutate {
                    target: ValueMutator::Declare(name.clone()),
                    value,
                }
            }
            Statement::Assignment { name, value, loc } => {
                let ty = self
                    .table
                    .resolve(name)
                    .map(|v| v.ty.clone())
                    .ok_or_else(|| BuildError::UnknownVariable {
                        name: name.clone(),
                        loc: loc.clone(),
                    })?;
                Instruction::Mutate {
                    target: ValueMutator::Assign(name.clone()),
                    value: self.typed_accessor(value, &ty)?,
                }
            }
            Statement::Call(call) => {
                let (method, args) = self.resolve_call(call)?;
                Instruction::Call { method, args }
            }
            Statement::Emit(emit) => self.emission(emit)?,
            Statement::Scope(_) => return Ok(None),
        }))
    }

    fn emission(&self, emit: &EmitStatement) -> Result<Instruction, BuildError> {
        Ok(match emit {
            EmitStatement::CsvRow { table, columns, .. } => Instruction::CsvRow {
                table: table.clone(),
                columns: columns
                    .iter()
                    .enumerate()
                    .map(|(i, c)| Ok((c.name(i), self.accessor(&c.value)?)))
                    .collect::<Result<Vec<_>, BuildError>>()?,
            },
            EmitStatement::LogLine { values, .. } => Instruction::LogLine {
                values: values
                    .iter()
                    .map(|v| self.accessor(v))
                    .collect::<Result<Vec<_>, _>>()?,
            },
            EmitStatement::XesEvent {
                pid,
                piid,
                eid,
                attributes,
                ..
            } => Instruction::XesEvent {
                pid: self.optional_accessor(pid)?,
                piid: self.optional_accessor(piid)?,
                eid: self.optional_accessor(eid)?,
                attributes: self.xes_fields(attributes)?,
            },
            EmitStatement::XesTrace {
                pid,
                piid,
                attributes,
                ..
            } => Instruction::XesTrace {
                pid: self.optional_accessor(pid)?,
                piid: self.optional_accessor(piid)?,
                attributes: self.xes_fields(attributes)?,
            },
        })
    }

    fn reduce_condition(&mut self, event: ConditionEvent<'_>) -> Result<(), BuildError> {
        let node = match event {
            ConditionEvent::Value(value) => ConditionNode::Primary(self.accessor(value)?),
            ConditionEvent::Compare(op, _) => ConditionNode::Compare(op),
            ConditionEvent::And(_) => ConditionNode::And,
            ConditionEvent::Or(_) => ConditionNode::Or,
            ConditionEvent::Not(_) => ConditionNode::Not,
        };
        match self.pending.last_mut() {
            Some(Pending::Generic(predicate)) => predicate.reduce(node),
            _ => Err(BuildError::StackUnderflow),
        }
    }
}

impl QueryListener for ProgramBuilder {
    fn enter_scope(&mut self, entry: ScopeEntry<'_>) {
        let pending = if self.error.is_some() {
            Pending::Skipped
        } else {
            match self.open(entry) {
                Ok(pending) => pending,
                Err(error) => {
                    self.error = Some(error);
                    Pending::Skipped
                }
            }
        };
        self.pending.push(pending);

        // Filters were converted against the enclosing frames above.
        let constants = match entry {
            ScopeEntry::Program(_) => Vec::new(),
            ScopeEntry::Filter(node) => scope::constants_for(node),
        };
        self.table.enter_scope(constants);
    }

    fn exit_scope(&mut self, _entry: ScopeEntry<'_>) {
        self.table.exit_scope();
        let pending = self.pending.pop();
        if self.error.is_none() {
            let result = self.close(pending);
            self.record(result);
        }
    }

    fn statement(&mut self, statement: &Statement) {
        if self.error.is_some() {
            return;
        }
        let result = match self.instruction(statement) {
            Ok(Some(instruction)) => self.composer.add_instruction(instruction),
            Ok(None) => Ok(()),
            Err(error) => Err(error),
        };
        self.record(result);
    }

    fn condition(&mut self, event: ConditionEvent<'_>) {
        if self.error.is_some() {
            return;
        }
        let result = self.reduce_condition(event);
        self.record(result);
    }
}
