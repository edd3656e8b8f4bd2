//! Static type checker.
//!
//! Infers value types through the scope table and library signatures and
//! checks:
//! - E401/E402: declaration and assignment values against the variable type
//! - E403/E404: method names and overloads
//! - E405..E410: conditions, reduced bottom-up on a type stack
//! - E411: smart-contract call inputs against their declared types
//! - E412: untyped literals (conditions, emissions, call arguments) that
//!   do not parse as their own inferred type

use crate::ast::walk::{ConditionEvent, QueryListener, ScopeEntry};
use crate::ast::{Comparator, ContractQuery, Filter, MethodCall, SourceLocation, Statement, ValueExpr};
use crate::library;
use crate::scope::{self, ScopeTable};
use crate::types::literal::parse_untyped;
use crate::types::{are_compatible, parse_literal, type_of, SolidityType};

use super::{Analyzer, Diagnostic};

#[derive(Debug, Default)]
pub struct TypeChecker {
    table: ScopeTable,
    /// Operand types of the condition being reduced; `None` marks an
    /// operand whose type is unknown and already reported.
    stack: Vec<Option<SolidityType>>,
    condition: Option<SourceLocation>,
    diagnostics: Vec<Diagnostic>,
}

impl TypeChecker {
    fn error(&mut self, code: &'static str, message: String, loc: &SourceLocation) {
        self.diagnostics.push(Diagnostic::error(code, message, loc));
    }

    // ── Values ──────────────────────────────────────────────────────────

    fn value_type(&mut self, value: &ValueExpr) -> Option<SolidityType> {
        match value {
            ValueExpr::Literal { literal, loc } => {
                if let Err(e) = parse_untyped(literal) {
                    self.error("E412", format!("invalid literal: {}", e), loc);
                    return None;
                }
                type_of(literal)
            }
            ValueExpr::Variable { name, .. } => self.table.resolve(name).map(|v| v.ty.clone()),
            ValueExpr::Call(call) => self.call_type(call),
        }
    }

    fn call_type(&mut self, call: &MethodCall) -> Option<SolidityType> {
        let arg_types: Vec<Option<SolidityType>> =
            call.args.iter().map(|arg| self.value_type(arg)).collect();
        if !library::has_method(&call.name) {
            self.error("E403", format!("unknown method '{}'", call.name), &call.loc);
            return None;
        }
        let arg_types: Vec<SolidityType> = arg_types.into_iter().collect::<Option<_>>()?;
        match library::resolve(&call.name, &arg_types) {
            Some(method) => Some(method.returns.clone()),
            None => {
                let listed: Vec<String> = arg_types.iter().map(|t| t.to_string()).collect();
                let message = format!(
                    "no overload of '{}' accepts ({})",
                    call.name,
                    listed.join(", ")
                );
                self.error("E404", message, &call.loc);
                None
            }
        }
    }

    /// Literals must parse as the target type; other values must have a
    /// compatible static type.
    fn check_assignable(&mut self, code: &'static str, value: &ValueExpr, target: &SolidityType) {
        match value {
            ValueExpr::Literal { literal, loc } => {
                if let Err(e) = parse_literal(literal, target) {
                    self.error(code, format!("cannot use literal as {}: {}", target, e), loc);
                }
            }
            other => {
                if let Some(found) = self.value_type(other) {
                    if !are_compatible(&found, target) {
                        let message = format!("expected a value of type {}, found {}", target, found);
                        self.error(code, message, other.loc());
                    }
                }
            }
        }
    }

    fn check_contract_inputs(&mut self, queries: &[ContractQuery]) {
        for query in queries {
            for input in query.inputs() {
                self.check_assignable("E411", &input.value, &input.ty);
            }
        }
    }

    // ── Conditions ──────────────────────────────────────────────────────

    fn pop(&mut self) -> Option<SolidityType> {
        self.stack.pop().flatten()
    }

    fn reduce(&mut self, event: ConditionEvent<'_>) {
        self.condition.get_or_insert_with(|| event.loc().clone());
        let result = match event {
            ConditionEvent::Value(value) => self.value_type(value),
            ConditionEvent::Compare(op, loc) => {
                let right = self.pop();
                let left = self.pop();
                if let (Some(left), Some(right)) = (left, right) {
                    self.check_comparison(&left, op, &right, loc);
                }
                Some(SolidityType::Bool)
            }
            ConditionEvent::And(loc) | ConditionEvent::Or(loc) => {
                let right = self.pop();
                let left = self.pop();
                for operand in [left, right].into_iter().flatten() {
                    if !operand.is_bool() {
                        self.error("E408", format!("logical operand must be bool, not {}", operand), loc);
                    }
                }
                Some(SolidityType::Bool)
            }
            ConditionEvent::Not(loc) => {
                if let Some(operand) = self.pop() {
                    if !operand.is_bool() {
                        self.error("E409", format!("'!' needs a bool operand, not {}", operand), loc);
                    }
                }
                Some(SolidityType::Bool)
            }
        };
        self.stack.push(result);
    }

    fn check_comparison(
        &mut self,
        left: &SolidityType,
        op: Comparator,
        right: &SolidityType,
        loc: &SourceLocation,
    ) {
        match op {
            Comparator::In => {
                let ok = right.element().is_some_and(|el| are_compatible(left, el));
                if !ok {
                    let message = format!("IN needs an array of {} on the right, found {}", left, right);
                    self.error("E406", message, loc);
                }
            }
            op if op.is_ordering() => {
                if !left.is_integer() || !right.is_integer() {
                    let message = format!("'{}' needs integer operands, found {} and {}", op, left, right);
                    self.error("E407", message, loc);
                }
            }
            op => {
                if !are_compatible(left, right) {
                    let message = format!("cannot compare {} {} {}", left, op, right);
                    self.error("E405", message, loc);
                }
            }
        }
    }

    /// Called at the first event after a condition; the reduced type must
    /// be bool.
    fn finish_condition(&mut self) {
        if let Some(loc) = self.condition.take() {
            if let Some(ty) = self.pop() {
                if !ty.is_bool() {
                    self.error("E410", format!("condition must be bool, not {}", ty), &loc);
                }
            }
            self.stack.clear();
        }
    }
}

impl QueryListener for TypeChecker {
    fn enter_scope(&mut self, entry: ScopeEntry<'_>) {
        self.finish_condition();
        let constants = match entry {
            ScopeEntry::Program(_) => Vec::new(),
            ScopeEntry::Filter(node) => {
                if let Filter::SmartContract { queries, .. } = &node.filter {
                    self.check_contract_inputs(queries);
                }
                scope::constants_for(node)
            }
        };
        self.table.enter_scope(constants);
    }

    fn exit_scope(&mut self, _entry: ScopeEntry<'_>) {
        self.finish_condition();
        self.table.exit_scope();
    }

    fn statement(&mut self, statement: &Statement) {
        self.finish_condition();
        match statement {
            Statement::Declaration { ty, name, value, .. } => {
                self.check_assignable("E401", value, ty);
                let _ = self.table.declare(name, ty.clone());
            }
            Statement::Assignment { name, value, .. } => {
                if let Some(ty) = self.table.resolve(name).map(|v| v.ty.clone()) {
                    self.check_assignable("E402", value, &ty);
                }
            }
            Statement::Call(call) => {
                self.call_type(call);
            }
            Statement::Emit(emit) => {
                for value in emit.values() {
                    self.value_type(value);
                }
            }
            Statement::Scope(_) => {}
        }
    }

    fn condition(&mut self, event: ConditionEvent<'_>) {
        self.reduce(event);
    }
}

impl Analyzer for TypeChecker {
    fn name(&self) -> &'static str {
        "types"
    }

    fn reset(&mut self) {
        self.table.clear();
        self.stack.clear();
        self.condition = None;
        self.diagnostics.clear();
    }

    fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }
}
