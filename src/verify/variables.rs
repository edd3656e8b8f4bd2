use crate::ast::walk::{ConditionEvent, QueryListener, ScopeEntry};
use crate::ast::{AddressList, BlockBound, Filter, SourceLocation, Statement, ValueExpr};
use crate::scope::{self, ScopeTable};

use super::{Analyzer, Diagnostic};

/// Every name use is a declaration, an assignment or a reference; each
/// must agree with what the open scopes define.
#[derive(Debug, Default)]
pub struct VariableAnalyzer {
    table: ScopeTable,
    diagnostics: Vec<Diagnostic>,
}

impl VariableAnalyzer {
    fn check_value(&mut self, value: &ValueExpr) {
        match value {
            ValueExpr::Literal { .. } => {}
            ValueExpr::Variable { name, loc } => self.check_name(name, loc),
            ValueExpr::Call(call) => {
                for arg in &call.args {
                    self.check_value(arg);
                }
            }
        }
    }

    fn check_name(&mut self, name: &str, loc: &SourceLocation) {
        if self.table.resolve(name).is_none() {
            self.diagnostics.push(Diagnostic::error(
                "E100",
                format!("unknown variable '{}'", name),
                loc,
            ));
        }
    }

    fn check_bound(&mut self, bound: &BlockBound) {
        if let BlockBound::Variable { name, loc } = bound {
            self.check_name(name, loc);
        }
    }

    fn check_addresses(&mut self, list: &AddressList) {
        if let AddressList::Variable { name, loc } = list {
            self.check_name(name, loc);
        }
    }

    /// Filter operands are evaluated in the enclosing scope.
    fn check_filter(&mut self, filter: &Filter) {
        match filter {
            Filter::Blocks { from, to } => {
                self.check_bound(from);
                self.check_bound(to);
            }
            Filter::Transactions {
                senders,
                recipients,
            } => {
                self.check_addresses(senders);
                self.check_addresses(recipients);
            }
            Filter::LogEntries { addresses, .. } => self.check_addresses(addresses),
            Filter::SmartContract { address, queries } => {
                self.check_addresses(address);
                for query in queries {
                    for input in query.inputs() {
                        self.check_value(&input.value);
                    }
                }
            }
            Filter::Generic { .. } => {}
        }
    }
}

impl QueryListener for VariableAnalyzer {
    fn enter_scope(&mut self, entry: ScopeEntry<'_>) {
        let constants = match entry {
            ScopeEntry::Program(_) => Vec::new(),
            ScopeEntry::Filter(node) => {
                self.check_filter(&node.filter);
                scope::constants_for(node)
            }
        };
        for constant in &constants {
            if self.table.resolve(&constant.name).is_some() {
                self.diagnostics.push(Diagnostic::error(
                    "E104",
                    format!(
                        "'{}' is already visible and cannot be redefined by this {} scope",
                        constant.name,
                        entry.kind()
                    ),
                    entry.loc(),
                ));
            }
        }
        self.table.enter_scope(constants);
    }

    fn exit_scope(&mut self, _entry: ScopeEntry<'_>) {
        self.table.exit_scope();
    }

    fn statement(&mut self, statement: &Statement) {
        match statement {
            Statement::Declaration {
                ty,
                name,
                value,
                loc,
            } => {
                self.check_value(value);
                if let Err(e) = self.table.declare(name, ty.clone()) {
                    self.diagnostics.push(Diagnostic::error("E101", e.to_string(), loc));
                }
            }
            Statement::Assignment { name, value, loc } => {
                self.check_value(value);
                match self.table.resolve(name) {
                    None => self.diagnostics.push(Diagnostic::error(
                        "E102",
                        format!("cannot assign to unknown variable '{}'", name),
                        loc,
                    )),
                    Some(var) if var.is_constant => self.diagnostics.push(Diagnostic::error(
                        "E103",
                        format!("cannot assign to constant '{}'", name),
                        loc,
                    )),
                    Some(_) => {}
                }
            }
            Statement::Call(call) => {
                for arg in &call.args {
                    self.check_value(arg);
                }
            }
            Statement::Emit(emit) => {
                for value in emit.values() {
                    self.check_value(value);
                }
            }
            Statement::Scope(_) => {}
        }
    }

    fn condition(&mut self, event: ConditionEvent<'_>) {
        if let ConditionEvent::Value(value) = event {
            self.check_value(value);
        }
    }
}

impl Analyzer for VariableAnalyzer {
    fn name(&self) -> &'static str {
        "variables"
    }

    fn reset(&mut self) {
        self.table.clear();
        self.diagnostics.clear();
    }

    fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }
}
