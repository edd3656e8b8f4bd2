//! Shape checks for each filter kind: block bounds, address lists, event
//! parameters and contract queries.

use crate::ast::walk::{QueryListener, ScopeEntry};
use crate::ast::{AddressList, BlockBound, ContractQuery, EventSignature, Filter, SourceLocation, Statement};
use crate::scope::{self, ScopeTable};
use crate::types::{parse_literal, Literal, SolidityType};

use super::{duplicates, Analyzer, Diagnostic};

#[derive(Debug, Default)]
pub struct FilterAnalyzer {
    table: ScopeTable,
    diagnostics: Vec<Diagnostic>,
}

impl FilterAnalyzer {
    fn error(&mut self, code: &'static str, message: String, loc: &SourceLocation) {
        self.diagnostics.push(Diagnostic::error(code, message, loc));
    }

    fn check_filter(&mut self, filter: &Filter, loc: &SourceLocation) {
        match filter {
            Filter::Blocks { from, to } => self.check_block_range(from, to),
            Filter::Transactions {
                senders,
                recipients,
            } => {
                self.check_addresses(senders);
                self.check_addresses(recipients);
            }
            Filter::LogEntries { addresses, event } => {
                self.check_addresses(addresses);
                self.check_event(event);
            }
            Filter::SmartContract { address, queries } => {
                self.check_addresses(address);
                self.check_single_address(address);
                self.check_queries(queries, loc);
            }
            Filter::Generic { .. } => {}
        }
    }

    // ── Block ranges ────────────────────────────────────────────────────

    fn check_block_range(&mut self, from: &BlockBound, to: &BlockBound) {
        let from_number = self.check_bound(from);
        let to_number = self.check_bound(to);

        if let BlockBound::Continuous(loc) = from {
            self.error("E303", "CONTINUOUS cannot be the start of a block range".into(), loc);
        }
        if let BlockBound::Earliest(loc) = to {
            self.error("E304", "EARLIEST cannot be the end of a block range".into(), loc);
        }
        if let (Some(start), Some(end)) = (from_number, to_number) {
            if start > end {
                self.error(
                    "E305",
                    format!("block range starts at {} but ends at {}", start, end),
                    from.loc(),
                );
            }
        }
    }

    /// The literal height, when the bound is one.
    fn check_bound(&mut self, bound: &BlockBound) -> Option<u64> {
        match bound {
            BlockBound::Number { text, loc } => match text.parse::<u64>() {
                Ok(n) => Some(n),
                Err(_) => {
                    self.error("E301", format!("'{}' is not a valid block number", text), loc);
                    None
                }
            },
            BlockBound::Variable { name, loc } => {
                if let Some(var) = self.table.resolve(name) {
                    if !var.ty.is_integer() {
                        let message = format!("block bound '{}' must be an integer, not {}", name, var.ty);
                        self.error("E302", message, loc);
                    }
                }
                None
            }
            _ => None,
        }
    }

    // ── Addresses ───────────────────────────────────────────────────────

    fn check_addresses(&mut self, list: &AddressList) {
        match list {
            AddressList::Any(_) => {}
            AddressList::Literals { addresses, loc } => {
                if addresses.is_empty() {
                    self.error("E306", "address list is empty".into(), loc);
                }
                for text in addresses {
                    if let Err(e) = parse_literal(&Literal::Hex(text.clone()), &SolidityType::Address) {
                        self.error("E306", format!("invalid address: {}", e), loc);
                    }
                }
            }
            AddressList::Variable { name, loc } => {
                if let Some(var) = self.table.resolve(name) {
                    let ok = var.ty.is_address() || var.ty.element().is_some_and(SolidityType::is_address);
                    if !ok {
                        let message = format!("'{}' must be an address or address[], not {}", name, var.ty);
                        self.error("E307", message, loc);
                    }
                }
            }
        }
    }

    fn check_single_address(&mut self, list: &AddressList) {
        let single = match list {
            AddressList::Any(_) => false,
            AddressList::Literals { addresses, .. } => addresses.len() == 1,
            AddressList::Variable { name, .. } => self
                .table
                .resolve(name)
                .map_or(true, |var| var.ty.is_address()),
        };
        if !single {
            self.error(
                "E310",
                "a smart contract filter needs exactly one address".into(),
                list.loc(),
            );
        }
    }

    // ── Events and contract queries ─────────────────────────────────────

    fn check_event(&mut self, event: &EventSignature) {
        if event.params.is_empty() {
            self.error(
                "E308",
                format!("event '{}' declares no parameters", event.name),
                &event.loc,
            );
        }
        for name in duplicates(event.params.iter().map(|p| p.name.as_str())) {
            self.error(
                "E309",
                format!("event '{}' declares '{}' more than once", event.name, name),
                &event.loc,
            );
        }
    }

    fn check_queries(&mut self, queries: &[ContractQuery], loc: &SourceLocation) {
        if queries.is_empty() {
            self.error("E308", "smart contract filter declares no queries".into(), loc);
        }
        for query in queries {
            if let ContractQuery::Function { outputs, method, loc, .. } = query {
                if outputs.is_empty() {
                    self.error("E308", format!("call to '{}' declares no outputs", method), loc);
                }
            }
        }
        let names = queries
            .iter()
            .flat_map(ContractQuery::outputs)
            .map(|o| o.name.as_str());
        for name in duplicates(names) {
            self.error(
                "E309",
                format!("contract output '{}' is declared more than once", name),
                loc,
            );
        }
    }
}

impl QueryListener for FilterAnalyzer {
    fn enter_scope(&mut self, entry: ScopeEntry<'_>) {
        let constants = match entry {
            ScopeEntry::Program(_) => Vec::new(),
            ScopeEntry::Filter(node) => {
                self.check_filter(&node.filter, &node.loc);
                scope::constants_for(node)
            }
        };
        self.table.enter_scope(constants);
    }

    fn exit_scope(&mut self, _entry: ScopeEntry<'_>) {
        self.table.exit_scope();
    }

    fn statement(&mut self, statement: &Statement) {
        // Redeclarations are reported by the variable analyzer.
        if let Statement::Declaration { ty, name, .. } = statement {
            let _ = self.table.declare(name, ty.clone());
        }
    }
}

impl Analyzer for FilterAnalyzer {
    fn name(&self) -> &'static str {
        "filters"
    }

    fn reset(&mut self) {
        self.table.clear();
        self.diagnostics.clear();
    }

    fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }
}
