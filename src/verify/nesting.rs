use crate::ast::walk::{QueryListener, ScopeEntry};
use crate::ast::ScopeKind;
use crate::scope::check_nesting;

use super::{Analyzer, Diagnostic};

/// Applies the same ancestor rule the composer enforces, so a document
/// that passes here always composes.
#[derive(Debug, Default)]
pub struct NestingAnalyzer {
    open: Vec<ScopeKind>,
    diagnostics: Vec<Diagnostic>,
}

impl QueryListener for NestingAnalyzer {
    fn enter_scope(&mut self, entry: ScopeEntry<'_>) {
        if let Err(violation) = check_nesting(&self.open, entry.kind()) {
            self.diagnostics
                .push(Diagnostic::error("E201", violation.to_string(), entry.loc()));
        }
        self.open.push(entry.kind());
    }

    fn exit_scope(&mut self, _entry: ScopeEntry<'_>) {
        self.open.pop();
    }
}

impl Analyzer for NestingAnalyzer {
    fn name(&self) -> &'static str {
        "nesting"
    }

    fn reset(&mut self) {
        self.open.clear();
        self.diagnostics.clear();
    }

    fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }
}
