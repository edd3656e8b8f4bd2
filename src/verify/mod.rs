//! Semantic analysis of a parsed query.
//!
//! Each analyzer is a walk listener with its own state and diagnostic
//! list; [`analyze`] runs them one after another over the same document and
//! merges what they report. Codes are grouped by analyzer:
//!
//! - `E1xx` variable existence and uniqueness
//! - `E2xx` filter nesting
//! - `E3xx` filter definitions
//! - `E4xx` type checking
//! - `E5xx`/`W5xx` emission statements

pub mod emission;
pub mod filters;
pub mod nesting;
pub mod type_check;
pub mod variables;

use std::fmt;

use serde::Serialize;

use crate::ast::walk::{walk, QueryListener};
use crate::ast::{Document, SourceLocation};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: &'static str,
    pub message: String,
    pub file: String,
    pub line: usize,
    pub column: usize,
}

impl Diagnostic {
    pub fn new(severity: Severity, code: &'static str, message: String, loc: &SourceLocation) -> Self {
        Self {
            severity,
            code,
            message,
            file: loc.file.clone(),
            line: loc.line,
            column: loc.column,
        }
    }

    pub fn error(code: &'static str, message: String, loc: &SourceLocation) -> Self {
        Self::new(Severity::Error, code, message, loc)
    }

    pub fn warning(code: &'static str, message: String, loc: &SourceLocation) -> Self {
        Self::new(Severity::Warning, code, message, loc)
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sev = match self.severity {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
        };
        write!(
            f,
            "[{}] {}: {}:{}:{}: {}",
            sev, self.code, self.file, self.line, self.column, self.message
        )
    }
}

pub trait Analyzer: QueryListener {
    fn name(&self) -> &'static str;
    /// Clears all state so the analyzer can run again.
    fn reset(&mut self);
    fn take_diagnostics(&mut self) -> Vec<Diagnostic>;
}

pub fn analyzers() -> Vec<Box<dyn Analyzer>> {
    vec![
        Box::new(variables::VariableAnalyzer::default()),
        Box::new(nesting::NestingAnalyzer::default()),
        Box::new(filters::FilterAnalyzer::default()),
        Box::new(type_check::TypeChecker::default()),
        Box::new(emission::EmissionAnalyzer::default()),
    ]
}

pub fn run_analyzer(analyzer: &mut dyn Analyzer, document: &Document) -> Vec<Diagnostic> {
    analyzer.reset();
    walk(document, analyzer);
    analyzer.take_diagnostics()
}

/// Every diagnostic of every analyzer, ordered by source position.
pub fn analyze(document: &Document) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    for mut analyzer in analyzers() {
        let found = run_analyzer(analyzer.as_mut(), document);
        tracing::debug!(analyzer = analyzer.name(), count = found.len(), "analysis pass");
        diagnostics.extend(found);
    }
    diagnostics.sort_by_key(|d| (d.line, d.column));
    diagnostics
}

pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_error)
}

/// Names that occur more than once, each reported once, in first-seen order.
pub(crate) fn duplicates<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<&'a str> {
    let mut seen = std::collections::HashSet::new();
    let mut reported = Vec::new();
    for name in names {
        if !seen.insert(name) && !reported.contains(&name) {
            reported.push(name);
        }
    }
    reported
}
