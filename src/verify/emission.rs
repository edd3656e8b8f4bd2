use crate::ast::walk::QueryListener;
use crate::ast::{EmitStatement, SourceLocation, Statement, XesAttribute};

use super::{duplicates, Analyzer, Diagnostic};

pub const XES_TYPES: &[&str] = &["xs:string", "xs:int", "xs:float", "xs:boolean", "xs:date", "xs:id"];

/// Attributes a certified event log expects on every event. Their absence
/// only lowers the certification level.
const RECOMMENDED_EVENT_KEYS: &[&str] = &["timestamp", "transition", "resource"];

#[derive(Debug, Default)]
pub struct EmissionAnalyzer {
    diagnostics: Vec<Diagnostic>,
}

impl EmissionAnalyzer {
    fn check_unique<'a>(&mut self, names: impl IntoIterator<Item = &'a str>, what: &str, loc: &SourceLocation) {
        for name in duplicates(names) {
            self.diagnostics.push(Diagnostic::error(
                "E502",
                format!("{} '{}' is emitted more than once", what, name),
                loc,
            ));
        }
    }

    fn check_xes(&mut self, attributes: &[XesAttribute], loc: &SourceLocation) {
        self.check_unique(attributes.iter().map(|a| a.name.as_str()), "attribute", loc);
        for attribute in attributes {
            if let Some(ty) = &attribute.xes_type {
                if !XES_TYPES.contains(&ty.as_str()) {
                    self.diagnostics.push(Diagnostic::error(
                        "E506",
                        format!("unknown XES type '{}' for attribute '{}'", ty, attribute.name),
                        &attribute.loc,
                    ));
                }
            }
        }
    }
}

impl QueryListener for EmissionAnalyzer {
    fn statement(&mut self, statement: &Statement) {
        let Statement::Emit(emit) = statement else {
            return;
        };
        match emit {
            EmitStatement::CsvRow { table, columns, loc } => {
                if table.trim().is_empty() {
                    self.diagnostics
                        .push(Diagnostic::error("E503", "CSV table name is empty".into(), loc));
                }
                if columns.is_empty() {
                    self.diagnostics
                        .push(Diagnostic::error("E501", "CSV row has no columns".into(), loc));
                }
                let names: Vec<String> = columns.iter().enumerate().map(|(i, c)| c.name(i)).collect();
                self.check_unique(names.iter().map(String::as_str), "column", loc);
            }
            EmitStatement::LogLine { values, loc } => {
                if values.is_empty() {
                    self.diagnostics
                        .push(Diagnostic::error("E504", "log line has no values".into(), loc));
                }
            }
            EmitStatement::XesEvent { attributes, loc, .. } => {
                self.check_xes(attributes, loc);
                if !attributes.iter().any(|a| a.name == "name") {
                    self.diagnostics.push(Diagnostic::error(
                        "E505",
                        "XES event needs a 'name' attribute".into(),
                        loc,
                    ));
                }
                for key in RECOMMENDED_EVENT_KEYS {
                    if !attributes.iter().any(|a| a.name == *key) {
                        self.diagnostics.push(Diagnostic::warning(
                            "W501",
                            format!("XES event has no '{}' attribute", key),
                            loc,
                        ));
                    }
                }
            }
            EmitStatement::XesTrace { attributes, loc, .. } => self.check_xes(attributes, loc),
        }
    }
}

impl Analyzer for EmissionAnalyzer {
    fn name(&self) -> &'static str {
        "emission"
    }

    fn reset(&mut self) {
        self.diagnostics.clear();
    }

    fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }
}
