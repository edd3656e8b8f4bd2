//! The compilation pipeline: lex, parse, analyze, and build the program
//! only when analysis found no errors.

use thiserror::Error;
use tracing::{debug, info};

use crate::ast::{Document, SourceLocation};
use crate::compose::{build_program, BuildError};
use crate::config::QueryConfig;
use crate::lexer::Lexer;
use crate::parser::Parser;
use crate::program::Program;
use crate::verify::{self, Diagnostic};

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("query rejected with {} error(s)", .0.iter().filter(|d| d.is_error()).count())]
    Rejected(Vec<Diagnostic>),
    /// The analyzers accepted a document the composer could not build.
    #[error("internal build error: {0}")]
    Build(#[from] BuildError),
}

impl CompileError {
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            CompileError::Rejected(diagnostics) => diagnostics,
            CompileError::Build(_) => &[],
        }
    }
}

#[derive(Debug)]
pub struct CompiledQuery {
    pub config: QueryConfig,
    pub program: Program,
    /// Warnings and infos; a compiled query never carries errors.
    pub diagnostics: Vec<Diagnostic>,
}

/// Lexes and parses, turning the first syntax error into a diagnostic.
pub fn parse_query(source: &str, filename: &str) -> Result<Document, Diagnostic> {
    let tokens = Lexer::new(source, filename).tokenize().map_err(|e| {
        let loc = SourceLocation::new(&e.file, e.line, e.column);
        Diagnostic::error("S001", e.message, &loc)
    })?;
    Parser::new(tokens).parse().map_err(|e| {
        let loc = SourceLocation::new(&e.file, e.line, e.column);
        Diagnostic::error("S002", e.message, &loc)
    })
}

pub fn compile_document(document: &Document) -> Result<CompiledQuery, CompileError> {
    let diagnostics = verify::analyze(document);
    if verify::has_errors(&diagnostics) {
        info!(count = diagnostics.len(), "query rejected");
        return Err(CompileError::Rejected(diagnostics));
    }
    let program = build_program(document)?;
    debug!(
        scopes = program.scope_count(),
        warnings = diagnostics.len(),
        "query compiled"
    );
    Ok(CompiledQuery {
        config: QueryConfig::from_document(document),
        program,
        diagnostics,
    })
}

pub fn compile_query(source: &str, filename: &str) -> Result<CompiledQuery, CompileError> {
    let document = parse_query(source, filename).map_err(|d| CompileError::Rejected(vec![d]))?;
    compile_document(&document)
}
