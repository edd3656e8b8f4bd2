//! The executable instruction tree produced by the composer.
//!
//! A [`Program`] owns its top-level instructions; every [`Scope`] owns its
//! children. The tree is immutable once built and is executed by
//! [`crate::runtime::interpreter`].

pub mod predicate;
pub mod selector;
pub mod state;
pub mod value;

use thiserror::Error;

use crate::ast::{ScopeKind, SourceLocation};
use crate::library::LibraryMethod;
use crate::runtime::client::ClientError;
use crate::runtime::sink::SinkError;
use crate::types::LiteralError;

pub use predicate::{Operand, Predicate};
pub use selector::Selector;
pub use state::{CancelFlag, ProgramState};
pub use value::{ValueAccessor, ValueMutator};

#[derive(Debug, Default)]
pub struct Program {
    pub instructions: Vec<Instruction>,
}

impl Program {
    /// Number of scopes in the tree, the root excluded.
    pub fn scope_count(&self) -> usize {
        fn count(instructions: &[Instruction]) -> usize {
            instructions
                .iter()
                .map(|i| match i {
                    Instruction::Scope(scope) => 1 + count(&scope.children),
                    _ => 0,
                })
                .sum()
        }
        count(&self.instructions)
    }
}

#[derive(Debug)]
pub struct Scope {
    pub selector: Selector,
    pub children: Vec<Instruction>,
    pub loc: SourceLocation,
}

impl Scope {
    pub fn kind(&self) -> ScopeKind {
        self.selector.kind()
    }
}

/// A process-mining attribute: value, explicit XES type if one was written,
/// and key.
#[derive(Debug)]
pub struct XesField {
    pub name: String,
    pub xes_type: Option<String>,
    pub value: ValueAccessor,
}

#[derive(Debug)]
pub enum Instruction {
    Mutate {
        target: ValueMutator,
        value: ValueAccessor,
    },
    Call {
        method: &'static LibraryMethod,
        args: Vec<ValueAccessor>,
    },
    CsvRow {
        table: String,
        columns: Vec<(String, ValueAccessor)>,
    },
    LogLine {
        values: Vec<ValueAccessor>,
    },
    XesEvent {
        pid: Option<ValueAccessor>,
        piid: Option<ValueAccessor>,
        eid: Option<ValueAccessor>,
        attributes: Vec<XesField>,
    },
    XesTrace {
        pid: Option<ValueAccessor>,
        piid: Option<ValueAccessor>,
        attributes: Vec<XesField>,
    },
    Scope(Scope),
}

// ── Errors ──────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ProgramError {
    #[error("unknown variable '{0}'")]
    UnknownVariable(String),
    #[error("type error: {0}")]
    Type(String),
    #[error("{method}(): {message}")]
    Library { method: String, message: String },
    #[error("cannot decode {what}: {message}")]
    Decode { what: String, message: String },
    #[error("{0} scope has no enclosing {1} to read from")]
    MissingContext(ScopeKind, &'static str),
    #[error(transparent)]
    Literal(#[from] LiteralError),
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error(transparent)]
    Sink(#[from] SinkError),
    #[error("in {kind} scope {selector} at {loc}: {source}")]
    Scoped {
        kind: ScopeKind,
        selector: String,
        loc: SourceLocation,
        source: Box<ProgramError>,
    },
}

impl ProgramError {
    pub fn type_error(message: impl Into<String>) -> Self {
        ProgramError::Type(message.into())
    }

    /// Attach the innermost scope to an error; outer scopes keep the
    /// innermost context.
    pub fn within(self, scope: &Scope) -> Self {
        match self {
            scoped @ ProgramError::Scoped { .. } => scoped,
            other => ProgramError::Scoped {
                kind: scope.kind(),
                selector: scope.selector.to_string(),
                loc: scope.loc.clone(),
                source: Box::new(other),
            },
        }
    }

    /// The error with any scope context removed.
    pub fn root_cause(&self) -> &ProgramError {
        match self {
            ProgramError::Scoped { source, .. } => source.root_cause(),
            other => other,
        }
    }
}
