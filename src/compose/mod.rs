//! Build-time assembly of the instruction tree.
//!
//! [`SpecificationComposer`] is the scope state machine: every `prepare`
//! opens a scope and a pending child list, every `build` closes the
//! innermost one into an immutable [`Scope`]. [`builder::ProgramBuilder`]
//! drives it from the document walk.

pub mod builder;
pub mod predicate;

use thiserror::Error;

use crate::ast::{ScopeKind, SourceLocation};
use crate::program::{Instruction, Program, Scope, Selector};
use crate::scope::{check_nesting, AlreadyDefined, NestingViolation};
use crate::types::LiteralError;

pub use builder::{build_program, ProgramBuilder};
pub use predicate::{ConditionNode, PredicateBuilder};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BuildError {
    #[error("cannot open scope at {loc}: {violation}")]
    Nesting {
        violation: NestingViolation,
        loc: SourceLocation,
    },
    #[error("cannot build a {found} scope while a {open} scope is open")]
    Mismatch { open: ScopeKind, found: ScopeKind },
    #[error("unfinished {kind} scope opened at {loc}")]
    Unfinished { kind: ScopeKind, loc: SourceLocation },
    #[error("no scope is open")]
    NothingOpen,
    #[error("condition left {0} operands on the stack instead of one")]
    PredicateStack(usize),
    #[error("condition operator is missing an operand")]
    StackUnderflow,
    #[error("{loc}: {source}")]
    Literal {
        source: LiteralError,
        loc: SourceLocation,
    },
    #[error("{loc}: no overload of '{name}' accepts the given arguments")]
    UnresolvedMethod { name: String, loc: SourceLocation },
    #[error("{loc}: {source}")]
    Declaration {
        source: AlreadyDefined,
        loc: SourceLocation,
    },
    #[error("{loc}: unknown variable '{name}'")]
    UnknownVariable { name: String, loc: SourceLocation },
    #[error("{loc}: invalid block number '{text}'")]
    BlockNumber { text: String, loc: SourceLocation },
}

/// Sequential names for generated identifiers, owned by one composer so
/// that compilation stays re-entrant.
#[derive(Debug, Default)]
pub struct NameGenerator {
    next: usize,
}

impl NameGenerator {
    pub fn next_name(&mut self, prefix: &str) -> String {
        let name = format!("{}{}", prefix, self.next);
        self.next += 1;
        name
    }
}

struct OpenScope {
    kind: ScopeKind,
    loc: SourceLocation,
    children: Vec<Instruction>,
}

#[derive(Default)]
pub struct SpecificationComposer {
    open: Vec<OpenScope>,
    names: NameGenerator,
}

impl SpecificationComposer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open_kinds(&self) -> Vec<ScopeKind> {
        self.open.iter().map(|s| s.kind).collect()
    }

    pub fn depth(&self) -> usize {
        self.open.len()
    }

    pub fn prepare(&mut self, kind: ScopeKind, loc: SourceLocation) -> Result<(), BuildError> {
        check_nesting(&self.open_kinds(), kind)
            .map_err(|violation| BuildError::Nesting { violation, loc: loc.clone() })?;
        self.open.push(OpenScope {
            kind,
            loc,
            children: Vec::new(),
        });
        Ok(())
    }

    /// Closes the innermost scope, which must be of the selector's kind,
    /// and appends it to its parent.
    pub fn build(&mut self, selector: Selector) -> Result<(), BuildError> {
        let top = self.open.last().ok_or(BuildError::NothingOpen)?;
        if top.kind == ScopeKind::Program || top.kind != selector.kind() {
            return Err(BuildError::Mismatch {
                open: top.kind,
                found: selector.kind(),
            });
        }
        let OpenScope { loc, children, .. } = self.open.pop().ok_or(BuildError::NothingOpen)?;
        let scope = Scope {
            selector,
            children,
            loc,
        };
        self.add_instruction(Instruction::Scope(scope))
    }

    pub fn add_instruction(&mut self, instruction: Instruction) -> Result<(), BuildError> {
        let top = self.open.last_mut().ok_or(BuildError::NothingOpen)?;
        top.children.push(instruction);
        Ok(())
    }

    /// Finalises the root. Only the program scope may still be open.
    pub fn build_program(mut self) -> Result<Program, BuildError> {
        match self.open.len() {
            0 => Err(BuildError::NothingOpen),
            1 if self.open[0].kind == ScopeKind::Program => {
                let root = self.open.remove(0);
                Ok(Program {
                    instructions: root.children,
                })
            }
            _ => {
                let innermost = &self.open[self.open.len() - 1];
                Err(BuildError::Unfinished {
                    kind: innermost.kind,
                    loc: innermost.loc.clone(),
                })
            }
        }
    }

    pub fn generate_name(&mut self, prefix: &str) -> String {
        self.names.next_name(prefix)
    }
}
