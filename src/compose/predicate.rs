//! Stack reduction of post-order condition events into a [`Predicate`].

use crate::ast::Comparator;
use crate::program::{Operand, Predicate, ValueAccessor};

use super::BuildError;

#[derive(Debug, Clone)]
pub enum ConditionNode {
    Primary(ValueAccessor),
    Compare(Comparator),
    And,
    Or,
    Not,
}

#[derive(Debug, Default)]
pub struct PredicateBuilder {
    stack: Vec<Operand>,
}

impl PredicateBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// Primaries push an operand; operators pop their operands (right one
    /// on top) and push the combined predicate.
    pub fn reduce(&mut self, node: ConditionNode) -> Result<(), BuildError> {
        let operand = match node {
            ConditionNode::Primary(accessor) => Operand::Value(accessor),
            ConditionNode::Compare(op) => {
                let right = self.pop()?;
                let left = self.pop()?;
                Operand::Predicate(Box::new(Predicate::Compare { left, op, right }))
            }
            ConditionNode::And => {
                let right = self.pop()?.into_predicate();
                let left = self.pop()?.into_predicate();
                Operand::Predicate(Box::new(Predicate::and(left, right)))
            }
            ConditionNode::Or => {
                let right = self.pop()?.into_predicate();
                let left = self.pop()?.into_predicate();
                Operand::Predicate(Box::new(Predicate::or(left, right)))
            }
            ConditionNode::Not => {
                let operand = self.pop()?.into_predicate();
                Operand::Predicate(Box::new(Predicate::negate(operand)))
            }
        };
        self.stack.push(operand);
        Ok(())
    }

    /// Exactly one operand must remain. A lone value becomes a predicate
    /// that requires it to be a bool.
    pub fn finish(mut self) -> Result<Predicate, BuildError> {
        if self.stack.len() != 1 {
            return Err(BuildError::PredicateStack(self.stack.len()));
        }
        self.pop().map(Operand::into_predicate)
    }

    fn pop(&mut self) -> Result<Operand, BuildError> {
        self.stack.pop().ok_or(BuildError::StackUnderflow)
    }
}
