//! Lazy boolean predicates over program state.

use std::fmt;

use crate::ast::Comparator;
use crate::types::Value;

use super::value::values_equal;
use super::{ProgramError, ProgramState, ValueAccessor};

/// An operand of a comparison: a plain value or a nested predicate whose
/// truth value is compared.
#[derive(Debug, Clone)]
pub enum Operand {
    Value(ValueAccessor),
    Predicate(Box<Predicate>),
}

impl Operand {
    pub fn evaluate(&self, state: &ProgramState<'_>) -> Result<Value, ProgramError> {
        match self {
            Operand::Value(accessor) => accessor.evaluate(state),
            Operand::Predicate(predicate) => predicate.test(state).map(Value::Bool),
        }
    }

    /// Bare boolean values become predicates when used as logical operands.
    pub fn into_predicate(self) -> Predicate {
        match self {
            Operand::Value(accessor) => Predicate::Value(accessor),
            Operand::Predicate(predicate) => *predicate,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Predicate {
    /// A value that must evaluate to a bool.
    Value(ValueAccessor),
    Compare {
        left: Operand,
        op: Comparator,
        right: Operand,
    },
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    pub fn and(left: Predicate, right: Predicate) -> Self {
        Predicate::And(Box::new(left), Box::new(right))
    }

    pub fn or(left: Predicate, right: Predicate) -> Self {
        Predicate::Or(Box::new(left), Box::new(right))
    }

    pub fn negate(operand: Predicate) -> Self {
        Predicate::Not(Box::new(operand))
    }

    /// Right operands of `And`/`Or` are only evaluated when they decide the
    /// result.
    pub fn test(&self, state: &ProgramState<'_>) -> Result<bool, ProgramError> {
        match self {
            Predicate::Value(accessor) => match accessor.evaluate(state)? {
                Value::Bool(b) => Ok(b),
                other => Err(ProgramError::type_error(format!(
                    "condition '{}' evaluated to {} instead of bool",
                    accessor,
                    other.type_name()
                ))),
            },
            Predicate::Compare { left, op, right } => {
                let l = left.evaluate(state)?;
                let r = right.evaluate(state)?;
                compare(&l, *op, &r)
            }
            Predicate::And(left, right) => Ok(left.test(state)? && right.test(state)?),
            Predicate::Or(left, right) => Ok(left.test(state)? || right.test(state)?),
            Predicate::Not(operand) => Ok(!operand.test(state)?),
        }
    }
}

pub fn compare(left: &Value, op: Comparator, right: &Value) -> Result<bool, ProgramError> {
    match op {
        Comparator::Equal => Ok(values_equal(left, right)),
        Comparator::NotEqual => Ok(!values_equal(left, right)),
        Comparator::In => match right {
            Value::Array(items) => Ok(items.iter().any(|item| values_equal(left, item))),
            other => Err(ProgramError::type_error(format!(
                "right operand of IN must be an array, got {}",
                other.type_name()
            ))),
        },
        ordering => {
            let (Value::Int(l), Value::Int(r)) = (left, right) else {
                return Err(ProgramError::type_error(format!(
                    "'{}' needs two integers, got {} and {}",
                    ordering,
                    left.type_name(),
                    right.type_name()
                )));
            };
            Ok(match ordering {
                Comparator::Less => l < r,
                Comparator::LessEqual => l <= r,
                Comparator::Greater => l > r,
                _ => l >= r,
            })
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Value(accessor) => write!(f, "{}", accessor),
            Operand::Predicate(predicate) => write!(f, "({})", predicate),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Value(accessor) => write!(f, "{}", accessor),
            Predicate::Compare { left, op, right } => write!(f, "{} {} {}", left, op, right),
            Predicate::And(l, r) => write!(f, "({} && {})", l, r),
            Predicate::Or(l, r) => write!(f, "({} || {})", l, r),
            Predicate::Not(p) => write!(f, "!{}", p),
        }
    }
}
