use std::fmt;

use crate::library::LibraryMethod;
use crate::types::Value;

use super::{ProgramError, ProgramState};

/// Read access to a value at run time. Evaluation never changes the state.
#[derive(Debug, Clone)]
pub enum ValueAccessor {
    Literal(Value),
    Variable(String),
    Call {
        method: &'static LibraryMethod,
        args: Vec<ValueAccessor>,
    },
}

impl ValueAccessor {
    pub fn evaluate(&self, state: &ProgramState<'_>) -> Result<Value, ProgramError> {
        match self {
            ValueAccessor::Literal(value) => Ok(value.clone()),
            ValueAccessor::Variable(name) => state.lookup(name).cloned(),
            ValueAccessor::Call { method, args } => {
                let values = args
                    .iter()
                    .map(|arg| arg.evaluate(state))
                    .collect::<Result<Vec<_>, _>>()?;
                method.invoke(&values)
            }
        }
    }
}

impl fmt::Display for ValueAccessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueAccessor::Literal(value) => write!(f, "{}", value),
            ValueAccessor::Variable(name) => write!(f, "{}", name),
            ValueAccessor::Call { method, args } => {
                write!(f, "{}(", method.name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Write access to one named variable.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueMutator {
    /// Bind a new variable in the innermost frame.
    Declare(String),
    /// Rebind the innermost frame that already holds the name.
    Assign(String),
}

impl ValueMutator {
    pub fn name(&self) -> &str {
        match self {
            ValueMutator::Declare(name) | ValueMutator::Assign(name) => name,
        }
    }

    pub fn apply(&self, state: &mut ProgramState<'_>, value: Value) -> Result<(), ProgramError> {
        match self {
            ValueMutator::Declare(name) => {
                state.bind(name, value);
                Ok(())
            }
            ValueMutator::Assign(name) => state.assign(name, value),
        }
    }
}

/// Null-safe equality. Addresses and byte strings compare by content, so a
/// `bytes20` value equals the address with the same bytes.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Bytes(x) | Value::Address(x), Value::Bytes(y) | Value::Address(y)) => x == y,
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        }
        (a, b) => a == b,
    }
}
