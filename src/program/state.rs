use std::collections::HashMap;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::runtime::client::{Block, BlockchainClient, LogEntry, Transaction};
use crate::runtime::sink::OutputSink;
use crate::types::Value;

use super::ProgramError;

/// Cooperative stop signal, checked by block ranges before each block.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What the interpreter is currently iterating over.
#[derive(Debug, Default, Clone)]
pub struct Cursor {
    pub block: Option<Rc<Block>>,
    pub transaction: Option<Rc<Transaction>>,
    pub log_entry: Option<Rc<LogEntry>>,
}

/// Mutable context of one run.
pub struct ProgramState<'a> {
    frames: Vec<HashMap<String, Value>>,
    pub cursor: Cursor,
    pub client: &'a dyn BlockchainClient,
    pub sink: &'a mut dyn OutputSink,
    cancel: CancelFlag,
}

impl<'a> ProgramState<'a> {
    pub fn new(
        client: &'a dyn BlockchainClient,
        sink: &'a mut dyn OutputSink,
        cancel: CancelFlag,
    ) -> Self {
        Self {
            frames: Vec::new(),
            cursor: Cursor::default(),
            client,
            sink,
            cancel,
        }
    }

    // ── Frames ──────────────────────────────────────────────────────────

    pub fn push_frame(&mut self) {
        self.frames.push(HashMap::new());
    }

    pub fn pop_frame(&mut self) {
        self.frames.pop();
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Binds in the innermost frame, replacing a binding of the same name
    /// from a previous iteration.
    pub fn bind(&mut self, name: &str, value: Value) {
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(name.to_string(), value);
        }
    }

    pub fn assign(&mut self, name: &str, value: Value) -> Result<(), ProgramError> {
        let frame = self
            .frames
            .iter_mut()
            .rev()
            .find(|frame| frame.contains_key(name))
            .ok_or_else(|| ProgramError::UnknownVariable(name.to_string()))?;
        frame.insert(name.to_string(), value);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Result<&Value, ProgramError> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.get(name))
            .ok_or_else(|| ProgramError::UnknownVariable(name.to_string()))
    }

    // ── Cancellation ────────────────────────────────────────────────────

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
