//! Abstract machine state: a bounded stack of abstract values, a word-granular memory model and
//! the execution state that the scheduler moves between blocks.

use crate::value::AbstractValue;
use std::collections::BTreeMap;
use thiserror::Error;

/// Why a path's stack became unusable. Ends the path, never the scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StackFault {
    /// An instruction needed more values than the stack held.
    #[error("stack underflow")]
    Underflow,
    /// The depth limit was reached.
    #[error("stack overflow")]
    Overflow,
}

/// Stack of abstract values, bottom first.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AbstractStack {
    items: Vec<AbstractValue>,
    limit: usize,
}

impl AbstractStack {
    /// An empty stack holding at most `limit` values.
    pub fn new(limit: usize) -> Self {
        Self {
            items: Vec::new(),
            limit,
        }
    }

    /// Current depth.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the stack holds nothing.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The values from bottom to top.
    pub fn values(&self) -> &[AbstractValue] {
        &self.items
    }

    /// Pushes `value`, failing once the depth limit is reached.
    pub fn push(&mut self, value: AbstractValue) -> Result<(), StackFault> {
        if self.items.len() >= self.limit {
            return Err(StackFault::Overflow);
        }
        self.items.push(value);
        Ok(())
    }

    /// Pops the top value.
    pub fn pop(&mut self) -> Result<AbstractValue, StackFault> {
        self.items.pop().ok_or(StackFault::Underflow)
    }

    /// Pops `n` values; the first element of the result was on top.
    pub fn pop_n(&mut self, n: usize) -> Result<Vec<AbstractValue>, StackFault> {
        if n > self.items.len() {
            return Err(StackFault::Underflow);
        }
        let mut taken = self.items.split_off(self.items.len() - n);
        taken.reverse();
        Ok(taken)
    }

    /// The value `depth` slots below the top (0 is the top).
    pub fn peek(&self, depth: usize) -> Option<&AbstractValue> {
        self.items.iter().rev().nth(depth)
    }

    /// `DUPn`: copies the n-th value (1-based) onto the top.
    pub fn dup(&mut self, n: usize) -> Result<(), StackFault> {
        let value = n
            .checked_sub(1)
            .and_then(|depth| self.peek(depth))
            .cloned()
            .ok_or(StackFault::Underflow)?;
        self.push(value)
    }

    /// `SWAPn`: exchanges the top with the value `n` slots below it.
    pub fn swap(&mut self, n: usize) -> Result<(), StackFault> {
        let len = self.items.len();
        if n == 0 || n >= len {
            return Err(StackFault::Underflow);
        }
        self.items.swap(len - 1, len - 1 - n);
        Ok(())
    }
}

/// Memory as a map from word-aligned offsets to the value stored there.
///
/// Only 32-byte stores at constant, aligned offsets are tracked. A store the model cannot place
/// exactly forgets everything, so a load never returns a stale value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Memory {
    words: BTreeMap<usize, AbstractValue>,
}

/// Tracked words beyond this count are not retained.
const MAX_TRACKED_WORDS: usize = 256;

impl Memory {
    /// `MSTORE` at `offset`, `None` meaning the offset is not a known constant.
    pub fn store(&mut self, offset: Option<usize>, value: AbstractValue) {
        match offset {
            Some(offset) if offset % 32 == 0 => {
                if value.is_unknown() {
                    self.words.remove(&offset);
                } else if self.words.len() < MAX_TRACKED_WORDS || self.words.contains_key(&offset) {
                    self.words.insert(offset, value);
                }
            }
            Some(offset) => self.forget_range(offset, 32),
            None => self.clear(),
        }
    }

    /// `MLOAD` at `offset`.
    pub fn load(&self, offset: Option<usize>) -> AbstractValue {
        offset
            .and_then(|offset| self.words.get(&offset))
            .cloned()
            .unwrap_or_default()
    }

    /// Drops every tracked word overlapping `[offset, offset + len)`.
    pub fn forget_range(&mut self, offset: usize, len: usize) {
        let end = offset.saturating_add(len);
        let first = offset.saturating_sub(31);
        self.words.retain(|start, _| *start < first || *start >= end);
    }

    /// Forgets every tracked word.
    pub fn clear(&mut self) {
        self.words.clear();
    }

    /// Number of tracked words.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Whether no word is tracked.
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// One path through the program, positioned at the start of a block.
#[derive(Debug, Clone)]
pub struct ExecutionState {
    /// Offset of the next instruction to execute.
    pub pc: usize,
    /// Abstract operand stack.
    pub stack: AbstractStack,
    /// Constant-offset memory words.
    pub memory: Memory,
    /// Identifies the path for logging; forks get fresh ids.
    pub path_id: usize,
}

/// What two states must share to be treated as the same exploration context.
pub type StateKey = (usize, Vec<AbstractValue>);

impl ExecutionState {
    /// The state at offset zero with an empty stack.
    pub fn initial(stack_limit: usize) -> Self {
        Self {
            pc: 0,
            stack: AbstractStack::new(stack_limit),
            memory: Memory::default(),
            path_id: 0,
        }
    }

    /// Deduplication key: the block start together with the full abstract stack.
    pub fn key(&self) -> StateKey {
        (self.pc, self.stack.values().to_vec())
    }

    /// A copy of this state continuing at `pc` as path `path_id`.
    pub fn fork(&self, pc: usize, path_id: usize) -> Self {
        Self {
            pc,
            path_id,
            ..self.clone()
        }
    }
}
