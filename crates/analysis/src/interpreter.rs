//! Abstract Stack Interpreter.
//!
//! Executes one basic block at a time over [`AbstractValue`]s. Constants fold, values read from
//! call input keep track of which bytes they came from through shifts, masks and power-of-two
//! arithmetic, and comparisons of the selector bytes against a constant become selector tests.
//! Everything else produces `Unknown`.

use crate::config::ScanConfig;
use crate::state::{ExecutionState, Memory, StackFault};
use crate::value::{AbstractValue, CallDataSlice, SelectorTest};
use crate::word::Word;
use selscope_core::{Opcode, OpcodeExt};
use selscope_core::cfg_ir::{BasicBlock, BlockExit};
use selscope_core::decoder::Instruction;

/// Step counter shared by every path of one scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Budget {
    total: u64,
    used: u64,
}

impl Budget {
    /// A budget of `total` steps, none used yet.
    pub const fn new(total: u64) -> Self {
        Self { total, used: 0 }
    }

    /// Consumes one step, returning false once nothing is left.
    pub fn take(&mut self) -> bool {
        if self.used >= self.total {
            return false;
        }
        self.used += 1;
        true
    }

    /// Steps taken so far.
    pub const fn used(&self) -> u64 {
        self.used
    }

    /// The budget this scan started with.
    pub const fn total(&self) -> u64 {
        self.total
    }

    /// Steps still available.
    pub const fn remaining(&self) -> u64 {
        self.total - self.used
    }

    /// Whether every step has been used.
    pub const fn is_exhausted(&self) -> bool {
        self.used >= self.total
    }
}

/// How execution left a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockOutcome {
    /// Control continues at the given offset.
    Fallthrough(usize),
    /// `JUMP` to whatever `target` turns out to be.
    Jump {
        /// The popped destination.
        target: AbstractValue,
    },
    /// `JUMPI` with its popped operands and the offset of the next instruction.
    Branch {
        /// The popped destination.
        target: AbstractValue,
        /// The popped condition.
        condition: AbstractValue,
        /// Offset after the `JUMPI`.
        fallthrough: usize,
    },
    /// A halting instruction or the end of the code.
    Halt,
    /// The step budget ran out mid-block.
    OutOfBudget,
    /// The stack under- or overflowed.
    StackFault(StackFault),
}

/// Interprets blocks of one contract under one configuration.
#[derive(Debug, Clone)]
pub struct Interpreter<'a> {
    config: &'a ScanConfig,
    code_len: usize,
}

impl<'a> Interpreter<'a> {
    /// An interpreter for code of `code_len` bytes.
    pub const fn new(config: &'a ScanConfig, code_len: usize) -> Self {
        Self { config, code_len }
    }

    /// Runs `block` from `state`, charging one step per instruction.
    pub fn run_block(
        &self,
        block: &BasicBlock,
        state: &mut ExecutionState,
        budget: &mut Budget,
    ) -> BlockOutcome {
        for ins in &block.instructions {
            if !budget.take() {
                return BlockOutcome::OutOfBudget;
            }
            state.pc = ins.pc;
            let result = match ins.opcode {
                Opcode::JUMP => {
                    return state
                        .stack
                        .pop()
                        .map_or_else(BlockOutcome::StackFault, |target| BlockOutcome::Jump {
                            target,
                        });
                }
                Opcode::JUMPI => {
                    return Self::branch(ins, state).unwrap_or_else(BlockOutcome::StackFault);
                }
                op if op.halts() => return BlockOutcome::Halt,
                _ => self.step(ins, state),
            };
            if let Err(fault) = result {
                return BlockOutcome::StackFault(fault);
            }
        }

        match block.exit {
            BlockExit::EndOfCode => BlockOutcome::Halt,
            _ => BlockOutcome::Fallthrough(block.end_pc),
        }
    }

    fn branch(ins: &Instruction, state: &mut ExecutionState) -> Result<BlockOutcome, StackFault> {
        let target = state.stack.pop()?;
        let condition = state.stack.pop()?;
        Ok(BlockOutcome::Branch {
            target,
            condition,
            fallthrough: ins.next_pc(),
        })
    }

    /// Applies one non-control instruction.
    pub fn step(&self, ins: &Instruction, state: &mut ExecutionState) -> Result<(), StackFault> {
        let track = self.config.track_memory;
        match ins.opcode {
            Opcode::PUSH0 | Opcode::PUSH(_) => {
                let value = ins
                    .imm_word()
                    .map_or(AbstractValue::Unknown, |word| AbstractValue::Const(Word(word)));
                state.stack.push(value)
            }
            Opcode::DUP(n) => state.stack.dup(n as usize),
            Opcode::SWAP(n) => state.stack.swap(n as usize),
            Opcode::POP => state.stack.pop().map(drop),
            Opcode::JUMPDEST => Ok(()),
            Opcode::PC => state.stack.push(AbstractValue::constant(ins.pc as u64)),
            Opcode::CODESIZE => state.stack.push(AbstractValue::constant(self.code_len as u64)),
            Opcode::CALLDATALOAD => {
                let offset = state.stack.pop()?;
                let value = const_usize(&offset).map_or(AbstractValue::Unknown, |offset| {
                    AbstractValue::CallData(CallDataSlice::load(offset))
                });
                state.stack.push(value)
            }
            Opcode::MLOAD => {
                let offset = state.stack.pop()?;
                let value = if track {
                    state.memory.load(const_usize(&offset))
                } else {
                    AbstractValue::Unknown
                };
                state.stack.push(value)
            }
            Opcode::MSTORE => {
                let offset = state.stack.pop()?;
                let value = state.stack.pop()?;
                if track {
                    state.memory.store(const_usize(&offset), value);
                }
                Ok(())
            }
            Opcode::MSTORE8 => {
                let args = state.stack.pop_n(2)?;
                if track {
                    clobber(&mut state.memory, &args[0], &AbstractValue::constant(1));
                }
                Ok(())
            }
            op => {
                let (pops, pushes) = op.stack_effect();
                let args = state.stack.pop_n(pops)?;
                if track {
                    memory_effect(op, &args, &mut state.memory);
                }
                if pushes > 0 {
                    let result = self.combine(op, ins.pc, &args);
                    state.stack.push(result)?;
                    for _ in 1..pushes {
                        state.stack.push(AbstractValue::Unknown)?;
                    }
                }
                Ok(())
            }
        }
    }

    /// The value an opcode produces from its operands, `args[0]` being the top of the stack.
    fn combine(&self, op: Opcode, pc: usize, args: &[AbstractValue]) -> AbstractValue {
        let constants: Option<Vec<Word>> = args.iter().map(|a| a.as_const().copied()).collect();
        if let Some(constants) = constants {
            return Word::fold(op, &constants).map_or(AbstractValue::Unknown, AbstractValue::Const);
        }

        let max_chain = self.config.max_condition_chain;
        match (op, args) {
            (Opcode::EQ, [a, b]) => {
                if let Some(test) = zero_test(a, b, max_chain) {
                    return test;
                }
                selector_compare(a, b, pc).map_or(AbstractValue::Unknown, AbstractValue::SelectorTest)
            }
            (Opcode::XOR | Opcode::SUB, [a, b]) => {
                selector_compare(a, b, pc).map_or(AbstractValue::Unknown, AbstractValue::SelectorDiff)
            }
            (Opcode::ISZERO, [a]) => is_zero(a, max_chain),
            (Opcode::AND, [a, b]) => and(a, b, max_chain),
            (Opcode::SHR, [shift, AbstractValue::CallData(slice)]) => {
                const_bits(shift).map_or(AbstractValue::Unknown, |bits| slice.shr(bits))
            }
            (Opcode::SHL, [shift, AbstractValue::CallData(slice)]) => {
                const_bits(shift).map_or(AbstractValue::Unknown, |bits| slice.shl(bits))
            }
            (Opcode::DIV, [AbstractValue::CallData(slice), AbstractValue::Const(divisor)]) => {
                if divisor.is_zero() {
                    return AbstractValue::Const(Word::ZERO);
                }
                divisor
                    .byte_power_of_two()
                    .map_or(AbstractValue::Unknown, |k| slice.shr(8 * k))
            }
            (Opcode::MUL, [AbstractValue::CallData(slice), AbstractValue::Const(factor)])
            | (Opcode::MUL, [AbstractValue::Const(factor), AbstractValue::CallData(slice)]) => {
                if factor.is_zero() {
                    return AbstractValue::Const(Word::ZERO);
                }
                factor
                    .byte_power_of_two()
                    .map_or(AbstractValue::Unknown, |k| slice.shl(8 * k))
            }
            _ => AbstractValue::Unknown,
        }
    }
}

fn const_usize(value: &AbstractValue) -> Option<usize> {
    value.as_const().and_then(Word::as_usize)
}

/// A shift amount; anything too large to fit shifts everything out.
fn const_bits(value: &AbstractValue) -> Option<usize> {
    value.as_const().map(|w| w.as_usize().unwrap_or(usize::MAX))
}

fn selector_compare(a: &AbstractValue, b: &AbstractValue, pc: usize) -> Option<SelectorTest> {
    let (slice, constant) = match (a, b) {
        (AbstractValue::CallData(slice), AbstractValue::Const(c))
        | (AbstractValue::Const(c), AbstractValue::CallData(slice)) => (slice, c),
        _ => return None,
    };
    slice
        .selector_against(constant)
        .map(|selector| SelectorTest::new(selector, pc))
}

/// `EQ(x, 0)` on a selector test behaves like `ISZERO(x)`.
fn zero_test(a: &AbstractValue, b: &AbstractValue, max_chain: u8) -> Option<AbstractValue> {
    let other = match (a, b) {
        (AbstractValue::Const(c), other) | (other, AbstractValue::Const(c)) if c.is_zero() => other,
        _ => return None,
    };
    other.selector_test().map(|_| is_zero(other, max_chain))
}

fn is_zero(value: &AbstractValue, max_chain: u8) -> AbstractValue {
    let chained = match value {
        AbstractValue::SelectorTest(test) => test.chained(true, max_chain),
        // a difference is zero exactly on a match
        AbstractValue::SelectorDiff(test) => test.chained(false, max_chain),
        _ => None,
    };
    chained.map_or(AbstractValue::Unknown, AbstractValue::SelectorTest)
}

fn and(a: &AbstractValue, b: &AbstractValue, max_chain: u8) -> AbstractValue {
    match (a, b) {
        (AbstractValue::CallData(slice), AbstractValue::Const(mask))
        | (AbstractValue::Const(mask), AbstractValue::CallData(slice)) => slice.and_mask(mask),
        (AbstractValue::SelectorTest(test), AbstractValue::Const(mask))
        | (AbstractValue::Const(mask), AbstractValue::SelectorTest(test)) => {
            if mask.0[31] & 1 == 0 {
                return AbstractValue::Const(Word::ZERO);
            }
            test.chained(false, max_chain)
                .map_or(AbstractValue::Unknown, AbstractValue::SelectorTest)
        }
        _ => AbstractValue::Unknown,
    }
}

/// Forgets memory written by copies and calls.
fn memory_effect(op: Opcode, args: &[AbstractValue], memory: &mut Memory) {
    let (dest, len) = match op {
        Opcode::CALLDATACOPY | Opcode::CODECOPY | Opcode::RETURNDATACOPY => (0, 2),
        // MCOPY
        _ if op.to_byte() == 0x5e => (0, 2),
        Opcode::EXTCODECOPY => (1, 3),
        Opcode::CALL | Opcode::CALLCODE => (5, 6),
        Opcode::DELEGATECALL | Opcode::STATICCALL => (4, 5),
        _ => return,
    };
    if let (Some(dest), Some(len)) = (args.get(dest), args.get(len)) {
        clobber(memory, dest, len);
    }
}

fn clobber(memory: &mut Memory, dest: &AbstractValue, len: &AbstractValue) {
    match (const_usize(dest), const_usize(len)) {
        (_, Some(0)) => {}
        (Some(dest), Some(len)) => memory.forget_range(dest, len),
        _ => memory.clear(),
    }
}
