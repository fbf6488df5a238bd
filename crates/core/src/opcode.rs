//! Analysis-facing properties of EVM opcodes.
//!
//! The opcode set itself comes from `eot` (`UnifiedOpcode`, re-exported as [`Opcode`]), which owns
//! parsing, byte values and mnemonics. What it does not describe is how an opcode moves the stack
//! and where it splits control flow; [`OpcodeExt`] adds that, keyed on the opcode byte so that
//! forks with differing mnemonics agree.

pub use eot::UnifiedOpcode as Opcode;

/// Stack and control-flow facts used by decoding, CFG recovery and interpretation.
pub trait OpcodeExt {
    /// Number of immediate bytes following the opcode byte (only PUSH1..PUSH32 carry any).
    fn immediate_width(&self) -> usize;

    /// Returns `(popped, pushed)` stack item counts; undefined bytes report `(0, 0)`.
    fn stack_effect(&self) -> (usize, usize);

    /// Whether execution stops at this opcode.
    fn halts(&self) -> bool;

    /// Whether this opcode is the last instruction of its basic block.
    fn ends_block(&self) -> bool;

    /// Whether this byte has a defined meaning in the Cancun instruction set.
    fn is_defined(&self) -> bool;

    /// Whether this opcode pushes a constant from its immediate (or zero for `PUSH0`).
    fn pushes_constant(&self) -> bool;
}

impl OpcodeExt for Opcode {
    fn immediate_width(&self) -> usize {
        match self.to_byte() {
            byte @ 0x60..=0x7f => usize::from(byte - 0x5f),
            _ => 0,
        }
    }

    fn stack_effect(&self) -> (usize, usize) {
        stack_effect_of(self.to_byte()).unwrap_or((0, 0))
    }

    fn halts(&self) -> bool {
        matches!(
            self,
            Opcode::STOP | Opcode::RETURN | Opcode::REVERT | Opcode::INVALID | Opcode::SELFDESTRUCT
        )
    }

    fn ends_block(&self) -> bool {
        self.halts() || matches!(self, Opcode::JUMP | Opcode::JUMPI)
    }

    fn is_defined(&self) -> bool {
        stack_effect_of(self.to_byte()).is_some()
    }

    fn pushes_constant(&self) -> bool {
        matches!(self, Opcode::PUSH(_) | Opcode::PUSH0)
    }
}

/// Cancun stack arity per opcode byte.
const fn stack_effect_of(byte: u8) -> Option<(usize, usize)> {
    let io = match byte {
        0x00 | 0x5b | 0xfe => (0, 0),
        0x01..=0x07 | 0x0a | 0x0b => (2, 1),
        0x08 | 0x09 => (3, 1),
        0x10..=0x14 | 0x16..=0x18 | 0x1a..=0x1d | 0x20 => (2, 1),
        0x15 | 0x19 => (1, 1),
        0x30 | 0x32..=0x34 | 0x36 | 0x38 | 0x3a | 0x3d => (0, 1),
        0x31 | 0x35 | 0x3b | 0x3f => (1, 1),
        0x37 | 0x39 | 0x3e | 0x5e => (3, 0),
        0x3c => (4, 0),
        0x40 | 0x49 => (1, 1),
        0x41..=0x48 | 0x4a => (0, 1),
        0x50 | 0x56 | 0xff => (1, 0),
        0x51 | 0x54 | 0x5c => (1, 1),
        0x52 | 0x53 | 0x55 | 0x57 | 0x5d | 0xf3 | 0xfd => (2, 0),
        0x58..=0x5a | 0x5f..=0x7f => (0, 1),
        0x80..=0x8f => {
            let n = (byte - 0x7f) as usize;
            (n, n + 1)
        }
        0x90..=0x9f => {
            let n = (byte - 0x8f) as usize + 1;
            (n, n)
        }
        0xa0..=0xa4 => ((byte - 0xa0) as usize + 2, 0),
        0xf0 => (3, 1),
        0xf1 | 0xf2 => (7, 1),
        0xf4 | 0xfa => (6, 1),
        0xf5 => (4, 1),
        _ => return None,
    };
    Some(io)
}
