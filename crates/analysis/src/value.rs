//! The abstract value domain tracked on the stack and in memory.
//!
//! A value is either a known constant, a byte range of the call input, a boolean that records a
//! comparison of the selector bytes against a constant, or unknown. Operations only ever produce
//! a more precise value when the rule that justifies it is exact; everything else is `Unknown`.

use crate::word::Word;
use serde::Serialize;

/// Bytes of call input that make up a value.
///
/// The value equals `calldata[start..start + len]` read big-endian and shifted left by `pad`
/// zero bytes. `len + pad` never exceeds 32 and `len` is never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct CallDataSlice {
    /// First call-input byte covered.
    pub start: usize,
    /// Number of call-input bytes covered.
    pub len: u8,
    /// Trailing zero bytes below the covered bytes.
    pub pad: u8,
}

/// A boolean recording whether the selector bytes equal `selector`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SelectorTest {
    /// The constant compared against.
    pub selector: [u8; 4],
    /// Offset of the comparison instruction.
    pub origin: usize,
    /// True when the boolean is one for a mismatch rather than a match.
    pub negated: bool,
    /// Boolean operations applied since the comparison.
    pub depth: u8,
}

/// A symbolic stack or memory cell.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize)]
pub enum AbstractValue {
    /// A known constant.
    Const(Word),
    /// Derived exactly from call-input bytes.
    CallData(CallDataSlice),
    /// A 0/1 outcome of comparing the selector against a constant.
    SelectorTest(SelectorTest),
    /// A value that is zero exactly when the selector equals a constant (`XOR`, `SUB`).
    SelectorDiff(SelectorTest),
    /// Anything else.
    #[default]
    Unknown,
}

/// Position of the slice's bytes inside the 32-byte word, as `[first, last)`.
const fn word_span(len: u8, pad: u8) -> (usize, usize) {
    let end = 32 - pad as usize;
    (end - len as usize, end)
}

impl CallDataSlice {
    /// The word `CALLDATALOAD(offset)` produces.
    pub const fn load(offset: usize) -> Self {
        Self {
            start: offset,
            len: 32,
            pad: 0,
        }
    }

    /// `start` is `None` when the call-input offset no longer fits in a `usize`.
    fn rebuild(start: Option<usize>, first: usize, end: usize) -> AbstractValue {
        if end <= first {
            return AbstractValue::Const(Word::ZERO);
        }
        let Some(start) = start else {
            return AbstractValue::Unknown;
        };
        AbstractValue::CallData(Self {
            start,
            len: (end - first) as u8,
            pad: (32 - end) as u8,
        })
    }

    /// Logical right shift by `bits`; only whole-byte shifts stay precise.
    pub fn shr(self, bits: usize) -> AbstractValue {
        if bits >= 256 {
            return AbstractValue::Const(Word::ZERO);
        }
        if bits % 8 != 0 {
            return AbstractValue::Unknown;
        }
        let (_, end) = word_span(self.len, self.pad);
        let shift = bits / 8;
        // Bytes pushed past the bottom of the word are lost.
        let new_end = (end + shift).min(32);
        let lost = (end + shift).saturating_sub(32);
        let kept = (self.len as usize).saturating_sub(lost);
        Self::rebuild(Some(self.start), new_end - kept, new_end)
    }

    /// Left shift by `bits`; only whole-byte shifts stay precise.
    pub fn shl(self, bits: usize) -> AbstractValue {
        if bits >= 256 {
            return AbstractValue::Const(Word::ZERO);
        }
        if bits % 8 != 0 {
            return AbstractValue::Unknown;
        }
        let (first, end) = word_span(self.len, self.pad);
        let shift = bits / 8;
        // Bytes pushed past the top of the word are lost from the front of the slice.
        let lost = shift.saturating_sub(first);
        let new_first = first.saturating_sub(shift);
        let new_end = end.saturating_sub(shift);
        Self::rebuild(self.start.checked_add(lost), new_first, new_end)
    }

    /// Bitwise AND with a constant mask made of one run of `0xff` bytes.
    pub fn and_mask(self, mask: &Word) -> AbstractValue {
        if mask.is_zero() {
            return AbstractValue::Const(Word::ZERO);
        }
        let Some((mask_first, mask_end)) = mask.ff_run() else {
            return AbstractValue::Unknown;
        };
        let (first, end) = word_span(self.len, self.pad);
        let keep_first = first.max(mask_first);
        let keep_end = end.min(mask_end);
        if keep_end <= keep_first {
            return AbstractValue::Const(Word::ZERO);
        }
        Self::rebuild(self.start.checked_add(keep_first - first), keep_first, keep_end)
    }

    /// If comparing this value against `constant` is a test of the selector bytes `[0, 4)`,
    /// returns the selector the constant stands for.
    ///
    /// The slice must begin at the first call-input byte and cover exactly the four selector
    /// bytes, or be the untouched word loaded from offset zero (which dispatchers compare against
    /// a small constant). The constant must be zero outside the four bytes directly above the
    /// padding.
    pub fn selector_against(&self, constant: &Word) -> Option<[u8; 4]> {
        if self.start != 0 || (self.len != 4 && self.len != 32) {
            return None;
        }
        let end = 32 - self.pad as usize;
        let first = end - 4;
        let outside_zero = constant.0[..first].iter().all(|b| *b == 0)
            && constant.0[end..].iter().all(|b| *b == 0);
        if !outside_zero {
            return None;
        }
        let mut selector = [0u8; 4];
        selector.copy_from_slice(&constant.0[first..end]);
        Some(selector)
    }
}

impl SelectorTest {
    /// A fresh equality test produced at `origin`.
    pub const fn new(selector: [u8; 4], origin: usize) -> Self {
        Self {
            selector,
            origin,
            negated: false,
            depth: 0,
        }
    }

    /// The same test after one more boolean operation, or `None` once the chain is too long to
    /// still count as a dispatcher comparison.
    pub fn chained(self, negate: bool, max_depth: u8) -> Option<Self> {
        let depth = self.depth.checked_add(1).filter(|d| *d <= max_depth)?;
        Some(Self {
            negated: self.negated ^ negate,
            depth,
            ..self
        })
    }
}

impl AbstractValue {
    /// Shorthand for a constant built from a `u64`.
    pub fn constant(value: u64) -> Self {
        Self::Const(Word::from_u64(value))
    }

    /// The constant, if this value is one.
    pub const fn as_const(&self) -> Option<&Word> {
        match self {
            Self::Const(word) => Some(word),
            _ => None,
        }
    }

    /// Whether nothing is known about this value.
    pub const fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }

    /// The selector test this value carries, whichever form it takes.
    pub const fn selector_test(&self) -> Option<&SelectorTest> {
        match self {
            Self::SelectorTest(test) | Self::SelectorDiff(test) => Some(test),
            _ => None,
        }
    }
}
