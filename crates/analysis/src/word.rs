//! 256-bit machine words and constant folding.
//!
//! Words are stored as big-endian byte arrays. Arithmetic goes through `BigUint` and is reduced
//! modulo 2^256 on the way back, so every fold matches the EVM's wrapping semantics.

use num_bigint::BigUint;
use selscope_core::Opcode;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A 256-bit EVM word in big-endian byte order.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Word(pub [u8; 32]);

impl Word {
    /// The all-zero word.
    pub const ZERO: Self = Self([0u8; 32]);

    /// Builds a word from a `u64`.
    pub fn from_u64(value: u64) -> Self {
        let mut bytes = [0u8; 32];
        bytes[24..].copy_from_slice(&value.to_be_bytes());
        Self(bytes)
    }

    /// Builds a word from up to 32 big-endian bytes, right-aligned.
    pub fn from_be_slice(slice: &[u8]) -> Self {
        let slice = &slice[slice.len().saturating_sub(32)..];
        let mut bytes = [0u8; 32];
        bytes[32 - slice.len()..].copy_from_slice(slice);
        Self(bytes)
    }

    /// `1` for true, `0` for false.
    pub fn from_bool(value: bool) -> Self {
        Self::from_u64(u64::from(value))
    }

    /// Whether every byte is zero.
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    /// The value as a `usize`, if it fits.
    pub fn as_usize(&self) -> Option<usize> {
        let (high, low) = self.0.split_at(24);
        if high.iter().any(|b| *b != 0) {
            return None;
        }
        usize::try_from(u64::from_be_bytes(low.try_into().ok()?)).ok()
    }

    /// Returns `k` when the word equals `2^(8k)` for some `k` in `0..32`.
    pub fn byte_power_of_two(&self) -> Option<usize> {
        let first = self.0.iter().position(|b| *b != 0)?;
        let rest_zero = self.0[first + 1..].iter().all(|b| *b == 0);
        (self.0[first] == 1 && rest_zero).then_some(31 - first)
    }

    /// For a mask made of one contiguous run of `0xff` bytes and zeros elsewhere, returns the
    /// byte positions `[start, end)` of the run.
    pub fn ff_run(&self) -> Option<(usize, usize)> {
        let start = self.0.iter().position(|b| *b != 0)?;
        let end = start + self.0[start..].iter().take_while(|b| **b == 0xff).count();
        let clean = end > start && self.0[end..].iter().all(|b| *b == 0);
        clean.then_some((start, end))
    }

    fn to_biguint(self) -> BigUint {
        BigUint::from_bytes_be(&self.0)
    }

    fn from_biguint(value: &BigUint) -> Self {
        Self::from_be_slice(&value.to_bytes_be())
    }

    fn modulus() -> BigUint {
        BigUint::from(1u8) << 256usize
    }

    fn zip_bytes(self, other: Self, f: impl Fn(u8, u8) -> u8) -> Self {
        let mut out = [0u8; 32];
        for (i, byte) in out.iter_mut().enumerate() {
            *byte = f(self.0[i], other.0[i]);
        }
        Self(out)
    }

    /// Shifts left by `bits`, dropping bits past the top of the word.
    pub fn shl(self, bits: usize) -> Self {
        if bits >= 256 {
            return Self::ZERO;
        }
        Self::from_biguint(&((self.to_biguint() << bits) % Self::modulus()))
    }

    /// Logical shift right by `bits`.
    pub fn shr(self, bits: usize) -> Self {
        if bits >= 256 {
            return Self::ZERO;
        }
        Self::from_biguint(&(self.to_biguint() >> bits))
    }

    /// Folds an opcode over constant operands, `args[0]` being the top of the stack.
    ///
    /// Returns `None` for opcodes that are not folded (signed arithmetic, environment reads and
    /// so on); the caller treats those results as unknown.
    pub fn fold(op: Opcode, args: &[Self]) -> Option<Self> {
        let modulus = Self::modulus();
        let big = |i: usize| args.get(i).map(|w| w.to_biguint());
        let word = |i: usize| args.get(i).copied();

        let folded = match op {
            Opcode::ADD => Self::from_biguint(&((big(0)? + big(1)?) % &modulus)),
            Opcode::MUL => Self::from_biguint(&((big(0)? * big(1)?) % &modulus)),
            Opcode::SUB => {
                Self::from_biguint(&((big(0)? + &modulus - big(1)?) % &modulus))
            }
            Opcode::DIV => {
                let divisor = big(1)?;
                if divisor.bits() == 0 {
                    Self::ZERO
                } else {
                    Self::from_biguint(&(big(0)? / divisor))
                }
            }
            Opcode::MOD => {
                let divisor = big(1)?;
                if divisor.bits() == 0 {
                    Self::ZERO
                } else {
                    Self::from_biguint(&(big(0)? % divisor))
                }
            }
            Opcode::ADDMOD | Opcode::MULMOD => {
                let n = big(2)?;
                if n.bits() == 0 {
                    Self::ZERO
                } else if op == Opcode::ADDMOD {
                    Self::from_biguint(&((big(0)? + big(1)?) % n))
                } else {
                    Self::from_biguint(&((big(0)? * big(1)?) % n))
                }
            }
            Opcode::EXP => Self::from_biguint(&big(0)?.modpow(&big(1)?, &modulus)),
            Opcode::LT => Self::from_bool(word(0)? < word(1)?),
            Opcode::GT => Self::from_bool(word(0)? > word(1)?),
            Opcode::EQ => Self::from_bool(word(0)? == word(1)?),
            Opcode::ISZERO => Self::from_bool(word(0)?.is_zero()),
            Opcode::AND => word(0)?.zip_bytes(word(1)?, |a, b| a & b),
            Opcode::OR => word(0)?.zip_bytes(word(1)?, |a, b| a | b),
            Opcode::XOR => word(0)?.zip_bytes(word(1)?, |a, b| a ^ b),
            Opcode::NOT => word(0)?.zip_bytes(Self::ZERO, |a, _| !a),
            Opcode::BYTE => {
                let value = word(1)?;
                let index = word(0)?.as_usize().filter(|i| *i < 32);
                index.map_or(Self::ZERO, |i| Self::from_u64(u64::from(value.0[i])))
            }
            Opcode::SHL => word(1)?.shl(word(0)?.as_usize().unwrap_or(usize::MAX)),
            Opcode::SHR => word(1)?.shr(word(0)?.as_usize().unwrap_or(usize::MAX)),
            _ => return None,
        };
        Some(folded)
    }
}

impl From<u64> for Word {
    fn from(value: u64) -> Self {
        Self::from_u64(value)
    }
}

impl fmt::Debug for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let first = self.0.iter().position(|b| *b != 0).unwrap_or(31);
        write!(f, "0x{}", hex::encode(&self.0[first..]))
    }
}
