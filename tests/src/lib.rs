//! Cross-crate tests for selscope.

pub mod asm;

#[cfg(test)]
mod analysis;
#[cfg(test)]
mod bytecode;
