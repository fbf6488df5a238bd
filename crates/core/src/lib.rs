//! Bytecode plumbing for selscope: opcodes, decoding, encoding and control-flow recovery.

pub mod cfg_ir;
pub mod decoder;
pub mod encoder;
pub mod opcode;
pub mod signature;

pub use opcode::{Opcode, OpcodeExt};
