//! selscope's single entry-point for turning byte-sequences into instruction streams.
//!
//! Decoding is total: every byte sequence yields a stream. Push operands that run past the end
//! of the code are zero-padded on the right, which is how the EVM itself reads them, and bytes
//! without a defined meaning decode as `Opcode::UNKNOWN`.

use crate::{Opcode, OpcodeExt};
use hex::FromHex;
use selscope_utils::errors::DecodeError;
use std::{fmt, fs, path::Path};
use tiny_keccak::{Hasher, Keccak};

/// Represents a single decoded instruction.
#[derive(Clone, Debug, PartialEq)]
pub struct Instruction {
    /// the instruction's program counter (in bytes)
    pub pc: usize,
    /// the decoded opcode
    pub opcode: Opcode,
    /// immediate operand bytes for pushes, always exactly the push width
    pub imm: Option<Vec<u8>>,
}

/// Metadata about the decoded bytecode blob.
#[derive(Debug)]
pub struct DecodeInfo {
    /// number of bytes
    pub byte_length: usize,
    /// a 32-byte Keccak-256 hash of the raw bytes
    pub keccak_hash: [u8; 32],
    /// input from the variants of SourceType
    pub source: SourceType,
    /// whether the final push ran past the end of the code
    pub truncated: bool,
}

/// Source type of the bytecode input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceType {
    /// A hex string given directly.
    HexString,
    /// A file holding hex.
    File,
    /// Raw bytes from a caller.
    Bytes,
}

/// Normalizes hex strings by removing whitespace, 0x prefix, and ensuring even length
pub fn normalize_hex_string(input: &str) -> Result<String, DecodeError> {
    let compact = input.trim().replace(['\n', '\r', ' ', '\t'], "");
    let clean = compact
        .strip_prefix("0x")
        .or_else(|| compact.strip_prefix("0X"))
        .unwrap_or(&compact);

    if let Some((index, c)) = clean.char_indices().find(|(_, c)| !c.is_ascii_hexdigit()) {
        return Err(DecodeError::HexDecode(
            hex::FromHexError::InvalidHexCharacter { c, index },
        ));
    }

    // Ensure even length by padding with leading zero if necessary
    Ok(if clean.len() % 2 == 1 {
        format!("0{clean}")
    } else {
        clean.to_string()
    })
}

/// Normalizes input into a byte vector from hex string or file.
pub fn input_to_bytes(input: &str, is_file: bool) -> Result<Vec<u8>, DecodeError> {
    let text = if is_file {
        let path = Path::new(input);
        fs::read_to_string(path).map_err(|e| DecodeError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?
    } else {
        input.to_string()
    };
    let normalized = normalize_hex_string(&text)?;
    Vec::from_hex(&normalized).map_err(DecodeError::HexDecode)
}

/// Decodes raw EVM bytecode into its instruction stream.
///
/// Never fails: a push whose operand is cut off by the end of the input receives zero bytes in
/// place of the missing ones.
pub fn decode(bytes: &[u8]) -> Vec<Instruction> {
    let mut instructions = Vec::with_capacity(bytes.len());
    let mut pc = 0;
    while pc < bytes.len() {
        let (opcode, _) = Opcode::parse(bytes[pc]);
        let imm_len = opcode.immediate_width();
        let imm = (imm_len > 0).then(|| {
            let start = (pc + 1).min(bytes.len());
            let end = (pc + 1 + imm_len).min(bytes.len());
            let mut operand = bytes[start..end].to_vec();
            operand.resize(imm_len, 0);
            operand
        });
        instructions.push(Instruction { pc, opcode, imm });
        pc += 1 + imm_len;
    }
    instructions
}

/// Decodes raw EVM bytecode and computes its metadata.
///
/// # Arguments
/// * `bytes` - The raw EVM bytecode bytes to decode.
/// * `source` - The source type indicating how the bytes were obtained.
pub fn decode_bytecode_from_bytes(bytes: &[u8], source: SourceType) -> (Vec<Instruction>, DecodeInfo) {
    let mut keccak = Keccak::v256();
    keccak.update(bytes);
    let mut hash = [0u8; 32];
    keccak.finalize(&mut hash);

    let instructions = decode(bytes);
    let truncated = instructions
        .last()
        .is_some_and(|last| last.pc + last.byte_size() > bytes.len());
    if truncated {
        tracing::debug!("final push operand truncated, zero-padded");
    }

    (
        instructions,
        DecodeInfo {
            byte_length: bytes.len(),
            keccak_hash: hash,
            source,
            truncated,
        },
    )
}

/// Decodes a hex string or hex file into an instruction stream with metadata and raw bytes.
///
/// # Arguments
/// * `input` - A hex string or file path representing the EVM bytecode.
/// * `is_file` - Flag indicating if the input is a file path (false for hex string).
pub fn decode_bytecode(
    input: &str,
    is_file: bool,
) -> Result<(Vec<Instruction>, DecodeInfo, Vec<u8>), DecodeError> {
    let bytes = input_to_bytes(input, is_file)?;
    let source = if is_file {
        SourceType::File
    } else {
        SourceType::HexString
    };
    let (instructions, info) = decode_bytecode_from_bytes(&bytes, source);
    Ok((instructions, info, bytes))
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // pc: six-digit hex, opcode left-padded to 8 chars, then optional imm
        if let Some(imm) = &self.imm {
            write!(f, "{:06x}  {:<8} 0x{}", self.pc, self.opcode, hex::encode(imm))
        } else {
            write!(f, "{:06x}  {}", self.pc, self.opcode)
        }
    }
}

impl Instruction {
    /// Creates an instruction without an immediate.
    pub const fn new(pc: usize, opcode: Opcode) -> Self {
        Self {
            pc,
            opcode,
            imm: None,
        }
    }

    /// Returns the number of bytes this instruction occupies in bytecode.
    #[inline]
    pub fn byte_size(&self) -> usize {
        1 + self.opcode.immediate_width()
    }

    /// Offset of the instruction that follows this one.
    #[inline]
    pub fn next_pc(&self) -> usize {
        self.pc + self.byte_size()
    }

    /// The pushed constant as a 32-byte big-endian word, for `PUSH0`..`PUSH32`.
    pub fn imm_word(&self) -> Option<[u8; 32]> {
        match self.opcode {
            Opcode::PUSH0 => Some([0u8; 32]),
            Opcode::PUSH(_) => {
                let imm = self.imm.as_deref().filter(|imm| imm.len() <= 32)?;
                let mut word = [0u8; 32];
                word[32 - imm.len()..].copy_from_slice(imm);
                Some(word)
            }
            _ => None,
        }
    }

    /// The pushed constant as a `usize` if it fits, used for jump targets.
    pub fn imm_usize(&self) -> Option<usize> {
        let word = self.imm_word()?;
        let (high, low) = word.split_at(24);
        if high.iter().any(|b| *b != 0) {
            return None;
        }
        let value = u64::from_be_bytes(low.try_into().ok()?);
        usize::try_from(value).ok()
    }
}
