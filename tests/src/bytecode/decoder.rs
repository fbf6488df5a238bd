use selscope_core::OpcodeExt;
use selscope_core::decoder::{SourceType, decode, decode_bytecode, decode_bytecode_from_bytes};
use selscope_core::encoder::encode;
use selscope_utils::errors::DecodeError;
use sha3::{Digest, Keccak256};
use std::io::Write;

// Fixture: PUSH1 0x01, PUSH1 0x02, ADD, PUSH1 0x00, JUMPI
const BYTECODE: &str = "0x6001600201600057";

#[test]
fn test_hex_roundtrip() {
    let (ins, info, bytes) = decode_bytecode(BYTECODE, false).unwrap();
    for instr in &ins {
        tracing::debug!("{}", instr);
    }
    assert_eq!(ins.len(), 5);
    assert_eq!(info.byte_length, BYTECODE.trim_start_matches("0x").len() / 2);
    assert_eq!(info.source, SourceType::HexString);
    assert_eq!(encode(&ins).unwrap(), bytes);
}

#[test]
fn test_decode_from_bytes() {
    let bytes = hex::decode(BYTECODE.trim_start_matches("0x")).unwrap();
    let (ins, info) = decode_bytecode_from_bytes(&bytes, SourceType::Bytes);
    assert_eq!(ins, decode(&bytes));
    assert_eq!(info.source, SourceType::Bytes);
    assert!(!info.truncated);

    assert_eq!(info.keccak_hash[..], Keccak256::digest(&bytes)[..]);
}

#[test]
fn test_file_input() {
    let mut tmp = tempfile::NamedTempFile::new().unwrap();
    writeln!(tmp, "{BYTECODE}").unwrap();
    let path = tmp.path().to_str().unwrap();

    let (ins, info, _) = decode_bytecode(path, true).unwrap();
    assert_eq!(ins.len(), 5);
    assert_eq!(info.source, SourceType::File);
}

#[test]
fn test_missing_file_and_bad_hex() {
    assert!(matches!(
        decode_bytecode("/definitely/not/here.hex", true),
        Err(DecodeError::FileRead { .. })
    ));
    assert!(matches!(
        decode_bytecode("0x60zz", false),
        Err(DecodeError::HexDecode(_))
    ));
}

#[test]
fn test_every_byte_decodes() {
    let bytes: Vec<u8> = (0u8..=0xff).collect();
    let ins = decode(&bytes);
    assert!(!ins.is_empty());
    assert!(ins.iter().all(|i| i.pc < bytes.len()));
    assert!(ins.iter().any(|i| !i.opcode.is_defined()));
}
