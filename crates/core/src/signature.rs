//! Function signature hashing and selector formatting.

use sha3::{Digest, Keccak256};

/// Computes the 4-byte selector of a canonical function signature such as
/// `transfer(address,uint256)`.
pub fn selector_of(signature: &str) -> [u8; 4] {
    let hash = Keccak256::digest(signature.trim().as_bytes());
    let mut selector = [0u8; 4];
    selector.copy_from_slice(&hash[..4]);
    selector
}

/// Formats a selector as `0x`-prefixed lowercase hex.
pub fn format_selector(selector: &[u8; 4]) -> String {
    format!("0x{}", hex::encode(selector))
}

/// Parses `0x12345678` or `12345678` into a selector.
pub fn parse_selector(input: &str) -> Option<[u8; 4]> {
    let clean = input.trim().trim_start_matches("0x");
    let bytes = hex::decode(clean).ok()?;
    bytes.try_into().ok()
}
