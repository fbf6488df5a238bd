//! Host boundary adapter.
//!
//! Hosts that embed the engine exchange plain byte buffers: the code goes in, the selectors come
//! back concatenated as 4-byte big-endian values. Transport problems are the only failures a host
//! sees; the scan itself always succeeds.

use crate::function_selectors;
use selscope_utils::errors::BoundaryError;

/// Result space a host reserves when it has no better estimate: 512 selectors.
pub const DEFAULT_RESULT_CAPACITY: usize = 512 * 4;

/// Scans `code` and writes the selectors into `out`, returning the number of bytes written.
///
/// Nothing is written when the result does not fit.
pub fn write_selectors(code: &[u8], gas_limit: u32, out: &mut [u8]) -> Result<usize, BoundaryError> {
    let flat = flatten(&function_selectors(code, gas_limit));
    if flat.len() > out.len() {
        return Err(BoundaryError::BufferTooSmall {
            needed: flat.len(),
            capacity: out.len(),
        });
    }
    out[..flat.len()].copy_from_slice(&flat);
    Ok(flat.len())
}

/// Concatenates selectors into one buffer.
pub fn flatten(selectors: &[[u8; 4]]) -> Vec<u8> {
    selectors.concat()
}

/// Splits a result buffer back into selectors.
pub fn unflatten(bytes: &[u8]) -> Result<Vec<[u8; 4]>, BoundaryError> {
    if bytes.len() % 4 != 0 {
        return Err(BoundaryError::MisalignedResult(bytes.len()));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| [chunk[0], chunk[1], chunk[2], chunk[3]])
        .collect())
}
