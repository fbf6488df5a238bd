use thiserror::Error;

/// Error type for CFG construction.
#[derive(Debug, Error)]
pub enum CfgIrError {
    /// No valid entry block was found (e.g., empty instruction list).
    #[error("no valid entry block found")]
    NoEntryBlock,
}

/// Custom error type for turning user input into bytecode.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The input is not valid hex.
    #[error("hex decode failed: {0}")]
    HexDecode(#[from] hex::FromHexError),

    /// The input file could not be read.
    #[error("could not read file '{path}': {source}")]
    FileRead {
        /// Path as given on input.
        path: String,
        /// The I/O failure.
        #[source]
        source: std::io::Error,
    },
}

/// Errors that can occur during the encoding process.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// The immediate data for a PUSH opcode is longer than the push width.
    #[error("invalid immediate at pc {pc}: PUSH{width} cannot carry {len} bytes")]
    InvalidImmediate {
        /// Offset of the instruction.
        pc: usize,
        /// Push width in bytes.
        width: u8,
        /// Length of the supplied immediate.
        len: usize,
    },
    /// A non-push opcode carried immediate data.
    #[error("unexpected immediate on {opcode} at pc {pc}")]
    UnexpectedImmediate {
        /// Offset of the instruction.
        pc: usize,
        /// Mnemonic of the offending opcode.
        opcode: String,
    },
}

/// Errors raised when a scan configuration is rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Stack depth outside the EVM's range.
    #[error("max_stack_depth must be between 1 and 1024, got {0}")]
    StackDepth(usize),
    /// A zero visit bound would explore nothing.
    #[error("max_block_visits must be greater than 0")]
    BlockVisits,
    /// A zero chain bound would reject every comparison.
    #[error("max_condition_chain must be greater than 0")]
    ConditionChain,
}

/// Failures at the host boundary, where selectors are copied out of the engine.
///
/// These are the only errors a caller of the analysis ever observes; problems with the
/// bytecode itself only shrink the result.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BoundaryError {
    /// The output buffer cannot hold every selector.
    #[error("result buffer too small: need {needed} bytes, have {capacity}")]
    BufferTooSmall {
        /// Bytes the result occupies.
        needed: usize,
        /// Bytes the caller provided.
        capacity: usize,
    },
    /// A flattened result whose length is not a multiple of 4.
    #[error("result length {0} is not a multiple of 4")]
    MisalignedResult(usize),
}
