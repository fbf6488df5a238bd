use async_trait::async_trait;
use clap::Subcommand;
use selscope_core::decoder::{DecodeInfo, Instruction, decode_bytecode};
use selscope_utils::errors::DecodeError;
use std::error::Error;

pub mod cfg;
pub mod decode;
pub mod selector;
pub mod selectors;

/// Subcommands of `selscope`.
#[derive(Subcommand)]
pub enum Cmd {
    /// Recover the function selectors the dispatcher compares against
    Selectors(selectors::SelectorsArgs),

    /// Decode bytecode to an instruction listing
    Decode(decode::DecodeArgs),

    /// Write the CFG as Graphviz DOT to stdout or a file
    Cfg(cfg::CfgArgs),

    /// Compute the selector of a function signature
    Selector(selector::SelectorArgs),
}

/// A subcommand that runs against the `<input>` argument.
#[async_trait]
pub trait Command {
    /// Runs the subcommand.
    async fn execute(self, input: &str) -> Result<(), Box<dyn Error>>;
}

#[async_trait]
impl Command for Cmd {
    async fn execute(self, input: &str) -> Result<(), Box<dyn Error>> {
        match self {
            Cmd::Selectors(args) => args.execute(input).await,
            Cmd::Decode(args) => args.execute(input).await,
            Cmd::Cfg(args) => args.execute(input).await,
            Cmd::Selector(args) => args.execute(input).await,
        }
    }
}

/// Reads bytecode from a hex string, or from a hex file when the input starts with `@`.
pub fn read_bytecode(input: &str) -> Result<(Vec<Instruction>, DecodeInfo, Vec<u8>), DecodeError> {
    match input.strip_prefix('@') {
        Some(path) => decode_bytecode(path, true),
        None => decode_bytecode(input, false),
    }
}
