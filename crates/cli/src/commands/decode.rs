/// Module for the `decode` subcommand, which prints the instruction listing of EVM bytecode.
use super::read_bytecode;
use async_trait::async_trait;
use clap::Args;
use selscope_core::encoder::encode;
use std::error::Error;

/// Arguments for the `decode` subcommand.
#[derive(Args)]
pub struct DecodeArgs {
    /// Re-encode the listing and report whether it reproduces the input
    #[arg(long)]
    reassemble: bool,
}

/// Executes the `decode` subcommand.
///
/// # Arguments
/// * `input` - A hex string (0x...) or file path (@...) containing EVM bytecode.
#[async_trait]
impl super::Command for DecodeArgs {
    async fn execute(self, input: &str) -> Result<(), Box<dyn Error>> {
        let (instructions, info, bytes) = read_bytecode(input)?;
        println!(
            "; {} bytes, {} instructions, keccak 0x{}{}",
            info.byte_length,
            instructions.len(),
            hex::encode(info.keccak_hash),
            if info.truncated { ", truncated" } else { "" }
        );
        for instr in &instructions {
            println!("{instr}");
        }

        if self.reassemble {
            let encoded = encode(&instructions)?;
            // Truncated input comes back zero-padded, so only the shared prefix must agree.
            let matches = encoded.starts_with(&bytes);
            println!("; reassembly {}", if matches { "matches" } else { "differs" });
        }
        Ok(())
    }
}
