use async_trait::async_trait;
use clap::Args;
use selscope_core::signature::{format_selector, selector_of};
use std::error::Error;

/// Arguments for the `selector` subcommand; the input is a signature such as
/// `transfer(address,uint256)`.
#[derive(Args)]
pub struct SelectorArgs;

#[async_trait]
impl super::Command for SelectorArgs {
    async fn execute(self, input: &str) -> Result<(), Box<dyn Error>> {
        println!("{}", format_selector(&selector_of(input)));
        Ok(())
    }
}
