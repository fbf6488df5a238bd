/// Module for the `selectors` subcommand, which lists the function selectors a contract's
/// dispatcher recognizes.
use super::read_bytecode;
use async_trait::async_trait;
use clap::Args;
use selscope_analysis::{ScanConfig, ScanReport, analyze};
use serde_json::json;
use std::error::Error;

/// Arguments for the `selectors` subcommand.
#[derive(Args)]
pub struct SelectorsArgs {
    /// Total instruction budget for the scan (0 = engine default)
    #[arg(long, default_value_t = 0)]
    gas_limit: u32,

    /// Distinct contexts explored per block before further arrivals are dropped
    #[arg(long)]
    max_block_visits: Option<usize>,

    /// Print JSON instead of one selector per line
    #[arg(long)]
    json: bool,

    /// Include scan statistics in the output
    #[arg(long)]
    stats: bool,
}

#[async_trait]
impl super::Command for SelectorsArgs {
    async fn execute(self, input: &str) -> Result<(), Box<dyn Error>> {
        let (_, info, bytes) = read_bytecode(input)?;
        if info.truncated {
            tracing::warn!("input ends inside a push operand; missing bytes read as zero");
        }

        let mut config = ScanConfig::with_gas_limit(self.gas_limit);
        if let Some(visits) = self.max_block_visits {
            config.max_block_visits = visits;
        }
        config.validate()?;

        let report = analyze(&bytes, &config);
        println!("{}", render(&report, self.json, self.stats)?);
        Ok(())
    }
}

/// Formats a report for the terminal.
fn render(report: &ScanReport, as_json: bool, with_stats: bool) -> Result<String, serde_json::Error> {
    if as_json {
        let value = if with_stats {
            json!({ "selectors": report.selector_strings(), "stats": report.stats })
        } else {
            json!({ "selectors": report.selector_strings() })
        };
        return serde_json::to_string_pretty(&value);
    }

    let mut lines = report.selector_strings();
    if with_stats {
        let stats = &report.stats;
        lines.push(format!(
            "# {} steps of {}, {} blocks, {} forks, {} pruned, {} dropped, {} indirect jumps{}",
            stats.steps_used,
            stats.step_budget,
            stats.states_explored,
            stats.forks,
            stats.states_pruned,
            stats.states_dropped,
            stats.indirect_jumps,
            if stats.budget_exhausted { ", budget exhausted" } else { "" }
        ));
    }
    Ok(lines.join("\n"))
}
