//! Selector recovery for EVM bytecode.
//!
//! Recovers the 4-byte function selectors a contract's dispatcher compares call input against,
//! using abstract interpretation over the control-flow graph built by `selscope-core`. A scan
//! never fails: malformed code, indirect jumps and budget exhaustion only make the result
//! smaller.

pub mod boundary;
pub mod collector;
pub mod config;
pub mod dispatcher;
pub mod interpreter;
pub mod report;
pub mod scheduler;
pub mod state;
pub mod value;
pub mod word;

pub use config::{DEFAULT_STEP_BUDGET, ScanConfig};
pub use report::{ScanReport, ScanStats};
pub use scheduler::Scanner;

use selscope_core::cfg_ir::CfgIrBundle;

/// Scans raw bytecode under `config`.
pub fn analyze(code: &[u8], config: &ScanConfig) -> ScanReport {
    // Empty code has no blocks and runs nothing.
    let Ok(cfg) = CfgIrBundle::from_bytecode(code) else {
        tracing::debug!("no blocks in {} bytes of code", code.len());
        return ScanReport {
            stats: ScanStats {
                step_budget: config.effective_budget(),
                ..ScanStats::default()
            },
            ..ScanReport::default()
        };
    };
    Scanner::new(&cfg, config.clone()).scan()
}

/// The selectors a contract dispatches on, in first-discovery order.
///
/// `gas_limit` bounds the total number of instructions interpreted; zero selects
/// [`DEFAULT_STEP_BUDGET`].
pub fn function_selectors(code: &[u8], gas_limit: u32) -> Vec<[u8; 4]> {
    analyze(code, &ScanConfig::with_gas_limit(gas_limit)).selectors
}
