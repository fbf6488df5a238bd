use selscope_utils::errors::ConfigError;
use serde::{Deserialize, Serialize};

/// Steps granted to a scan when the caller passes a gas limit of zero.
pub const DEFAULT_STEP_BUDGET: u64 = 500_000;

/// The EVM's stack limit.
pub const MAX_STACK_DEPTH: usize = 1024;

/// Tuning knobs for a selector scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Total instruction steps shared by every explored path. Zero selects
    /// [`DEFAULT_STEP_BUDGET`].
    pub step_budget: u64,
    /// Paths whose stack grows past this depth end there.
    pub max_stack_depth: usize,
    /// Distinct abstract contexts explored per block start before further arrivals are dropped.
    pub max_block_visits: usize,
    /// Boolean operations a selector comparison may pass through and still count as a test.
    pub max_condition_chain: u8,
    /// Whether constant-offset memory words are tracked.
    pub track_memory: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            step_budget: DEFAULT_STEP_BUDGET,
            max_stack_depth: MAX_STACK_DEPTH,
            max_block_visits: 64,
            max_condition_chain: 4,
            track_memory: true,
        }
    }
}

impl ScanConfig {
    /// Default settings with the step budget taken from a host-supplied gas limit.
    pub fn with_gas_limit(gas_limit: u32) -> Self {
        Self {
            step_budget: u64::from(gas_limit),
            ..Self::default()
        }
    }

    /// A cheap configuration for interactive use.
    pub fn quick() -> Self {
        Self {
            step_budget: 50_000,
            max_block_visits: 8,
            ..Self::default()
        }
    }

    /// A generous configuration for large or heavily branching contracts.
    pub fn thorough() -> Self {
        Self {
            step_budget: 5_000_000,
            max_block_visits: 512,
            max_condition_chain: 8,
            ..Self::default()
        }
    }

    /// The step budget after the zero-means-default rule is applied.
    pub const fn effective_budget(&self) -> u64 {
        if self.step_budget == 0 {
            DEFAULT_STEP_BUDGET
        } else {
            self.step_budget
        }
    }

    /// Checks that every bound is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_stack_depth == 0 || self.max_stack_depth > MAX_STACK_DEPTH {
            return Err(ConfigError::StackDepth(self.max_stack_depth));
        }
        if self.max_block_visits == 0 {
            return Err(ConfigError::BlockVisits);
        }
        if self.max_condition_chain == 0 {
            return Err(ConfigError::ConditionChain);
        }
        Ok(())
    }
}
