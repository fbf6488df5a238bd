use selscope_core::signature::format_selector;
use serde::{Deserialize, Serialize};

/// Counters describing how a scan went.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanStats {
    /// Instructions executed across all paths.
    pub steps_used: u64,
    /// The budget the scan ran under.
    pub step_budget: u64,
    /// Blocks executed.
    pub states_explored: usize,
    /// Arrivals skipped because the same block and stack were already explored.
    pub states_pruned: usize,
    /// Arrivals skipped because their block hit the visit bound.
    pub states_dropped: usize,
    /// Branches where both successors were scheduled.
    pub forks: usize,
    /// Jumps whose destination was not a known constant.
    pub indirect_jumps: usize,
    /// Jumps to a constant that is not a `JUMPDEST`.
    pub invalid_jumps: usize,
    /// Paths ended by stack underflow or overflow.
    pub stack_faults: usize,
    /// Whether the scan stopped because the budget ran out.
    pub budget_exhausted: bool,
}

/// Selectors found by a scan together with its statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanReport {
    /// Selectors in first-discovery order.
    pub selectors: Vec<[u8; 4]>,
    /// Counters describing how the scan went.
    pub stats: ScanStats,
}

impl ScanReport {
    /// The selectors as `0x`-prefixed hex strings.
    pub fn selector_strings(&self) -> Vec<String> {
        self.selectors.iter().map(format_selector).collect()
    }

    /// Whether the scan stopped early; the selector set may then be incomplete.
    pub const fn is_partial(&self) -> bool {
        self.stats.budget_exhausted
    }
}
