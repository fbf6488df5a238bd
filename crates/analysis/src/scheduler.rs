//! Exploration Scheduler.
//!
//! Drives the interpreter over the recovered blocks with an explicit depth-first worklist. All
//! paths draw on one step budget and the order in which states are explored is fixed, so a run
//! with a larger budget replays a run with a smaller one before doing more work. A state is
//! skipped when its block start and abstract stack were already explored, and each block start
//! admits a bounded number of distinct contexts; together with the budget this guarantees
//! termination on any input.

use crate::collector::SelectorCollector;
use crate::config::ScanConfig;
use crate::dispatcher::DispatcherMatcher;
use crate::interpreter::{BlockOutcome, Budget, Interpreter};
use crate::report::{ScanReport, ScanStats};
use crate::state::{ExecutionState, StateKey};
use crate::value::AbstractValue;
use selscope_core::cfg_ir::CfgIrBundle;
use selscope_core::signature::format_selector;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// Why a jump could not be followed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeadJump {
    Indirect,
    Invalid(usize),
}

/// One selector scan over a recovered CFG.
#[derive(Debug)]
pub struct Scanner<'a> {
    cfg: &'a CfgIrBundle,
    config: ScanConfig,
}

impl<'a> Scanner<'a> {
    /// A scanner over `cfg`; `config` is used as given, a zero budget meaning the default.
    pub fn new(cfg: &'a CfgIrBundle, config: ScanConfig) -> Self {
        Self { cfg, config }
    }

    /// Explores the program from offset zero and returns the selectors it compares against.
    pub fn scan(&self) -> ScanReport {
        let interpreter = Interpreter::new(&self.config, self.cfg.code_len);
        let mut budget = Budget::new(self.config.effective_budget());
        let mut matcher = DispatcherMatcher::new();
        let mut collector = SelectorCollector::new();
        let mut stats = ScanStats {
            step_budget: budget.total(),
            ..ScanStats::default()
        };

        let mut visited: HashSet<StateKey> = HashSet::new();
        let mut visits: HashMap<usize, usize> = HashMap::new();
        let mut worklist = vec![ExecutionState::initial(self.config.max_stack_depth)];
        let mut next_path = 1;

        while let Some(mut state) = worklist.pop() {
            if budget.is_exhausted() {
                stats.budget_exhausted = true;
                break;
            }
            // Running past the last block is an implicit STOP.
            let Some(block) = self.cfg.block_at(state.pc) else {
                continue;
            };
            if !visited.insert(state.key()) {
                stats.states_pruned += 1;
                continue;
            }
            let count = visits.entry(state.pc).or_default();
            if *count >= self.config.max_block_visits {
                stats.states_dropped += 1;
                continue;
            }
            *count += 1;
            stats.states_explored += 1;

            match interpreter.run_block(block, &mut state, &mut budget) {
                BlockOutcome::Fallthrough(next) => {
                    state.pc = next;
                    worklist.push(state);
                }
                BlockOutcome::Jump { target } => match self.resolve(&target) {
                    Ok(dest) => {
                        state.pc = dest;
                        worklist.push(state);
                    }
                    Err(dead) => Self::count_dead(&mut stats, dead, state.path_id),
                },
                BlockOutcome::Branch {
                    target,
                    condition,
                    fallthrough,
                } => {
                    if let Some(found) = matcher.inspect(&condition) {
                        debug!(
                            "selector {} compared at pc {} on path {}",
                            format_selector(&found.selector),
                            found.origin,
                            state.path_id
                        );
                        collector.record(found.selector);
                    }

                    let (may_jump, may_fall) = feasible(&condition);
                    let mut scheduled = 0;
                    if may_jump {
                        match self.resolve(&target) {
                            Ok(dest) => {
                                worklist.push(state.fork(dest, next_path));
                                next_path += 1;
                                scheduled += 1;
                            }
                            Err(dead) => Self::count_dead(&mut stats, dead, state.path_id),
                        }
                    } else {
                        debug!("branch at pc {} never jumps", state.pc);
                    }
                    // Pushed last so the fallthrough is explored first.
                    if may_fall {
                        state.pc = fallthrough;
                        worklist.push(state);
                        scheduled += 1;
                    }
                    if scheduled == 2 {
                        stats.forks += 1;
                    }
                }
                BlockOutcome::Halt => {}
                BlockOutcome::OutOfBudget => {
                    stats.budget_exhausted = true;
                    break;
                }
                BlockOutcome::StackFault(fault) => {
                    debug!("path {} ended at pc {}: {}", state.path_id, state.pc, fault);
                    stats.stack_faults += 1;
                }
            }
        }

        stats.steps_used = budget.used();
        info!(
            "scan found {} selectors in {} steps ({} blocks, {} forks, exhausted: {})",
            collector.len(),
            stats.steps_used,
            stats.states_explored,
            stats.forks,
            stats.budget_exhausted
        );
        ScanReport {
            selectors: collector.into_vec(),
            stats,
        }
    }

    /// A jump target is followed only when it is a constant naming a `JUMPDEST`.
    fn resolve(&self, target: &AbstractValue) -> Result<usize, DeadJump> {
        let word = target.as_const().ok_or(DeadJump::Indirect)?;
        match word.as_usize() {
            Some(pc) if self.cfg.is_jump_target(pc) => Ok(pc),
            Some(pc) => Err(DeadJump::Invalid(pc)),
            None => Err(DeadJump::Invalid(usize::MAX)),
        }
    }

    fn count_dead(stats: &mut ScanStats, dead: DeadJump, path_id: usize) {
        match dead {
            DeadJump::Indirect => {
                debug!("path {} stops at an indirect jump", path_id);
                stats.indirect_jumps += 1;
            }
            DeadJump::Invalid(pc) => {
                debug!("path {} jumps to invalid destination {:#x}", path_id, pc);
                stats.invalid_jumps += 1;
            }
        }
    }
}

/// Which successors of a `JUMPI` can be taken given its condition.
fn feasible(condition: &AbstractValue) -> (bool, bool) {
    match condition.as_const() {
        Some(word) if word.is_zero() => (false, true),
        Some(_) => (true, false),
        None => (true, true),
    }
}
