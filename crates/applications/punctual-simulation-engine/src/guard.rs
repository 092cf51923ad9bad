//! One-way latch into permanent on-demand
//!
//! Decisions happen once per `gap_s`, so the latch must close while there is
//! still room for one more wasted step:
//!
//! ```text
//! commit  ⇔  slack(overhead_if_on_demand) ≤ margin
//! margin  =  gap_steps × gap_s + overhead_fraction × restart_overhead_s
//! ```
//!
//! With `gap_steps ≥ 1`, any uncommitted step that turns out to be useless
//! (spot vanishes, overhead eats the step) still leaves non-negative slack for
//! an on-demand-only finish at the next decision.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::clock::ClockState;

/// Slack reserved on top of the on-demand finishing path
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SafetyMargin {
    pub gap_steps: f64,
    pub overhead_fraction: f64,
}

impl Default for SafetyMargin {
    fn default() -> Self {
        SafetyMargin {
            gap_steps: 1.0,
            overhead_fraction: 0.5,
        }
    }
}

impl SafetyMargin {
    pub fn seconds(&self, clock: &ClockState) -> f64 {
        self.gap_steps * clock.gap_s + self.overhead_fraction * clock.job.restart_overhead_s
    }
}

/// Irrevocable commit to on-demand; never resets within a scenario
#[derive(Debug, Clone)]
pub struct CommitGuard {
    margin: SafetyMargin,
    committed: bool,
    committed_at_s: Option<f64>,
}

impl CommitGuard {
    pub fn new(margin: SafetyMargin) -> Self {
        CommitGuard {
            margin,
            committed: false,
            committed_at_s: None,
        }
    }

    pub fn margin(&self) -> SafetyMargin {
        self.margin
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }

    /// Elapsed time at which the latch closed
    pub fn committed_at(&self) -> Option<f64> {
        self.committed_at_s
    }

    /// Worst-case check: would an on-demand-only finish still fit if every
    /// further spot attempt failed? Pure; does not latch.
    pub fn should_commit(&self, clock: &ClockState) -> bool {
        self.committed || clock.on_demand_slack() <= self.margin.seconds(clock)
    }

    /// Evaluate and latch. Returns whether the guard is (now) committed.
    pub fn check(&mut self, clock: &ClockState) -> bool {
        if !self.committed && self.should_commit(clock) {
            self.committed = true;
            self.committed_at_s = Some(clock.elapsed_s);
            info!(
                elapsed_h = clock.elapsed_s / 3600.0,
                slack_h = clock.on_demand_slack() / 3600.0,
                remaining_work_h = clock.remaining_work() / 3600.0,
                "commit guard latched: on-demand for the rest of the scenario"
            );
        }
        self.committed
    }
}
