//! Slack and feasibility arithmetic
//!
//! ```text
//! remaining_work = task_duration - done_work
//! remaining_time = deadline - elapsed
//! slack(o)       = remaining_time - (remaining_work + o)
//! ```
//!
//! `o` is the overhead the job would pay if it committed to on-demand right
//! now: whatever is still pending when it is already on on-demand, otherwise a
//! full restart (plus the one-time inter-task overhead before the first launch).

use serde::{Deserialize, Serialize};

use crate::types::{Action, Job};

/// Tolerance for floating point comparisons on second-scale quantities
pub const EPSILON_S: f64 = 1e-6;

/// Snapshot of a scenario's clock at the start of a control step
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClockState {
    pub job: Job,
    pub elapsed_s: f64,
    pub gap_s: f64,
    pub done_work_s: f64,
    pub pending_overhead_s: f64,
    /// Action the environment executed during the previous step
    pub last_action: Action,
    /// Whether the job has launched at least once
    pub started: bool,
}

impl ClockState {
    /// Clock at t=0 for a fresh scenario
    pub fn start(job: Job, gap_s: f64) -> Self {
        ClockState {
            job,
            elapsed_s: 0.0,
            gap_s,
            done_work_s: 0.0,
            pending_overhead_s: 0.0,
            last_action: Action::Idle,
            started: false,
        }
    }

    pub fn remaining_work(&self) -> f64 {
        self.job.task_duration_s - self.done_work_s
    }

    pub fn remaining_time(&self) -> f64 {
        self.job.deadline_s - self.elapsed_s
    }

    pub fn is_done(&self) -> bool {
        self.remaining_work() <= EPSILON_S
    }

    pub fn is_past_deadline(&self) -> bool {
        self.remaining_time() <= 0.0
    }

    /// Overhead paid by the next launch of a running mode
    pub fn launch_overhead(&self) -> f64 {
        if self.started {
            self.job.restart_overhead_s
        } else {
            self.job.restart_overhead_s + self.job.inter_task_overhead_s
        }
    }

    /// Overhead still to pay if the job switched to on-demand now. Staying on
    /// on-demand costs only what is pending; anything else is a fresh launch.
    pub fn overhead_if_on_demand(&self) -> f64 {
        if self.last_action == Action::OnDemand {
            self.pending_overhead_s.max(0.0)
        } else {
            self.launch_overhead()
        }
    }

    pub fn slack(&self, overhead_if_commit_now: f64) -> f64 {
        self.remaining_time() - (self.remaining_work() + overhead_if_commit_now)
    }

    /// Slack against the guaranteed on-demand finishing path
    pub fn on_demand_slack(&self) -> f64 {
        self.slack(self.overhead_if_on_demand())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: f64 = 3600.0;

    fn job() -> Job {
        Job::new(48.0 * HOUR, 52.0 * HOUR, 0.02 * HOUR)
    }

    #[test]
    fn test_fresh_clock() {
        let clock = ClockState::start(job(), 600.0);
        assert_eq!(clock.remaining_work(), 48.0 * HOUR);
        assert_eq!(clock.remaining_time(), 52.0 * HOUR);
        assert!(!clock.is_done());
        assert!((clock.on_demand_slack() - (4.0 - 0.02) * HOUR).abs() < 1e-6);
    }

    #[test]
    fn test_pending_overhead_only_counts_on_on_demand() {
        let mut clock = ClockState::start(job(), 600.0);
        clock.started = true;
        clock.pending_overhead_s = 30.0;

        // On spot, returning to on-demand is a full restart
        clock.last_action = Action::Spot;
        assert_eq!(clock.overhead_if_on_demand(), 0.02 * HOUR);

        // Already on on-demand: only the remainder of the current overhead
        clock.last_action = Action::OnDemand;
        assert_eq!(clock.overhead_if_on_demand(), 30.0);

        clock.pending_overhead_s = 0.0;
        assert_eq!(clock.overhead_if_on_demand(), 0.0);
    }

    #[test]
    fn test_inter_task_overhead_before_first_launch() {
        let mut j = job();
        j.inter_task_overhead_s = 120.0;
        let mut clock = ClockState::start(j, 600.0);
        assert_eq!(clock.launch_overhead(), 0.02 * HOUR + 120.0);

        clock.started = true;
        assert_eq!(clock.launch_overhead(), 0.02 * HOUR);
    }

    #[test]
    fn test_done_and_deadline() {
        let mut clock = ClockState::start(job(), 600.0);
        clock.done_work_s = 48.0 * HOUR;
        assert!(clock.is_done());

        clock.elapsed_s = 52.0 * HOUR;
        assert!(clock.is_past_deadline());
    }
}
