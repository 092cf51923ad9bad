//! Core types shared by the policy, the environment and the simulator

use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of a region inside an environment
pub type RegionId = usize;

/// What to run for the next control step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Preemptible capacity, only usable when the active region has spot
    Spot,
    /// Reliable capacity, always available
    OnDemand,
    /// Run nothing; costs nothing, makes no progress
    #[default]
    Idle,
}

impl Action {
    /// True for the two modes that incur cost and can make progress
    pub fn is_running(self) -> bool {
        !matches!(self, Action::Idle)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Action::Spot => "SPOT",
            Action::OnDemand => "ON_DEMAND",
            Action::Idle => "IDLE",
        };
        f.write_str(s)
    }
}

/// One per-step decision: an action plus an optional region switch that
/// takes effect from the next step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub action: Action,
    pub switch_to: Option<RegionId>,
}

impl Decision {
    pub fn new(action: Action) -> Self {
        Decision {
            action,
            switch_to: None,
        }
    }

    pub fn idle_and_switch(region: RegionId) -> Self {
        Decision {
            action: Action::Idle,
            switch_to: Some(region),
        }
    }
}

/// Immutable job constants for one scenario (all in seconds)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub task_duration_s: f64,
    /// Absolute deadline, measured from t=0
    pub deadline_s: f64,
    pub restart_overhead_s: f64,
    /// Added once to the overhead of the job's first launch
    pub inter_task_overhead_s: f64,
}

impl Job {
    pub fn new(task_duration_s: f64, deadline_s: f64, restart_overhead_s: f64) -> Self {
        Job {
            task_duration_s,
            deadline_s,
            restart_overhead_s,
            inter_task_overhead_s: 0.0,
        }
    }

    /// Whether an on-demand-only run started at t=0 can meet the deadline
    pub fn is_feasible(&self) -> bool {
        self.deadline_s
            >= self.task_duration_s + self.restart_overhead_s + self.inter_task_overhead_s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_running_modes() {
        assert!(Action::Spot.is_running());
        assert!(Action::OnDemand.is_running());
        assert!(!Action::Idle.is_running());
        assert_eq!(Action::default(), Action::Idle);
    }

    #[test]
    fn test_action_serde_names() {
        let json = serde_json::to_string(&Action::OnDemand).unwrap();
        assert_eq!(json, "\"on_demand\"");
        let back: Action = serde_json::from_str("\"spot\"").unwrap();
        assert_eq!(back, Action::Spot);
    }

    #[test]
    fn test_job_feasibility() {
        let job = Job::new(48.0 * 3600.0, 52.0 * 3600.0, 0.02 * 3600.0);
        assert!(job.is_feasible());

        let tight = Job::new(10.0, 10.0, 1.0);
        assert!(!tight.is_feasible());
    }
}
