//! Trace-driven environment
//!
//! Advances time in fixed `gap_s` steps, reveals `has_spot` for the active
//! region only, applies restart overhead and accumulates completed work.
//!
//! ## Overhead
//!
//! `pending_overhead_s` is re-armed to a full restart whenever a running mode
//! starts after a different mode, after an idle step, or after a region
//! switch. While it is positive no work accrues; it drains at wall-clock rate
//! while running. The job's first launch additionally pays the one-time
//! inter-task overhead.
//!
//! ## Region switches
//!
//! `switch_region` takes effect from the next step: the new region's spot
//! signal is visible from that step on and the next launch pays overhead.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::clock::{ClockState, EPSILON_S};
use crate::error::{Result, SimulationError};
use crate::spot_data::SpotTrace;
use crate::types::{Action, Job, RegionId};

/// What the environment supports, resolved once at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentCaps {
    pub num_regions: usize,
    pub supports_region_switch: bool,
}

impl EnvironmentCaps {
    pub fn single_region() -> Self {
        EnvironmentCaps {
            num_regions: 1,
            supports_region_switch: false,
        }
    }

    pub fn multi_region(num_regions: usize) -> Self {
        EnvironmentCaps {
            num_regions: num_regions.max(1),
            supports_region_switch: num_regions > 1,
        }
    }

    pub fn can_switch(&self) -> bool {
        self.supports_region_switch && self.num_regions > 1
    }
}

/// Hourly prices charged while running
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pricing {
    pub on_demand_per_hour: f64,
    pub spot_per_hour: f64,
}

impl Pricing {
    pub fn per_hour(&self, action: Action) -> f64 {
        match action {
            Action::Spot => self.spot_per_hour,
            Action::OnDemand => self.on_demand_per_hour,
            Action::Idle => 0.0,
        }
    }
}

impl Default for Pricing {
    fn default() -> Self {
        Pricing {
            on_demand_per_hour: 3.06,
            spot_per_hour: 1.02,
        }
    }
}

/// Result of executing one step
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepOutcome {
    /// Action actually executed (spot without availability runs as idle)
    pub action: Action,
    pub region: RegionId,
    pub cost: f64,
    pub work_s: f64,
    /// Overhead consumed during the step
    pub overhead_s: f64,
}

/// Environment interface consumed by the simulator, one call per step
pub trait Environment {
    fn caps(&self) -> EnvironmentCaps;

    /// Snapshot of time, progress and overhead at the start of the step
    fn clock(&self) -> ClockState;

    fn current_region(&self) -> RegionId;

    /// Spot signal of the active region for the current step
    fn has_spot(&self) -> bool;

    /// Execute `action` for one step and advance time by `gap_s`
    fn step(&mut self, action: Action) -> StepOutcome;

    /// Move to another region from the next step on
    fn switch_region(&mut self, region: RegionId) -> Result<()>;

    /// Append-only record of work credited per running step
    fn done_work_segments(&self) -> &[f64];

    /// Exact time the last unit of work completed, if it has
    fn finish_time(&self) -> Option<f64>;

    /// Cost accumulated so far
    fn total_cost(&self) -> f64;

    fn is_finished(&self) -> bool {
        let clock = self.clock();
        clock.is_done() || clock.is_past_deadline()
    }
}

/// Environment replaying a recorded or synthetic spot trace
#[derive(Debug, Clone)]
pub struct TraceEnvironment {
    job: Job,
    trace: SpotTrace,
    pricing: Pricing,
    gap_s: f64,
    step_index: usize,
    elapsed_s: f64,
    done_work_segments: Vec<f64>,
    done_work_s: f64,
    pending_overhead_s: f64,
    last_action: Action,
    started: bool,
    region: RegionId,
    relocated: bool,
    finish_time_s: Option<f64>,
    total_cost: f64,
}

impl TraceEnvironment {
    pub fn new(job: Job, trace: SpotTrace, pricing: Pricing) -> Result<Self> {
        if trace.num_regions() == 0 {
            return Err(SimulationError::config("trace has no regions"));
        }
        if !(trace.gap_seconds > 0.0) {
            return Err(SimulationError::config("trace gap_seconds must be positive"));
        }
        Ok(TraceEnvironment {
            job,
            gap_s: trace.gap_seconds,
            trace,
            pricing,
            step_index: 0,
            elapsed_s: 0.0,
            done_work_segments: Vec::new(),
            done_work_s: 0.0,
            pending_overhead_s: 0.0,
            last_action: Action::Idle,
            started: false,
            region: 0,
            relocated: false,
            finish_time_s: None,
            total_cost: 0.0,
        })
    }

    fn check_region(&self, region: RegionId) -> Result<()> {
        if region >= self.trace.num_regions() {
            return Err(SimulationError::RegionOutOfRange {
                region,
                num_regions: self.trace.num_regions(),
            });
        }
        Ok(())
    }
}

impl Environment for TraceEnvironment {
    fn caps(&self) -> EnvironmentCaps {
        EnvironmentCaps::multi_region(self.trace.num_regions())
    }

    fn clock(&self) -> ClockState {
        ClockState {
            job: self.job,
            elapsed_s: self.elapsed_s,
            gap_s: self.gap_s,
            done_work_s: self.done_work_s,
            pending_overhead_s: self.pending_overhead_s,
            last_action: self.last_action,
            started: self.started,
        }
    }

    fn current_region(&self) -> RegionId {
        self.region
    }

    fn has_spot(&self) -> bool {
        self.trace.is_available(self.region, self.step_index)
    }

    fn step(&mut self, requested: Action) -> StepOutcome {
        let mut action = requested;
        if action == Action::Spot && !self.has_spot() {
            warn!(
                step = self.step_index,
                region = self.region,
                "spot requested without availability; running idle"
            );
            action = Action::Idle;
        }

        let mut outcome = StepOutcome {
            action,
            region: self.region,
            cost: 0.0,
            work_s: 0.0,
            overhead_s: 0.0,
        };

        if action.is_running() {
            let relaunch = self.relocated || action != self.last_action;
            if relaunch {
                self.pending_overhead_s = self.clock().launch_overhead();
                self.started = true;
                self.relocated = false;
            }

            let overhead = self.pending_overhead_s.min(self.gap_s);
            self.pending_overhead_s -= overhead;

            let remaining = (self.job.task_duration_s - self.done_work_s).max(0.0);
            let work = (self.gap_s - overhead).min(remaining);

            let mut billed_s = self.gap_s;
            if work > 0.0 {
                self.done_work_segments.push(work);
                self.done_work_s += work;
                if self.job.task_duration_s - self.done_work_s <= EPSILON_S {
                    self.done_work_s = self.job.task_duration_s;
                    billed_s = overhead + work;
                    self.finish_time_s.get_or_insert(self.elapsed_s + billed_s);
                }
            }

            outcome.cost = self.pricing.per_hour(action) * billed_s / 3600.0;
            outcome.work_s = work;
            outcome.overhead_s = overhead;
            self.total_cost += outcome.cost;
        }

        self.last_action = action;
        self.step_index += 1;
        self.elapsed_s += self.gap_s;
        outcome
    }

    fn switch_region(&mut self, region: RegionId) -> Result<()> {
        self.check_region(region)?;
        if region != self.region {
            self.region = region;
            self.relocated = true;
        }
        Ok(())
    }

    fn done_work_segments(&self) -> &[f64] {
        &self.done_work_segments
    }

    fn finish_time(&self) -> Option<f64> {
        self.finish_time_s
    }

    fn total_cost(&self) -> f64 {
        self.total_cost
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> Job {
        // 1h of work, 2h deadline, 6 minute restart
        Job::new(3600.0, 7200.0, 360.0)
    }

    fn env(series: Vec<Vec<bool>>) -> TraceEnvironment {
        TraceEnvironment::new(job(), SpotTrace::from_series(600.0, series), Pricing::default())
            .unwrap()
    }

    #[test]
    fn test_first_launch_pays_overhead() {
        let mut env = env(vec![vec![true; 12]]);
        let out = env.step(Action::Spot);
        assert_eq!(out.overhead_s, 360.0);
        assert_eq!(out.work_s, 240.0);
        assert_eq!(env.clock().done_work_s, 240.0);
        assert_eq!(env.clock().pending_overhead_s, 0.0);

        // Same mode, same region: no new overhead
        let out = env.step(Action::Spot);
        assert_eq!(out.overhead_s, 0.0);
        assert_eq!(out.work_s, 600.0);
    }

    #[test]
    fn test_mode_change_rearms_overhead() {
        let mut env = env(vec![vec![true; 12]]);
        env.step(Action::Spot);
        let out = env.step(Action::OnDemand);
        assert_eq!(out.overhead_s, 360.0);

        // Idle then resume: a fresh launch
        env.step(Action::Idle);
        let out = env.step(Action::OnDemand);
        assert_eq!(out.overhead_s, 360.0);
    }

    #[test]
    fn test_overhead_longer_than_step_carries_over() {
        let j = Job::new(3600.0, 7200.0, 900.0);
        let mut env =
            TraceEnvironment::new(j, SpotTrace::constant(1, 12, 600.0, true), Pricing::default())
                .unwrap();
        let out = env.step(Action::OnDemand);
        assert_eq!(out.work_s, 0.0);
        assert_eq!(env.clock().pending_overhead_s, 300.0);
        assert!(env.done_work_segments().is_empty());

        let out = env.step(Action::OnDemand);
        assert_eq!(out.overhead_s, 300.0);
        assert_eq!(out.work_s, 300.0);
    }

    #[test]
    fn test_spot_without_availability_runs_idle() {
        let mut env = env(vec![vec![false; 4]]);
        let out = env.step(Action::Spot);
        assert_eq!(out.action, Action::Idle);
        assert_eq!(out.cost, 0.0);
        assert_eq!(env.clock().elapsed_s, 600.0);
    }

    #[test]
    fn test_region_switch_takes_effect_next_step() {
        let mut env = env(vec![vec![false; 4], vec![true; 4]]);
        assert!(!env.has_spot());
        env.step(Action::Idle);
        env.switch_region(1).unwrap();
        assert_eq!(env.current_region(), 1);
        assert!(env.has_spot());

        assert!(env.switch_region(2).is_err());
    }

    #[test]
    fn test_region_switch_rearms_overhead() {
        let mut env = env(vec![vec![true; 4], vec![true; 4]]);
        env.step(Action::Spot);
        env.switch_region(1).unwrap();
        let out = env.step(Action::Spot);
        assert_eq!(out.overhead_s, 360.0);
    }

    #[test]
    fn test_finish_mid_step_bills_partial_time() {
        let j = Job::new(900.0, 7200.0, 0.0);
        let mut env = TraceEnvironment::new(
            j,
            SpotTrace::constant(1, 4, 600.0, false),
            Pricing {
                on_demand_per_hour: 3.6,
                spot_per_hour: 1.2,
            },
        )
        .unwrap();
        env.step(Action::OnDemand);
        let out = env.step(Action::OnDemand);
        assert_eq!(out.work_s, 300.0);
        assert!((out.cost - 0.3).abs() < 1e-9);
        assert_eq!(env.finish_time(), Some(900.0));
        assert!(env.is_finished());
        assert!((env.total_cost() - 0.9).abs() < 1e-9);

        // Work never exceeds the task
        let out = env.step(Action::OnDemand);
        assert_eq!(out.work_s, 0.0);
        assert_eq!(env.clock().done_work_s, 900.0);
    }

    #[test]
    fn test_done_work_is_sum_of_segments() {
        let mut env = env(vec![vec![true, false, true, true, true, true, true, true]]);
        for action in [Action::Spot, Action::OnDemand, Action::Spot, Action::Spot] {
            env.step(action);
        }
        let sum: f64 = env.done_work_segments().iter().sum();
        assert!((sum - env.clock().done_work_s).abs() < 1e-9);
    }
}
