//! Per-step decision policies
//!
//! Implements policies to compare:
//! - Deadline-aware: spot when available, bandit region probing while idle,
//!   irrevocable on-demand commit once slack gets thin
//! - Greedy spot: spot when available, otherwise on-demand (no deadline guard)
//! - On-demand only: baseline
//!
//! ## Deadline-aware state machine
//!
//! ```text
//! PROBING ──spot──▶ RUNNING_SPOT ──spot lost──▶ PROBING
//!    │                   │
//!    └──patience/slack──▶ RUNNING_ON_DEMAND ──spot──▶ RUNNING_SPOT
//!
//! any ──slack ≤ margin──▶ COMMITTED_ON_DEMAND (terminal)
//! ```
//!
//! Every branch keeps an on-demand-only finish available at the next decision
//! even if spot never comes back.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::clock::ClockState;
use crate::config::{JobConfig, PolicyParams};
use crate::environment::EnvironmentCaps;
use crate::error::Result;
use crate::estimator::RegionAvailabilityEstimator;
use crate::guard::CommitGuard;
use crate::types::{Action, Decision, Job, RegionId};

/// Per-step decision policy
pub trait Strategy {
    /// Decide the action for the coming step given the spot signal of the
    /// active region
    fn decide(&mut self, clock: &ClockState, region: RegionId, has_spot: bool) -> Decision;

    /// Get policy name
    fn name(&self) -> &str;

    /// Elapsed time at which the policy locked itself into on-demand, if ever
    fn committed_at(&self) -> Option<f64> {
        None
    }
}

/// Conceptual phase of the deadline-aware policy after its latest decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyPhase {
    Probing,
    RunningSpot,
    RunningOnDemand,
    CommittedOnDemand,
    Done,
}

/// Decision counters kept by the deadline-aware policy
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyStats {
    pub spot_decisions: u64,
    pub on_demand_decisions: u64,
    pub idle_decisions: u64,
    pub region_switches: u64,
}

/// Deadline-aware spot policy, one instance per scenario
#[derive(Debug, Clone)]
pub struct DecisionPolicy {
    job: Job,
    params: PolicyParams,
    caps: EnvironmentCaps,
    guard: CommitGuard,
    estimator: RegionAvailabilityEstimator,
    /// Consecutive idle steps spent waiting for spot
    spotless_idle_steps: u32,
    phase: PolicyPhase,
    stats: PolicyStats,
}

/// Build a policy instance for one scenario.
///
/// Validates the job and parameters and resolves whether region switching is
/// possible once, up front.
pub fn configure(
    job_config: &JobConfig,
    params: PolicyParams,
    caps: EnvironmentCaps,
) -> Result<DecisionPolicy> {
    let job = job_config.job()?;
    params.validate()?;
    Ok(DecisionPolicy::new(job, params, caps))
}

impl DecisionPolicy {
    fn new(job: Job, params: PolicyParams, caps: EnvironmentCaps) -> Self {
        DecisionPolicy {
            job,
            params,
            caps,
            guard: CommitGuard::new(params.safety_margin()),
            estimator: RegionAvailabilityEstimator::new(
                caps.num_regions,
                params.estimator,
                params.ucb_c,
            ),
            spotless_idle_steps: 0,
            phase: PolicyPhase::Probing,
            stats: PolicyStats::default(),
        }
    }

    pub fn job(&self) -> &Job {
        &self.job
    }

    pub fn params(&self) -> &PolicyParams {
        &self.params
    }

    pub fn phase(&self) -> PolicyPhase {
        self.phase
    }

    pub fn stats(&self) -> &PolicyStats {
        &self.stats
    }

    pub fn estimator(&self) -> &RegionAvailabilityEstimator {
        &self.estimator
    }

    pub fn guard(&self) -> &CommitGuard {
        &self.guard
    }

    /// Whether this instance may ask the environment to change region
    pub fn explores_regions(&self) -> bool {
        self.params.explore_regions && self.caps.can_switch()
    }

    /// Safety margin in seconds for the given clock
    pub fn safety_margin(&self, clock: &ClockState) -> f64 {
        self.guard.margin().seconds(clock)
    }

    /// Spot-less idle steps allowed before falling back to on-demand
    fn patience_window(&self) -> u32 {
        let regions = if self.explores_regions() {
            self.caps.num_regions as u32
        } else {
            1
        };
        self.params.patience_steps.saturating_mul(regions)
    }

    /// Slack after one more step that makes no progress and ends off
    /// on-demand, so that the next return to on-demand pays a full launch
    fn slack_after_wasted_step(&self, clock: &ClockState) -> f64 {
        let overhead = clock.launch_overhead().max(clock.overhead_if_on_demand());
        clock.slack(overhead) - clock.gap_s
    }

    fn choose(&mut self, clock: &ClockState, region: RegionId, has_spot: bool) -> Decision {
        if clock.is_done() {
            self.phase = PolicyPhase::Done;
            return Decision::new(Action::Idle);
        }

        if self.guard.check(clock) {
            self.phase = PolicyPhase::CommittedOnDemand;
            return Decision::new(Action::OnDemand);
        }

        let margin = self.safety_margin(clock);

        if has_spot {
            self.spotless_idle_steps = 0;

            // Leaving on-demand risks a wasted spot step plus a fresh launch
            // to get back; only do it when that worst case still fits.
            if clock.last_action == Action::OnDemand
                && self.slack_after_wasted_step(clock) <= margin
            {
                self.phase = PolicyPhase::RunningOnDemand;
                return Decision::new(Action::OnDemand);
            }

            self.phase = PolicyPhase::RunningSpot;
            return Decision::new(Action::Spot);
        }

        let can_idle = self.slack_after_wasted_step(clock) > margin;
        if can_idle && self.spotless_idle_steps < self.patience_window() {
            self.spotless_idle_steps += 1;
            self.phase = PolicyPhase::Probing;

            if self.explores_regions() {
                let total = self.estimator.total_observations();
                if let Some(next) = self.estimator.best_region_to_probe(region, total) {
                    return Decision::idle_and_switch(next);
                }
            }
            return Decision::new(Action::Idle);
        }

        // Unlatched: spot reappearing later can still pull us off on-demand
        self.phase = PolicyPhase::RunningOnDemand;
        Decision::new(Action::OnDemand)
    }
}

impl Strategy for DecisionPolicy {
    fn decide(&mut self, clock: &ClockState, region: RegionId, has_spot: bool) -> Decision {
        // Observed regardless of the action taken
        self.estimator.observe(region, has_spot);

        let before = self.phase;
        let decision = self.choose(clock, region, has_spot);

        match decision.action {
            Action::Spot => self.stats.spot_decisions += 1,
            Action::OnDemand => self.stats.on_demand_decisions += 1,
            Action::Idle => self.stats.idle_decisions += 1,
        }
        if decision.switch_to.is_some() {
            self.stats.region_switches += 1;
        }

        if before != self.phase {
            debug!(
                elapsed_h = clock.elapsed_s / 3600.0,
                from = ?before,
                to = ?self.phase,
                "policy phase change"
            );
        }
        trace!(
            elapsed_h = clock.elapsed_s / 3600.0,
            region,
            has_spot,
            action = %decision.action,
            switch_to = ?decision.switch_to,
            slack_h = clock.on_demand_slack() / 3600.0,
            "decision"
        );

        decision
    }

    fn name(&self) -> &str {
        "DeadlineAware"
    }

    fn committed_at(&self) -> Option<f64> {
        self.guard.committed_at()
    }
}

/// Greedy policy: spot whenever the active region has it, otherwise on-demand
pub struct GreedySpotPolicy {
    pub spot_losses: usize,
}

impl GreedySpotPolicy {
    pub fn new() -> Self {
        GreedySpotPolicy { spot_losses: 0 }
    }
}

impl Default for GreedySpotPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl Strategy for GreedySpotPolicy {
    fn decide(&mut self, clock: &ClockState, _region: RegionId, has_spot: bool) -> Decision {
        if clock.is_done() {
            return Decision::new(Action::Idle);
        }
        if has_spot {
            Decision::new(Action::Spot)
        } else {
            if clock.last_action == Action::Spot {
                self.spot_losses += 1;
            }
            Decision::new(Action::OnDemand)
        }
    }

    fn name(&self) -> &str {
        "GreedySpot"
    }
}

/// Baseline policy: only on-demand (no spot)
pub struct OnDemandOnlyPolicy;

impl OnDemandOnlyPolicy {
    pub fn new() -> Self {
        OnDemandOnlyPolicy
    }
}

impl Default for OnDemandOnlyPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl Strategy for OnDemandOnlyPolicy {
    fn decide(&mut self, clock: &ClockState, _region: RegionId, _has_spot: bool) -> Decision {
        if clock.is_done() {
            Decision::new(Action::Idle)
        } else {
            Decision::new(Action::OnDemand)
        }
    }

    fn name(&self) -> &str {
        "OnDemandOnly"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PolicyPreset;

    const HOUR: f64 = 3600.0;

    fn job_config() -> JobConfig {
        JobConfig::from_hours(10.0, 14.0, 0.1)
    }

    fn policy(num_regions: usize) -> DecisionPolicy {
        configure(
            &job_config(),
            PolicyParams::default(),
            EnvironmentCaps::multi_region(num_regions),
        )
        .unwrap()
    }

    fn clock() -> ClockState {
        ClockState::start(job_config().job().unwrap(), 0.5 * HOUR)
    }

    #[test]
    fn test_configure_rejects_bad_job() {
        let cfg = JobConfig {
            deadline_s: None,
            ..job_config()
        };
        let caps = EnvironmentCaps::single_region();
        assert!(configure(&cfg, PolicyParams::default(), caps).is_err());
    }

    #[test]
    fn test_spot_when_available() {
        let mut p = policy(1);
        let d = p.decide(&clock(), 0, true);
        assert_eq!(d, Decision::new(Action::Spot));
        assert_eq!(p.phase(), PolicyPhase::RunningSpot);
    }

    #[test]
    fn test_observes_every_step() {
        let mut p = policy(2);
        let mut c = clock();
        c.done_work_s = c.job.task_duration_s;
        p.decide(&c, 0, false);
        p.decide(&c, 0, true);
        assert_eq!(p.estimator().observations(0), 2);
    }

    #[test]
    fn test_idle_after_completion() {
        let mut p = policy(1);
        let mut c = clock();
        c.done_work_s = c.job.task_duration_s;
        for has_spot in [true, false] {
            assert_eq!(p.decide(&c, 0, has_spot).action, Action::Idle);
        }
        assert_eq!(p.phase(), PolicyPhase::Done);
    }

    #[test]
    fn test_idle_probe_then_on_demand() {
        let mut p = policy(1);
        let c = clock();

        // patience 1 × 1 region: one idle step, then on-demand
        assert_eq!(p.decide(&c, 0, false), Decision::new(Action::Idle));
        assert_eq!(p.decide(&c, 0, false), Decision::new(Action::OnDemand));
        assert_eq!(p.phase(), PolicyPhase::RunningOnDemand);
        assert!(!p.guard().is_committed());
    }

    #[test]
    fn test_idle_probe_switches_region() {
        let mut p = policy(3);
        let d = p.decide(&clock(), 0, false);
        assert_eq!(d.action, Action::Idle);
        assert_eq!(d.switch_to, Some(1));
        assert_eq!(p.stats().region_switches, 1);
    }

    #[test]
    fn test_single_region_preset_never_switches() {
        let mut p = configure(
            &job_config(),
            PolicyPreset::SingleRegion.params(),
            EnvironmentCaps::multi_region(3),
        )
        .unwrap();
        let d = p.decide(&clock(), 0, false);
        assert_eq!(d, Decision::new(Action::Idle));
    }

    #[test]
    fn test_no_switch_without_capability() {
        let caps = EnvironmentCaps {
            num_regions: 3,
            supports_region_switch: false,
        };
        let mut p = configure(&job_config(), PolicyParams::default(), caps).unwrap();
        assert!(!p.explores_regions());
        assert_eq!(p.decide(&clock(), 0, false).switch_to, None);
    }

    #[test]
    fn test_commit_when_slack_thin() {
        let mut p = policy(2);
        let mut c = clock();
        // slack = 14 - 10 - 0.1 - elapsed; margin = 0.5 + 0.05
        c.elapsed_s = 3.5 * HOUR;
        let d = p.decide(&c, 0, true);
        assert_eq!(d, Decision::new(Action::OnDemand));
        assert_eq!(p.phase(), PolicyPhase::CommittedOnDemand);
        assert_eq!(p.committed_at(), Some(3.5 * HOUR));

        // Latched: spot no longer tempts it, and no region switches
        c.done_work_s = 0.5 * HOUR;
        c.elapsed_s = 4.0 * HOUR;
        c.last_action = Action::OnDemand;
        let d = p.decide(&c, 0, true);
        assert_eq!(d, Decision::new(Action::OnDemand));
    }

    #[test]
    fn test_on_demand_without_latch_when_idle_unsafe() {
        let mut p = policy(1);
        let mut c = clock();
        // on-demand slack 0.9h > margin 0.55h, but idling would leave 0.4h
        c.elapsed_s = 3.0 * HOUR;
        let d = p.decide(&c, 0, false);
        assert_eq!(d, Decision::new(Action::OnDemand));
        assert!(!p.guard().is_committed());
    }

    #[test]
    fn test_stays_on_demand_when_leaving_is_unsafe() {
        let mut p = policy(1);
        let mut c = clock();
        c.started = true;
        c.last_action = Action::OnDemand;
        c.elapsed_s = 2.9 * HOUR;
        // on-demand slack 1.1h, but a wasted spot step plus relaunch leaves 0.5h
        let d = p.decide(&c, 0, true);
        assert_eq!(d, Decision::new(Action::OnDemand));

        c.elapsed_s = 1.0 * HOUR;
        let d = p.decide(&c, 0, true);
        assert_eq!(d, Decision::new(Action::Spot));
    }

    #[test]
    fn test_spot_resets_patience() {
        let mut p = policy(1);
        let c = clock();
        assert_eq!(p.decide(&c, 0, false).action, Action::Idle);
        assert_eq!(p.decide(&c, 0, true).action, Action::Spot);
        assert_eq!(p.decide(&c, 0, false).action, Action::Idle);
    }

    #[test]
    fn test_greedy_policy() {
        let mut policy = GreedySpotPolicy::new();
        let mut c = clock();
        assert_eq!(policy.decide(&c, 0, true).action, Action::Spot);

        c.last_action = Action::Spot;
        assert_eq!(policy.decide(&c, 0, false).action, Action::OnDemand);
        assert_eq!(policy.spot_losses, 1);
    }

    #[test]
    fn test_ondemand_only() {
        let mut policy = OnDemandOnlyPolicy::new();
        let c = clock();
        assert_eq!(policy.decide(&c, 0, true).action, Action::OnDemand);
        assert_eq!(policy.name(), "OnDemandOnly");
    }
}
