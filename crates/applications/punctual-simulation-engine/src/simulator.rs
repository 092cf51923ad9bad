//! Step simulator for one strategy over one environment
//!
//! Drives the per-step loop (observe, decide, execute, switch) until the job
//! finishes or the deadline passes, and collects cost and timing metrics so
//! strategies can be compared on the same trace.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{JobConfig, PolicyParams};
use crate::environment::{Environment, Pricing, TraceEnvironment};
use crate::error::Result;
use crate::policies::{configure, Strategy};
use crate::spot_data::SpotTrace;
use crate::types::{Action, RegionId};

/// One executed step, kept when step recording is enabled
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub step: usize,
    pub elapsed_s: f64,
    pub region: RegionId,
    pub has_spot: bool,
    /// Action the strategy asked for
    pub requested: Action,
    /// Action the environment ran
    pub action: Action,
    pub switch_to: Option<RegionId>,
    /// On-demand slack at the start of the step
    pub slack_s: f64,
    pub done_work_s: f64,
    pub cost: f64,
}

/// Result of a simulation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationResult {
    pub policy_name: String,
    pub total_cost: f64,
    pub finished: bool,
    pub met_deadline: bool,
    pub finish_time_hours: Option<f64>,
    pub elapsed_hours: f64,
    pub spot_steps: usize,
    pub on_demand_steps: usize,
    pub idle_steps: usize,
    pub region_switches: usize,
    pub overhead_hours: f64,
    pub committed_at_hours: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<StepRecord>,
}

/// Step simulator
pub struct Simulator {
    policy: Box<dyn Strategy>,
    env: Box<dyn Environment>,
    record_steps: bool,
}

impl Simulator {
    /// Create a new simulator for a strategy and its environment
    pub fn new(policy: Box<dyn Strategy>, env: Box<dyn Environment>) -> Self {
        Simulator {
            policy,
            env,
            record_steps: false,
        }
    }

    /// Keep a per-step record in the result
    pub fn with_step_records(mut self) -> Self {
        self.record_steps = true;
        self
    }

    /// Run until the job completes or the deadline passes
    pub fn run(&mut self) -> Result<SimulationResult> {
        let start = self.env.clock();
        let max_steps = (start.job.deadline_s / start.gap_s).ceil() as usize + 1;
        let caps = self.env.caps();

        let mut steps = Vec::new();
        let mut counts = [0usize; 3];
        let mut region_switches = 0;
        let mut overhead_s = 0.0;
        let mut step = 0;

        while !self.env.is_finished() && step < max_steps {
            let clock = self.env.clock();
            let region = self.env.current_region();
            let has_spot = self.env.has_spot();

            let decision = self.policy.decide(&clock, region, has_spot);
            let outcome = self.env.step(decision.action);

            counts[match outcome.action {
                Action::Spot => 0,
                Action::OnDemand => 1,
                Action::Idle => 2,
            }] += 1;
            overhead_s += outcome.overhead_s;

            let mut switched = None;
            if let Some(target) = decision.switch_to {
                if caps.can_switch() && target != region {
                    self.env.switch_region(target)?;
                    region_switches += 1;
                    switched = Some(target);
                }
            }

            if self.record_steps {
                steps.push(StepRecord {
                    step,
                    elapsed_s: clock.elapsed_s,
                    region,
                    has_spot,
                    requested: decision.action,
                    action: outcome.action,
                    switch_to: switched,
                    slack_s: clock.on_demand_slack(),
                    done_work_s: self.env.clock().done_work_s,
                    cost: outcome.cost,
                });
            }
            step += 1;
        }

        let end = self.env.clock();
        let finish_time = self.env.finish_time();
        let finished = end.is_done();
        let met_deadline = finish_time.is_some_and(|t| t <= end.job.deadline_s + 1e-6);
        let total_cost = self.env.total_cost();

        let result = SimulationResult {
            policy_name: self.policy.name().to_string(),
            total_cost,
            finished,
            met_deadline,
            finish_time_hours: finish_time.map(|t| t / 3600.0),
            elapsed_hours: end.elapsed_s / 3600.0,
            spot_steps: counts[0],
            on_demand_steps: counts[1],
            idle_steps: counts[2],
            region_switches,
            overhead_hours: overhead_s / 3600.0,
            committed_at_hours: self.policy.committed_at().map(|t| t / 3600.0),
            steps,
        };

        debug!(
            policy = %result.policy_name,
            cost = result.total_cost,
            spot_steps = result.spot_steps,
            on_demand_steps = result.on_demand_steps,
            idle_steps = result.idle_steps,
            "simulation finished"
        );
        if !result.met_deadline {
            info!(
                policy = %result.policy_name,
                done_h = end.done_work_s / 3600.0,
                task_h = end.job.task_duration_s / 3600.0,
                "deadline missed"
            );
        }

        Ok(result)
    }
}

/// Run the deadline-aware policy over one trace
pub fn run_scenario(
    job_config: &JobConfig,
    params: PolicyParams,
    trace: SpotTrace,
    pricing: Pricing,
) -> Result<SimulationResult> {
    let env = TraceEnvironment::new(job_config.job()?, trace, pricing)?;
    let policy = configure(job_config, params, env.caps())?;
    Simulator::new(Box::new(policy), Box::new(env)).run()
}
