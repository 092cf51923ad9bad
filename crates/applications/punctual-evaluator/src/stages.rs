//! Evaluation stages
//!
//! Stage 1 checks that the candidate builds a policy and survives a small
//! synthetic run. Stage 2 sweeps every scenario of the dataset and scores
//! the resulting costs. Failures on a single trace are counted against that
//! scenario and never stop the sweep.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

use punctual_simulation_engine::{
    run_scenario, JobConfig, PolicyParams, Pricing, RegionProfile, SimulationResult, SpotTrace,
    TraceGenerator,
};

use crate::dataset::Scenario;
use crate::error::{EvaluatorError, Result};
use crate::pricing::{PriceTable, COST_K};
use crate::program::CandidateProgram;
use crate::score::{compute_score, ScenarioStats, ScoreReport};

const SMOKE_SEED: u64 = 7;
const SMOKE_GAP_SECONDS: f64 = 600.0;

/// Stage 1: load the candidate and run it once on a built-in scenario
pub fn smoke_test(program_path: &Path) -> Result<(CandidateProgram, PolicyParams)> {
    let program = CandidateProgram::load(program_path)?;
    let params = program.params()?;

    let job_config = JobConfig::from_hours(4.0, 6.0, 0.1);
    let profiles = [
        RegionProfile {
            mean_up_hours: 2.0,
            mean_down_hours: 1.0,
        },
        RegionProfile {
            mean_up_hours: 1.0,
            mean_down_hours: 1.0,
        },
    ];
    let trace = TraceGenerator::new(SMOKE_SEED)
        .generate(&profiles, 6.0, SMOKE_GAP_SECONDS)
        .map_err(|e| EvaluatorError::stage(1, e.to_string()))?;

    let result = run_scenario(&job_config, params, trace, Pricing::default())
        .map_err(|e| EvaluatorError::stage(1, e.to_string()))?;
    if !result.finished {
        return Err(EvaluatorError::stage(1, "policy did not finish the smoke scenario"));
    }

    info!(
        program = %program.display_name(),
        cost = result.total_cost,
        met_deadline = result.met_deadline,
        "stage 1 passed"
    );
    Ok((program, params))
}

/// Outcome of the scenario sweep
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepReport {
    pub scenarios: BTreeMap<String, ScenarioStats>,
    pub score: ScoreReport,
    pub traces_run: usize,
    pub failures: usize,
}

/// Stage 2: run every scenario and score the costs
pub fn sweep(
    params: &PolicyParams,
    scenarios: &[Scenario],
    dataset_dir: &Path,
    prices: &PriceTable,
) -> SweepReport {
    let mut stats = BTreeMap::new();
    for scenario in scenarios {
        let scenario_stats = run_one_scenario(params, scenario, dataset_dir, prices);
        stats.insert(scenario.name.clone(), scenario_stats);
    }

    let traces_run = stats.values().map(|s| s.count).sum();
    let failures = stats.values().map(|s| s.failures).sum();
    let score = compute_score(&stats, prices);
    info!(
        score = score.score,
        avg_cost = score.avg_cost,
        traces_run,
        failures,
        "stage 2 complete"
    );

    SweepReport {
        scenarios: stats,
        score,
        traces_run,
        failures,
    }
}

fn run_one_scenario(
    params: &PolicyParams,
    scenario: &Scenario,
    dataset_dir: &Path,
    prices: &PriceTable,
) -> ScenarioStats {
    let env_path = scenario.env_path.to_string_lossy().into_owned();
    let mut stats = ScenarioStats::new(&env_path, scenario.task_duration_hours);

    let files = match scenario.trace_files(dataset_dir) {
        Ok(files) if !files.is_empty() => files,
        Ok(_) => {
            warn!(scenario = %scenario.name, "no traces found");
            stats.failures += 1;
            return stats;
        }
        Err(e) => {
            warn!(scenario = %scenario.name, error = %e, "scenario skipped");
            stats.failures += 1;
            return stats;
        }
    };

    let pricing = match prices.resolve_on_demand_price(&env_path) {
        Some(od) => Pricing {
            on_demand_per_hour: od,
            spot_per_hour: od / COST_K,
        },
        None => {
            warn!(scenario = %scenario.name, env_path = %env_path, "no price for environment");
            Pricing::default()
        }
    };
    let on_demand_job_cost = pricing.on_demand_per_hour * scenario.task_duration_hours;
    let job_config = scenario.job_config();

    let mut total_cost = 0.0;
    for file in &files {
        let outcome = SpotTrace::from_file(file)
            .and_then(|trace| run_scenario(&job_config, *params, trace, pricing));
        match outcome {
            Ok(result) => {
                let cost = charged_cost(&result, on_demand_job_cost);
                if !result.met_deadline {
                    stats.deadline_misses += 1;
                }
                debug!(
                    scenario = %scenario.name,
                    trace = %file.display(),
                    cost,
                    met_deadline = result.met_deadline,
                    "trace done"
                );
                total_cost += cost;
                stats.count += 1;
            }
            Err(e) => {
                warn!(
                    scenario = %scenario.name,
                    trace = %file.display(),
                    error = %e,
                    "trace failed"
                );
                stats.failures += 1;
            }
        }
    }

    if stats.count > 0 {
        stats.mean_cost = Some(total_cost / stats.count as f64);
    }
    stats
}

/// Missing the deadline costs at least as much as running on-demand throughout
fn charged_cost(result: &SimulationResult, on_demand_job_cost: f64) -> f64 {
    if result.met_deadline {
        result.total_cost
    } else {
        result.total_cost.max(on_demand_job_cost)
    }
}
