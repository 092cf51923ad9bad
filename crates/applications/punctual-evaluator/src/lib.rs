//! Punctual Evaluator
//!
//! Scores a submitted policy program against a dataset of spot availability
//! traces. The submission is resolved to a program file, smoke-tested
//! (stage 1), then swept over every scenario (stage 2). The result is a
//! single JSON payload with the normalized score.

#![warn(clippy::all)]

pub mod artifact;
pub mod dataset;
pub mod error;
pub mod pricing;
pub mod program;
pub mod score;
pub mod stages;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub use artifact::resolve_submission;
pub use dataset::{Scenario, ScenarioFile};
pub use error::{EvaluatorError, Result};
pub use pricing::{PriceTable, COST_K};
pub use program::CandidateProgram;
pub use score::{compute_score, ScenarioStats, ScoreReport};

/// Where to find the dataset and where to put intermediate files
#[derive(Debug, Clone)]
pub struct EvaluatorOptions {
    pub dataset_dir: PathBuf,
    /// Explicit scenario list; the default job matrix is used when absent
    pub scenarios_file: Option<PathBuf>,
    pub prices: PriceTable,
    pub work_dir: PathBuf,
}

impl EvaluatorOptions {
    pub fn new(dataset_dir: impl Into<PathBuf>, work_dir: impl Into<PathBuf>) -> Self {
        EvaluatorOptions {
            dataset_dir: dataset_dir.into(),
            scenarios_file: None,
            prices: PriceTable::default(),
            work_dir: work_dir.into(),
        }
    }

    pub fn with_scenarios_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.scenarios_file = Some(path.into());
        self
    }

    pub fn with_prices(mut self, prices: PriceTable) -> Self {
        self.prices = prices;
        self
    }

    fn scenarios(&self) -> Result<Vec<Scenario>> {
        dataset::ensure_dataset(&self.dataset_dir)?;
        match &self.scenarios_file {
            Some(path) => ScenarioFile::load(path),
            None => dataset::default_scenarios(&self.dataset_dir),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub avg_cost: f64,
    pub od_anchor: Option<f64>,
    pub spot_anchor: Option<f64>,
    pub scenarios: usize,
    pub traces_run: usize,
    pub failures: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Artifacts {
    /// Scenario name → stats, serialized as a JSON string
    pub scenario_stats_json: String,
    pub program_path: Option<PathBuf>,
}

/// Final evaluation result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationPayload {
    pub score: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub program: Option<String>,
    pub metrics: Metrics,
    pub artifacts: Artifacts,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EvaluationPayload {
    /// Zero-score payload for a failed submission
    pub fn failed(error: impl ToString) -> Self {
        EvaluationPayload {
            error: Some(error.to_string()),
            ..Default::default()
        }
    }
}

/// Run both stages for one submission
///
/// Candidate failures come back as a zero-score payload. Artifact and
/// dataset problems are returned as errors.
pub fn evaluate(submission: &Path, options: &EvaluatorOptions) -> Result<EvaluationPayload> {
    std::fs::create_dir_all(&options.work_dir)?;
    let program_path = resolve_submission(submission, &options.work_dir)?;
    info!(program = %program_path.display(), "resolved submission");

    let (program, params) = match stages::smoke_test(&program_path) {
        Ok(loaded) => loaded,
        Err(e) if e.is_candidate_failure() => {
            warn!(error = %e, "candidate rejected");
            let mut payload = EvaluationPayload::failed(e);
            payload.artifacts.program_path = Some(program_path);
            return Ok(payload);
        }
        Err(e) => return Err(e),
    };

    let scenarios = options.scenarios()?;
    info!(count = scenarios.len(), "running scenarios");
    let report = stages::sweep(&params, &scenarios, &options.dataset_dir, &options.prices);

    Ok(EvaluationPayload {
        score: report.score.score,
        program: Some(program.display_name()),
        metrics: Metrics {
            avg_cost: report.score.avg_cost,
            od_anchor: report.score.od_anchor,
            spot_anchor: report.score.spot_anchor,
            scenarios: report.scenarios.len(),
            traces_run: report.traces_run,
            failures: report.failures,
        },
        artifacts: Artifacts {
            scenario_stats_json: serde_json::to_string(&report.scenarios)?,
            program_path: Some(program_path),
        },
        error: None,
    })
}
