//! Error types for the evaluator

use punctual_simulation_engine::SimulationError;
use thiserror::Error;

/// Evaluator result type
pub type Result<T> = std::result::Result<T, EvaluatorError>;

/// Errors that can occur while evaluating a submission
#[derive(Error, Debug)]
pub enum EvaluatorError {
    /// No program or code could be resolved from the submission
    #[error("Artifact format error: {0}")]
    ArtifactFormat(String),

    /// Candidate program failed to load or run
    #[error("Stage {stage} failed: {reason}")]
    StageFailure { stage: u8, reason: String },

    /// Dataset layout problem (missing directory, unreadable scenario file)
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// Simulation engine error
    #[error("Simulation error: {0}")]
    Simulation(#[from] SimulationError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EvaluatorError {
    /// Create an artifact format error
    pub fn artifact(msg: impl Into<String>) -> Self {
        Self::ArtifactFormat(msg.into())
    }

    /// Create a stage failure
    pub fn stage(stage: u8, reason: impl Into<String>) -> Self {
        Self::StageFailure {
            stage,
            reason: reason.into(),
        }
    }

    /// Create a dataset error
    pub fn dataset(msg: impl Into<String>) -> Self {
        Self::Dataset(msg.into())
    }

    /// Whether this error is scored as a failed submission rather than
    /// aborting the evaluation
    pub fn is_candidate_failure(&self) -> bool {
        matches!(self, Self::StageFailure { .. })
    }
}
