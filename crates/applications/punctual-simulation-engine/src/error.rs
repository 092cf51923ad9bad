//! Error types for the simulation engine

use std::path::PathBuf;
use thiserror::Error;

/// Simulation engine result type
pub type Result<T> = std::result::Result<T, SimulationError>;

/// Errors that can occur while configuring or running a scenario
#[derive(Error, Debug)]
pub enum SimulationError {
    /// Malformed job config or policy parameters; the scenario cannot run
    #[error("Configuration error: {0}")]
    Config(String),

    /// Trace file could not be interpreted
    #[error("Invalid trace {path}: {reason}")]
    Trace { path: PathBuf, reason: String },

    /// Unknown policy preset name
    #[error("Unknown policy preset: {0}")]
    UnknownPreset(String),

    /// Region index outside the environment
    #[error("Region {region} out of range ({num_regions} regions)")]
    RegionOutOfRange { region: usize, num_regions: usize },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SimulationError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a trace error for a given file
    pub fn trace(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Trace {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
