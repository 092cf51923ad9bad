//! Job configuration and the policy's tunable surface
//!
//! Every policy variant is a [`PolicyPreset`] over one [`PolicyParams`]
//! struct; there is a single decision policy implementation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{Result, SimulationError};
use crate::estimator::EstimatorKind;
use crate::guard::SafetyMargin;
use crate::types::Job;

const SECONDS_PER_HOUR: f64 = 3600.0;

/// Per-scenario job specification.
///
/// `task_duration_s`, `deadline_s` and `restart_overhead_s` are required;
/// leaving any of them out is a configuration error. `trace_files` (one per
/// region, in region order) defaults to empty and `inter_task_overhead_s`
/// defaults to 0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobConfig {
    pub task_duration_s: Option<f64>,
    pub deadline_s: Option<f64>,
    pub restart_overhead_s: Option<f64>,
    #[serde(default)]
    pub trace_files: Vec<PathBuf>,
    #[serde(default)]
    pub inter_task_overhead_s: f64,
}

impl JobConfig {
    pub fn new(task_duration_s: f64, deadline_s: f64, restart_overhead_s: f64) -> Self {
        JobConfig {
            task_duration_s: Some(task_duration_s),
            deadline_s: Some(deadline_s),
            restart_overhead_s: Some(restart_overhead_s),
            ..Default::default()
        }
    }

    pub fn from_hours(task_duration_h: f64, deadline_h: f64, restart_overhead_h: f64) -> Self {
        Self::new(
            task_duration_h * SECONDS_PER_HOUR,
            deadline_h * SECONDS_PER_HOUR,
            restart_overhead_h * SECONDS_PER_HOUR,
        )
    }

    pub fn with_inter_task_overhead(mut self, seconds: f64) -> Self {
        self.inter_task_overhead_s = seconds;
        self
    }

    /// Load a job config from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Validate and freeze into the immutable per-run [`Job`]
    pub fn job(&self) -> Result<Job> {
        let task_duration_s = require("task_duration_s", self.task_duration_s)?;
        let deadline_s = require("deadline_s", self.deadline_s)?;
        let restart_overhead_s = require("restart_overhead_s", self.restart_overhead_s)?;

        if task_duration_s <= 0.0 {
            return Err(SimulationError::config("task_duration_s must be positive"));
        }
        if deadline_s <= 0.0 {
            return Err(SimulationError::config("deadline_s must be positive"));
        }
        if restart_overhead_s < 0.0 {
            return Err(SimulationError::config("restart_overhead_s must not be negative"));
        }
        if !self.inter_task_overhead_s.is_finite() || self.inter_task_overhead_s < 0.0 {
            return Err(SimulationError::config(
                "inter_task_overhead_s must be a non-negative number",
            ));
        }

        Ok(Job {
            task_duration_s,
            deadline_s,
            restart_overhead_s,
            inter_task_overhead_s: self.inter_task_overhead_s,
        })
    }
}

fn require(name: &str, value: Option<f64>) -> Result<f64> {
    match value {
        Some(v) if v.is_finite() => Ok(v),
        Some(v) => Err(SimulationError::config(format!("{name} is not finite: {v}"))),
        None => Err(SimulationError::config(format!("missing {name}"))),
    }
}

/// Tunables of the deadline-aware policy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyParams {
    /// Safety margin in control steps; must be at least one step
    pub margin_gap_steps: f64,
    /// Fraction of the restart overhead added to the margin
    pub margin_overhead_fraction: f64,
    /// Spot-less idle steps tolerated per region before falling back to on-demand
    pub patience_steps: u32,
    pub estimator: EstimatorKind,
    /// UCB exploration constant
    pub ucb_c: f64,
    pub explore_regions: bool,
}

impl Default for PolicyParams {
    fn default() -> Self {
        PolicyParams {
            margin_gap_steps: 1.0,
            margin_overhead_fraction: 0.5,
            patience_steps: 1,
            estimator: EstimatorKind::Laplace,
            ucb_c: 0.5,
            explore_regions: true,
        }
    }
}

impl PolicyParams {
    pub fn validate(&self) -> Result<()> {
        if !self.margin_gap_steps.is_finite() || self.margin_gap_steps < 1.0 {
            return Err(SimulationError::config(format!(
                "margin_gap_steps must be >= 1 (got {})",
                self.margin_gap_steps
            )));
        }
        if !self.margin_overhead_fraction.is_finite() || self.margin_overhead_fraction < 0.0 {
            return Err(SimulationError::config(
                "margin_overhead_fraction must be non-negative",
            ));
        }
        if !self.ucb_c.is_finite() || self.ucb_c < 0.0 {
            return Err(SimulationError::config("ucb_c must be non-negative"));
        }
        if let EstimatorKind::Ewma { alpha } = self.estimator {
            if !(alpha > 0.0 && alpha <= 1.0) {
                return Err(SimulationError::config(format!(
                    "ewma alpha must be in (0, 1] (got {alpha})"
                )));
            }
        }
        Ok(())
    }

    pub fn safety_margin(&self) -> SafetyMargin {
        SafetyMargin {
            gap_steps: self.margin_gap_steps,
            overhead_fraction: self.margin_overhead_fraction,
        }
    }
}

/// Named parameter sets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyPreset {
    /// One step of margin, one idle probe per region
    #[default]
    Balanced,
    /// Two steps of margin, falls back to on-demand as soon as spot is missing
    Conservative,
    /// Waits longer for spot and explores more
    Patient,
    /// Never leaves the starting region
    SingleRegion,
}

impl PolicyPreset {
    pub const ALL: [PolicyPreset; 4] = [
        PolicyPreset::Balanced,
        PolicyPreset::Conservative,
        PolicyPreset::Patient,
        PolicyPreset::SingleRegion,
    ];

    pub fn params(self) -> PolicyParams {
        let base = PolicyParams::default();
        match self {
            PolicyPreset::Balanced => base,
            PolicyPreset::Conservative => PolicyParams {
                margin_gap_steps: 2.0,
                patience_steps: 0,
                ..base
            },
            PolicyPreset::Patient => PolicyParams {
                patience_steps: 4,
                estimator: EstimatorKind::Ewma { alpha: 0.05 },
                ucb_c: 1.0,
                ..base
            },
            PolicyPreset::SingleRegion => PolicyParams {
                explore_regions: false,
                ..base
            },
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PolicyPreset::Balanced => "balanced",
            PolicyPreset::Conservative => "conservative",
            PolicyPreset::Patient => "patient",
            PolicyPreset::SingleRegion => "single-region",
        }
    }
}

impl fmt::Display for PolicyPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PolicyPreset {
    type Err = SimulationError;

    fn from_str(s: &str) -> Result<Self> {
        PolicyPreset::ALL
            .into_iter()
            .find(|p| p.as_str() == s.trim())
            .ok_or_else(|| SimulationError::UnknownPreset(s.to_string()))
    }
}
