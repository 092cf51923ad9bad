//! Candidate program loading
//!
//! A candidate program is a JSON policy document: a preset plus optional
//! parameter overrides.
//!
//! ```json
//! {"name": "my-policy", "preset": "patient", "params": {"ucb_c": 0.8}}
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use punctual_simulation_engine::{PolicyParams, PolicyPreset};

use crate::error::{EvaluatorError, Result};

/// A submitted policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CandidateProgram {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub preset: PolicyPreset,
    /// Field-by-field overrides on top of the preset
    #[serde(default)]
    pub params: serde_json::Map<String, serde_json::Value>,
}

impl CandidateProgram {
    /// Parse and validate; any problem is a stage-1 failure
    pub fn from_source(source: &str) -> Result<Self> {
        let program: CandidateProgram = serde_json::from_str(source)
            .map_err(|e| EvaluatorError::stage(1, format!("invalid program: {e}")))?;
        program.params()?;
        Ok(program)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path).map_err(|e| {
            EvaluatorError::stage(1, format!("cannot read program {}: {e}", path.display()))
        })?;
        Self::from_source(&source)
    }

    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| self.preset.as_str().to_string())
    }

    /// Preset parameters with the overrides applied
    pub fn params(&self) -> Result<PolicyParams> {
        let mut merged = serde_json::to_value(self.preset.params())?;
        if let Some(fields) = merged.as_object_mut() {
            for (key, value) in &self.params {
                if !fields.contains_key(key) {
                    return Err(EvaluatorError::stage(1, format!("unknown parameter {key}")));
                }
                fields.insert(key.clone(), value.clone());
            }
        }

        let params: PolicyParams = serde_json::from_value(merged)
            .map_err(|e| EvaluatorError::stage(1, format!("invalid parameters: {e}")))?;
        params
            .validate()
            .map_err(|e| EvaluatorError::stage(1, e.to_string()))?;
        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use punctual_simulation_engine::EstimatorKind;

    #[test]
    fn test_preset_only() {
        let program = CandidateProgram::from_source(r#"{"preset": "conservative"}"#).unwrap();
        assert_eq!(program.params().unwrap(), PolicyPreset::Conservative.params());
        assert_eq!(program.display_name(), "conservative");
    }

    #[test]
    fn test_empty_document_is_balanced() {
        let program = CandidateProgram::from_source("{}").unwrap();
        assert_eq!(program.params().unwrap(), PolicyParams::default());
    }

    #[test]
    fn test_overrides() {
        let program = CandidateProgram::from_source(
            r#"{"name": "tuned", "preset": "patient",
                "params": {"ucb_c": 0.8, "estimator": {"kind": "laplace"}}}"#,
        )
        .unwrap();
        let params = program.params().unwrap();
        assert_eq!(params.ucb_c, 0.8);
        assert_eq!(params.estimator, EstimatorKind::Laplace);
        assert_eq!(params.patience_steps, PolicyPreset::Patient.params().patience_steps);
        assert_eq!(program.display_name(), "tuned");
    }

    #[test]
    fn test_invalid_programs_fail_stage_one() {
        for source in [
            "def strategy(): pass",
            r#"{"preset": "yolo"}"#,
            r#"{"preset": "balanced", "entry": "main"}"#,
            r#"{"params": {"margin_gap_steps": 0.1}}"#,
            r#"{"params": {"temperature": 2}}"#,
            r#"{"params": {"patience_steps": "many"}}"#,
        ] {
            let err = CandidateProgram::from_source(source).unwrap_err();
            assert!(
                matches!(err, EvaluatorError::StageFailure { stage: 1, .. }),
                "{source}: {err}"
            );
        }
    }
}
