//! Scenario definitions and trace discovery
//!
//! A dataset directory holds one sub-directory per environment, named
//! `<region>_<device>_<count>`, each containing JSON trace files. Scenarios
//! pair an environment with a job; they come from a scenario file or, by
//! default, from a fixed job matrix applied to every environment.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use punctual_simulation_engine::JobConfig;

use crate::error::{EvaluatorError, Result};

/// Default job matrix: (suffix, task hours, deadline hours, restart overhead hours)
const DEFAULT_JOBS: [(&str, f64, f64, f64); 2] = [
    ("tight", 48.0, 52.0, 0.02),
    ("loose", 48.0, 70.0, 0.02),
];

/// One environment × job combination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    /// Environment directory (or single trace file), relative to the dataset
    pub env_path: PathBuf,
    pub task_duration_hours: f64,
    pub deadline_hours: f64,
    pub restart_overhead_hours: f64,
    /// Cap on the number of traces run for this scenario
    #[serde(default)]
    pub max_traces: Option<usize>,
}

impl Scenario {
    pub fn job_config(&self) -> JobConfig {
        JobConfig::from_hours(
            self.task_duration_hours,
            self.deadline_hours,
            self.restart_overhead_hours,
        )
    }

    /// Sorted trace files for this scenario
    pub fn trace_files(&self, dataset_dir: &Path) -> Result<Vec<PathBuf>> {
        let env_path = self.resolved_env_path(dataset_dir);
        let mut files = if env_path.is_file() {
            vec![env_path]
        } else if env_path.is_dir() {
            let mut files = Vec::new();
            for entry in fs::read_dir(&env_path)? {
                let path = entry?.path();
                if path.is_file() && path.extension().is_some_and(|e| e == "json") {
                    files.push(path);
                }
            }
            files.sort();
            files
        } else {
            return Err(EvaluatorError::dataset(format!(
                "scenario {}: {} does not exist",
                self.name,
                env_path.display()
            )));
        };

        if let Some(max) = self.max_traces {
            files.truncate(max);
        }
        Ok(files)
    }

    pub fn resolved_env_path(&self, dataset_dir: &Path) -> PathBuf {
        if self.env_path.is_absolute() {
            self.env_path.clone()
        } else {
            dataset_dir.join(&self.env_path)
        }
    }
}

/// Scenario file: `{"scenarios": [...]}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioFile {
    pub scenarios: Vec<Scenario>,
}

impl ScenarioFile {
    pub fn load(path: &Path) -> Result<Vec<Scenario>> {
        let content = fs::read_to_string(path).map_err(|e| {
            EvaluatorError::dataset(format!("cannot read scenario file {}: {e}", path.display()))
        })?;
        let file: ScenarioFile = serde_json::from_str(&content)?;
        Ok(file.scenarios)
    }
}

/// Fail hard if the dataset directory itself is missing
pub fn ensure_dataset(dataset_dir: &Path) -> Result<()> {
    if dataset_dir.is_dir() {
        Ok(())
    } else {
        Err(EvaluatorError::dataset(format!(
            "dataset directory {} not found",
            dataset_dir.display()
        )))
    }
}

/// Default job matrix over every environment directory in the dataset
pub fn default_scenarios(dataset_dir: &Path) -> Result<Vec<Scenario>> {
    ensure_dataset(dataset_dir)?;

    let mut envs: Vec<String> = fs::read_dir(dataset_dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_dir())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    envs.sort();

    Ok(envs
        .iter()
        .flat_map(|env| {
            DEFAULT_JOBS
                .iter()
                .map(move |&(suffix, task, deadline, overhead)| Scenario {
                    name: format!("{env}_{suffix}"),
                    env_path: PathBuf::from(env),
                    task_duration_hours: task,
                    deadline_hours: deadline,
                    restart_overhead_hours: overhead,
                    max_traces: None,
                })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for env in ["us-west-2a_v100_1", "us-east-1a_k80_1"] {
            let env_dir = dir.path().join(env);
            fs::create_dir(&env_dir).unwrap();
            for i in 0..3 {
                fs::write(env_dir.join(format!("trace_{i}.json")), "{}").unwrap();
            }
            fs::write(env_dir.join("README"), "not a trace").unwrap();
        }
        dir
    }

    #[test]
    fn test_default_scenarios() {
        let dir = dataset();
        let scenarios = default_scenarios(dir.path()).unwrap();
        let names: Vec<&str> = scenarios.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "us-east-1a_k80_1_tight",
                "us-east-1a_k80_1_loose",
                "us-west-2a_v100_1_tight",
                "us-west-2a_v100_1_loose",
            ]
        );
    }

    #[test]
    fn test_trace_discovery_sorted_and_capped() {
        let dir = dataset();
        let mut scenario = default_scenarios(dir.path()).unwrap().remove(0);

        let files = scenario.trace_files(dir.path()).unwrap();
        assert_eq!(files.len(), 3);
        assert!(files[0].ends_with("trace_0.json"));

        scenario.max_traces = Some(2);
        assert_eq!(scenario.trace_files(dir.path()).unwrap().len(), 2);
    }

    #[test]
    fn test_missing_env_is_scenario_error() {
        let dir = dataset();
        let scenario = Scenario {
            name: "ghost".into(),
            env_path: "us-central1_a100_1".into(),
            task_duration_hours: 1.0,
            deadline_hours: 2.0,
            restart_overhead_hours: 0.1,
            max_traces: None,
        };
        assert!(scenario.trace_files(dir.path()).is_err());
    }

    #[test]
    fn test_missing_dataset_is_hard_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nowhere");
        assert!(matches!(default_scenarios(&missing), Err(EvaluatorError::Dataset(_))));
    }

    #[test]
    fn test_scenario_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scenarios.json");
        fs::write(
            &path,
            r#"{"scenarios": [{"name": "a", "env_path": "x_v100_1",
                "task_duration_hours": 10, "deadline_hours": 12,
                "restart_overhead_hours": 0.1, "max_traces": 5}]}"#,
        )
        .unwrap();
        let scenarios = ScenarioFile::load(&path).unwrap();
        assert_eq!(scenarios.len(), 1);
        assert_eq!(scenarios[0].max_traces, Some(5));
        assert_eq!(scenarios[0].job_config().job().unwrap().deadline_s, 12.0 * 3600.0);
    }
}
