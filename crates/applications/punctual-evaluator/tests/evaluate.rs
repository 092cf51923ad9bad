//! End-to-end evaluation over a small on-disk dataset

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use punctual_evaluator::{evaluate, EvaluatorError, EvaluatorOptions, ScenarioStats};
use punctual_simulation_engine::{RegionProfile, TraceGenerator};

/// Two environments with three traces each, long enough for the default jobs
fn build_dataset(root: &Path) {
    let profile = [RegionProfile {
        mean_up_hours: 6.0,
        mean_down_hours: 1.0,
    }];
    let mut generator = TraceGenerator::new(42);
    for env in ["us-west-2a_v100_1", "us-east-1a_k80_1"] {
        let env_dir = root.join(env);
        fs::create_dir_all(&env_dir).unwrap();
        for i in 0..3 {
            let trace = generator.generate(&profile, 80.0, 600.0).unwrap();
            trace.to_file(env_dir.join(format!("trace_{i}.json"))).unwrap();
        }
    }
}

fn submit(dir: &Path, content: &str) -> std::path::PathBuf {
    let path = dir.join("submission.txt");
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_full_evaluation_scores_between_anchors() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = dir.path().join("data");
    build_dataset(&dataset);
    let submission = submit(dir.path(), r#"{"code": "{\"preset\": \"balanced\"}"}"#);

    let options = EvaluatorOptions::new(&dataset, dir.path().join("work"));
    let payload = evaluate(&submission, &options).unwrap();

    assert!(payload.error.is_none());
    assert_eq!(payload.program.as_deref(), Some("balanced"));
    assert_eq!(payload.metrics.scenarios, 4);
    assert_eq!(payload.metrics.traces_run, 12);
    assert_eq!(payload.metrics.failures, 0);
    assert!(payload.score > 0 && payload.score <= 100);

    let od = payload.metrics.od_anchor.unwrap();
    let spot = payload.metrics.spot_anchor.unwrap();
    assert!((od / spot - 3.0).abs() < 1e-9);
    assert!(payload.metrics.avg_cost < od);

    let stats: BTreeMap<String, ScenarioStats> =
        serde_json::from_str(&payload.artifacts.scenario_stats_json).unwrap();
    let tight = &stats["us-west-2a_v100_1_tight"];
    assert_eq!(tight.env_path, "us-west-2a_v100_1");
    assert_eq!(tight.duration, 48.0);
    assert_eq!(tight.count, 3);
    assert_eq!(tight.deadline_misses, 0);
}

#[test]
fn test_bad_program_scores_zero() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = dir.path().join("data");
    build_dataset(&dataset);
    let submission = submit(dir.path(), r#"{"preset": "balanced", "params": {"speed": 11}}"#);

    let options = EvaluatorOptions::new(&dataset, dir.path().join("work"));
    let payload = evaluate(&submission, &options).unwrap();

    assert_eq!(payload.score, 0);
    assert!(payload.error.unwrap().contains("speed"));
}

#[test]
fn test_missing_dataset_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let submission = submit(dir.path(), r#"{"preset": "patient"}"#);

    let options = EvaluatorOptions::new(dir.path().join("nowhere"), dir.path().join("work"));
    assert!(matches!(
        evaluate(&submission, &options),
        Err(EvaluatorError::Dataset(_))
    ));
}

#[test]
fn test_unresolvable_submission_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = dir.path().join("data");
    build_dataset(&dataset);
    let submission = submit(dir.path(), r#"{"program_path": "missing.json"}"#);

    let options = EvaluatorOptions::new(&dataset, dir.path().join("work"));
    assert!(matches!(
        evaluate(&submission, &options),
        Err(EvaluatorError::ArtifactFormat(_))
    ));
}

#[test]
fn test_scenario_file_limits_traces() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = dir.path().join("data");
    build_dataset(&dataset);
    let scenarios = dir.path().join("scenarios.json");
    fs::write(
        &scenarios,
        r#"{"scenarios": [
            {"name": "short", "env_path": "us-east-1a_k80_1", "task_duration_hours": 8,
             "deadline_hours": 12, "restart_overhead_hours": 0.05, "max_traces": 2}
        ]}"#,
    )
    .unwrap();
    let program = dir.path().join("policy.json");
    fs::write(&program, r#"{"name": "mine", "preset": "conservative"}"#).unwrap();
    let submission = submit(dir.path(), program.to_str().unwrap());

    let options =
        EvaluatorOptions::new(&dataset, dir.path().join("work")).with_scenarios_file(&scenarios);
    let payload = evaluate(&submission, &options).unwrap();

    assert_eq!(payload.program.as_deref(), Some("mine"));
    assert_eq!(payload.metrics.scenarios, 1);
    assert_eq!(payload.metrics.traces_run, 2);
    assert_eq!(payload.artifacts.program_path.as_deref(), Some(program.as_path()));
}
