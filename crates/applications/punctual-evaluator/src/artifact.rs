//! Submission artifact resolution
//!
//! A submission arrives as a file whose content is one of:
//!
//! ```text
//! {"program_path": "<path>"}   → that program
//! {"code": "<source>"}         → source materialized into the work dir
//! <existing path>              → that program
//! <anything else>              → bare source, materialized into the work dir
//! ```
//!
//! All forms normalize to a single program path.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{EvaluatorError, Result};

/// File name used for materialized source
pub const MATERIALIZED_PROGRAM: &str = "candidate_program.json";

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Envelope {
    Path { program_path: String },
    Code { code: String },
}

/// Normalize a submission file into a program path
pub fn resolve_submission(submission: &Path, work_dir: &Path) -> Result<PathBuf> {
    if !submission.is_file() {
        return Err(EvaluatorError::artifact(format!(
            "submission {} is not a readable file",
            submission.display()
        )));
    }

    let content = fs::read_to_string(submission)
        .map_err(|e| EvaluatorError::artifact(format!("cannot read submission: {e}")))?;
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(EvaluatorError::artifact("submission is empty"));
    }
    let base_dir = submission.parent().unwrap_or_else(|| Path::new("."));

    if let Ok(envelope) = serde_json::from_str::<Envelope>(trimmed) {
        return match envelope {
            Envelope::Path { program_path } => existing_path(&program_path, base_dir)
                .ok_or_else(|| {
                    EvaluatorError::artifact(format!("program_path {program_path} does not exist"))
                }),
            Envelope::Code { code } if code.trim().is_empty() => {
                Err(EvaluatorError::artifact("code field is empty"))
            }
            Envelope::Code { code } => materialize(&code, work_dir),
        };
    }

    if !trimmed.contains('\n') {
        if let Some(path) = existing_path(trimmed, base_dir) {
            debug!(path = %path.display(), "submission is a bare path");
            return Ok(path);
        }
    }

    debug!("treating submission as bare source");
    materialize(trimmed, work_dir)
}

fn existing_path(raw: &str, base_dir: &Path) -> Option<PathBuf> {
    let raw = Path::new(raw.trim());
    [raw.to_path_buf(), base_dir.join(raw)]
        .into_iter()
        .find(|p| p.is_file())
}

fn materialize(code: &str, work_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(work_dir)?;
    let path = work_dir.join(MATERIALIZED_PROGRAM);
    fs::write(&path, code)?;
    debug!(path = %path.display(), bytes = code.len(), "materialized candidate source");
    Ok(path)
}
