//! Punctual Evaluator CLI
//!
//! Prints exactly one JSON payload on stdout; logs go to stderr.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use punctual_evaluator::{evaluate, EvaluationPayload, EvaluatorOptions, PriceTable};

#[derive(Parser, Debug)]
#[command(name = "punctual-eval")]
#[command(about = "Score a deadline-aware spot policy submission", long_about = None)]
struct Args {
    /// Submission file: a program, a path to one, or a JSON envelope
    submission: PathBuf,

    /// Dataset directory with one sub-directory of traces per environment
    #[arg(long, default_value = "data/real")]
    dataset: PathBuf,

    /// Scenario list JSON (defaults to the built-in job matrix)
    #[arg(long)]
    scenarios: Option<PathBuf>,

    /// Device price table JSON ({"v100": 3.06, ...})
    #[arg(long)]
    prices: Option<PathBuf>,

    /// Directory for materialized programs
    #[arg(long, default_value = "eval_work")]
    work_dir: PathBuf,

    /// Also write the payload to this file
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn run(args: &Args) -> anyhow::Result<EvaluationPayload> {
    let mut options = EvaluatorOptions::new(&args.dataset, &args.work_dir);
    if let Some(path) = &args.scenarios {
        options = options.with_scenarios_file(path);
    }
    if let Some(path) = &args.prices {
        let prices = PriceTable::from_file(path)
            .with_context(|| format!("reading price table {}", path.display()))?;
        options = options.with_prices(prices);
    }
    Ok(evaluate(&args.submission, &options)?)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "punctual=info,info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let outcome = run(&args);
    let payload = match &outcome {
        Ok(payload) => payload.clone(),
        Err(e) => {
            error!(error = %format!("{e:#}"), "evaluation failed");
            EvaluationPayload::failed(format!("{e:#}"))
        }
    };

    let json = serde_json::to_string_pretty(&payload)?;
    println!("{json}");
    if let Some(path) = &args.output {
        std::fs::write(path, &json)
            .with_context(|| format!("writing payload to {}", path.display()))?;
    }

    outcome.map(|_| ())
}
