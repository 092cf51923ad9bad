//! Punctual Simulation Engine CLI
//!
//! Command-line interface for comparing deadline-aware spot policies on
//! recorded or synthetic availability traces

use anyhow::{bail, Context};
use clap::Parser;
use std::fs;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use punctual_simulation_engine::{
    configure, Environment, GreedySpotPolicy, JobConfig, OnDemandOnlyPolicy, PolicyPreset,
    Pricing, RegionProfile, SimulationResult, Simulator, SpotTrace, Strategy, TraceEnvironment,
    TraceGenerator,
};

#[derive(Parser, Debug)]
#[command(name = "punctual-sim")]
#[command(about = "Simulate deadline-aware spot/on-demand policies", long_about = None)]
struct Args {
    /// Work to complete, in hours
    #[arg(long, default_value_t = 48.0)]
    task_hours: f64,

    /// Deadline, in hours from the start
    #[arg(long, default_value_t = 52.0)]
    deadline_hours: f64,

    /// Restart overhead on mode or region change, in hours
    #[arg(long, default_value_t = 0.02)]
    overhead_hours: f64,

    /// Job config JSON file (overrides the three options above)
    #[arg(long)]
    job_config: Option<PathBuf>,

    /// Trace files, one per region (synthetic traces are generated if omitted)
    #[arg(long, num_args = 1..)]
    trace: Vec<PathBuf>,

    /// Number of synthetic regions
    #[arg(long, default_value_t = 1)]
    regions: usize,

    /// Control step length for synthetic traces, in seconds
    #[arg(long, default_value_t = 600.0)]
    gap_seconds: f64,

    /// Mean length of a spot-available period in the best region, in hours
    #[arg(long, default_value_t = 3.0)]
    mean_up_hours: f64,

    /// Mean length of a spot outage, in hours
    #[arg(long, default_value_t = 1.0)]
    mean_down_hours: f64,

    /// Seed for synthetic traces
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Policies to compare (comma-separated: deadline,greedy,ondemand)
    #[arg(short, long, default_value = "deadline,greedy,ondemand")]
    policies: String,

    /// Preset for the deadline-aware policy
    #[arg(long, default_value = "balanced")]
    preset: PolicyPreset,

    /// On-demand instance price ($/hr)
    #[arg(long, default_value_t = 3.06)]
    on_demand_price: f64,

    /// Spot instance price ($/hr)
    #[arg(long, default_value_t = 1.02)]
    spot_price: f64,

    /// Write a synthetic trace to this file and exit
    #[arg(long)]
    save_trace: Option<PathBuf>,

    /// Output JSON file path (optional)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn load_trace(args: &Args, job_config: &JobConfig) -> anyhow::Result<SpotTrace> {
    let files = if args.trace.is_empty() {
        &job_config.trace_files
    } else {
        &args.trace
    };
    if !files.is_empty() {
        return SpotTrace::from_files(files).context("loading trace files");
    }

    // Later regions are progressively less available
    let profiles: Vec<RegionProfile> = (0..args.regions.max(1))
        .map(|i| RegionProfile {
            mean_up_hours: args.mean_up_hours / (i as f64 + 1.0),
            mean_down_hours: args.mean_down_hours,
        })
        .collect();
    let hours = job_config
        .deadline_s
        .map_or(args.deadline_hours, |d| d / 3600.0);
    Ok(TraceGenerator::new(args.seed).generate(&profiles, hours, args.gap_seconds)?)
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

    let job_config = match &args.job_config {
        Some(path) => JobConfig::from_file(path)
            .with_context(|| format!("reading job config {}", path.display()))?,
        None => JobConfig::from_hours(args.task_hours, args.deadline_hours, args.overhead_hours),
    };
    let job = job_config.job()?;
    let trace = load_trace(&args, &job_config)?;

    if let Some(path) = &args.save_trace {
        trace.to_file(path)?;
        info!(path = %path.display(), steps = trace.len(), "trace written");
        return Ok(());
    }

    let pricing = Pricing {
        on_demand_per_hour: args.on_demand_price,
        spot_per_hour: args.spot_price,
    };

    println!("╔══════════════════════════════════════════════════════════╗");
    println!("║  Punctual Simulation Engine                              ║");
    println!("╚══════════════════════════════════════════════════════════╝\n");

    println!("Configuration:");
    println!("  Task: {:.2} hours", job.task_duration_s / 3600.0);
    println!("  Deadline: {:.2} hours", job.deadline_s / 3600.0);
    println!("  Restart overhead: {:.3} hours", job.restart_overhead_s / 3600.0);
    println!("  Regions: {}", trace.num_regions());
    for region in &trace.regions {
        println!("    {:<16} spot {:>5.1}%", region.name, region.availability() * 100.0);
    }
    println!("  On-demand price: ${:.2}/hr", pricing.on_demand_per_hour);
    println!("  Spot price: ${:.2}/hr\n", pricing.spot_per_hour);

    let mut results: Vec<SimulationResult> = Vec::new();

    for policy_name in args.policies.split(',').map(str::trim) {
        let env = TraceEnvironment::new(job, trace.clone(), pricing)?;

        let policy: Box<dyn Strategy> = match policy_name {
            "deadline" => Box::new(configure(&job_config, args.preset.params(), env.caps())?),
            "greedy" => Box::new(GreedySpotPolicy::new()),
            "ondemand" => Box::new(OnDemandOnlyPolicy::new()),
            other => bail!("Unknown policy: {other}"),
        };

        info!(policy = policy_name, "running simulation");
        let result = Simulator::new(policy, Box::new(env)).run()?;
        results.push(result);
    }

    println!("╔══════════════════════════════════════════════════════════╗");
    println!("║  Simulation Results                                      ║");
    println!("╚══════════════════════════════════════════════════════════╝\n");

    println!(
        "{:<16} {:>10} {:>10} {:>8} {:>8} {:>8} {:>9} {:>10}",
        "Policy", "Cost ($)", "Finish(h)", "Spot", "OnDem", "Idle", "Switches", "Deadline"
    );
    println!("{}", "-".repeat(86));

    for result in &results {
        let finish = result
            .finish_time_hours
            .map_or("-".to_string(), |h| format!("{h:.2}"));
        println!(
            "{:<16} {:>10.2} {:>10} {:>8} {:>8} {:>8} {:>9} {:>10}",
            result.policy_name,
            result.total_cost,
            finish,
            result.spot_steps,
            result.on_demand_steps,
            result.idle_steps,
            result.region_switches,
            if result.met_deadline { "met" } else { "MISSED" },
        );
    }

    if let Some(baseline) = results.iter().find(|r| r.policy_name == "OnDemandOnly") {
        if results.len() > 1 && baseline.total_cost > 0.0 {
            println!("\n{}", "-".repeat(86));
            println!("Cost Savings vs {} baseline:", baseline.policy_name);
            for result in results.iter().filter(|r| r.policy_name != baseline.policy_name) {
                let savings = baseline.total_cost - result.total_cost;
                println!(
                    "  {:<18} ${:>8.2} ({:>5.1}%)",
                    result.policy_name,
                    savings,
                    savings / baseline.total_cost * 100.0
                );
            }
        }
    }

    if let Some(output_path) = &args.output {
        let json = serde_json::to_string_pretty(&results)?;
        fs::write(output_path, json)
            .with_context(|| format!("writing {}", output_path.display()))?;
        println!("\nResults saved to {}", output_path.display());
    }

    Ok(())
}
