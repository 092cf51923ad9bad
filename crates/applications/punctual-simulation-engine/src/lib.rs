//! Punctual Simulation Engine
//!
//! Online policy for finishing a fixed amount of work before a hard deadline
//! at minimum cost, choosing every control step between cheap preemptible
//! spot capacity and reliable on-demand capacity, optionally across regions.
//!
//! ## Architecture
//!
//! ```text
//! Simulator
//! ├── Environment (trace replay)  ── clock, has_spot, overhead, work
//! └── Strategy
//!     └── DecisionPolicy
//!         ├── ClockState arithmetic (slack)
//!         ├── CommitGuard (one-way on-demand latch)
//!         └── RegionAvailabilityEstimator (UCB probing)
//! ```
//!
//! Each scenario owns its own policy instance built by [`configure`]; no
//! state is shared between scenarios, so scenarios can run in parallel.

#![warn(clippy::all)]

pub mod clock;
pub mod config;
pub mod environment;
pub mod error;
pub mod estimator;
pub mod guard;
pub mod policies;
pub mod simulator;
pub mod spot_data;
pub mod types;

pub use clock::ClockState;
pub use config::{JobConfig, PolicyParams, PolicyPreset};
pub use environment::{Environment, EnvironmentCaps, Pricing, StepOutcome, TraceEnvironment};
pub use error::{Result, SimulationError};
pub use estimator::{EstimatorKind, RegionAvailabilityEstimator, RegionStats};
pub use guard::{CommitGuard, SafetyMargin};
pub use policies::{
    configure, DecisionPolicy, GreedySpotPolicy, OnDemandOnlyPolicy, PolicyPhase, Strategy,
};
pub use simulator::{run_scenario, SimulationResult, Simulator, StepRecord};
pub use spot_data::{RegionProfile, SpotTrace, TraceGenerator};
pub use types::{Action, Decision, Job, RegionId};
