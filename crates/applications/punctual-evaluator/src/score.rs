//! Score normalization
//!
//! Each scenario contributes two anchors: the cost of running the whole job
//! on on-demand, and the same job at spot prices (`on_demand / COST_K`). The
//! anchors and the measured cost are averaged over scenarios weighted by
//! `duration × count`, and the score places the measured cost between them
//! on a 0 to 100 scale.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::pricing::{COST_K, PriceTable};

/// Denominators at or below this are treated as degenerate
const MIN_ANCHOR_SPREAD: f64 = 1e-9;

/// Aggregated results for one scenario
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScenarioStats {
    pub env_path: String,
    /// Task duration in hours
    pub duration: f64,
    /// Traces that ran to completion
    pub count: usize,
    pub failures: usize,
    pub deadline_misses: usize,
    /// Mean job cost over the completed traces
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mean_cost: Option<f64>,
}

impl ScenarioStats {
    pub fn new(env_path: impl Into<String>, duration: f64) -> Self {
        ScenarioStats {
            env_path: env_path.into(),
            duration,
            ..Default::default()
        }
    }

    fn weight(&self) -> f64 {
        self.duration * self.count as f64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreReport {
    pub score: u32,
    pub od_anchor: Option<f64>,
    pub spot_anchor: Option<f64>,
    pub avg_cost: f64,
}

#[derive(Default)]
struct WeightedMean {
    sum: f64,
    weight: f64,
}

impl WeightedMean {
    fn add(&mut self, value: f64, weight: f64) {
        self.sum += value * weight;
        self.weight += weight;
    }

    fn mean(&self) -> Option<f64> {
        (self.weight > 0.0).then(|| self.sum / self.weight)
    }
}

/// Normalized score for a set of scenario results
///
/// Only scenarios whose environment resolves to a price are scored. When none
/// do, `avg_cost` still reports the mean over every completed scenario and
/// the score is zero.
pub fn compute_score(stats: &BTreeMap<String, ScenarioStats>, prices: &PriceTable) -> ScoreReport {
    let mut od = WeightedMean::default();
    let mut spot = WeightedMean::default();
    let mut priced_cost = WeightedMean::default();
    let mut all_cost = WeightedMean::default();

    for s in stats.values() {
        let (Some(mean_cost), true) = (s.mean_cost, s.weight() > 0.0) else {
            continue;
        };
        all_cost.add(mean_cost, s.weight());

        if let Some(price) = prices.resolve_on_demand_price(&s.env_path) {
            let od_job = price * s.duration;
            od.add(od_job, s.weight());
            spot.add(od_job / COST_K, s.weight());
            priced_cost.add(mean_cost, s.weight());
        }
    }

    let od_anchor = od.mean();
    let spot_anchor = spot.mean();
    let avg_cost = priced_cost
        .mean()
        .or_else(|| all_cost.mean())
        .unwrap_or(0.0);

    let score = match (od_anchor, spot_anchor) {
        (Some(od), Some(spot)) => normalize(od, spot, avg_cost),
        _ => 0,
    };

    ScoreReport {
        score,
        od_anchor,
        spot_anchor,
        avg_cost,
    }
}

fn normalize(od_anchor: f64, spot_anchor: f64, avg_cost: f64) -> u32 {
    let spread = od_anchor - spot_anchor;
    if !(spread > MIN_ANCHOR_SPREAD) || !avg_cost.is_finite() {
        return 0;
    }
    let fraction = ((od_anchor - avg_cost) / spread).clamp(0.0, 1.0);
    (100.0 * fraction).round() as u32
}
