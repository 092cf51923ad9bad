//! Online per-region spot availability estimates and UCB region probing
//!
//! Observations are region-local: only the active region's `has_spot` is
//! visible each step. Estimates start from an uninformed prior of 0.5 and are
//! updated with either a Laplace-smoothed Beta-Bernoulli mean or an EWMA.
//!
//! When the active region has no spot, the region to probe next is chosen by
//! a UCB1-style score:
//!
//! ```text
//! score(r) = estimate(r) + c · sqrt( ln(total_obs + 1) / (obs(r) + 1) )
//! ```
//!
//! Ties go to the region probed least recently (never-probed first), then to
//! the lowest index, so probing is deterministic for a given trace.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::RegionId;

/// Estimate before any observation
pub const PRIOR_ESTIMATE: f64 = 0.5;

/// Ties closer than this are broken by recency
const SCORE_TIE_EPSILON: f64 = 1e-12;

/// Smoothing family for per-region estimates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EstimatorKind {
    /// `(hits + 1) / (observations + 2)`
    #[default]
    Laplace,
    /// `p ← (1 − α)·p + α·x`, starting from the prior
    Ewma { alpha: f64 },
}

/// Per-region statistics, created on the region's first observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionStats {
    pub observations: u64,
    pub spot_hits: u64,
    /// Smoothed availability estimate in [0, 1]
    pub estimate: f64,
    /// Estimator step of the most recent observation with spot
    pub last_spot_step: Option<u64>,
    /// Estimator step of the most recent observation
    pub last_observed_step: u64,
}

/// Region availability estimator owned by one policy instance
#[derive(Debug, Clone)]
pub struct RegionAvailabilityEstimator {
    num_regions: usize,
    kind: EstimatorKind,
    ucb_c: f64,
    stats: BTreeMap<RegionId, RegionStats>,
    total_observations: u64,
}

impl RegionAvailabilityEstimator {
    pub fn new(num_regions: usize, kind: EstimatorKind, ucb_c: f64) -> Self {
        RegionAvailabilityEstimator {
            num_regions: num_regions.max(1),
            kind,
            ucb_c,
            stats: BTreeMap::new(),
            total_observations: 0,
        }
    }

    pub fn num_regions(&self) -> usize {
        self.num_regions
    }

    pub fn total_observations(&self) -> u64 {
        self.total_observations
    }

    pub fn stats(&self, region: RegionId) -> Option<&RegionStats> {
        self.stats.get(&region)
    }

    pub fn observations(&self, region: RegionId) -> u64 {
        self.stats.get(&region).map_or(0, |s| s.observations)
    }

    pub fn estimate(&self, region: RegionId) -> f64 {
        self.stats.get(&region).map_or(PRIOR_ESTIMATE, |s| s.estimate)
    }

    /// Record one region-local observation
    pub fn observe(&mut self, region: RegionId, has_spot: bool) {
        self.total_observations += 1;
        let step = self.total_observations;
        let kind = self.kind;

        let stats = self.stats.entry(region).or_insert(RegionStats {
            observations: 0,
            spot_hits: 0,
            estimate: PRIOR_ESTIMATE,
            last_spot_step: None,
            last_observed_step: step,
        });

        stats.observations += 1;
        stats.last_observed_step = step;
        if has_spot {
            stats.spot_hits += 1;
            stats.last_spot_step = Some(step);
        }

        let x = if has_spot { 1.0 } else { 0.0 };
        stats.estimate = match kind {
            EstimatorKind::Laplace => {
                (stats.spot_hits as f64 + 1.0) / (stats.observations as f64 + 2.0)
            }
            EstimatorKind::Ewma { alpha } => (1.0 - alpha) * stats.estimate + alpha * x,
        }
        .clamp(0.0, 1.0);
    }

    /// UCB1 score of a region given the total observation count
    pub fn ucb_score(&self, region: RegionId, total_obs: u64) -> f64 {
        let n = self.observations(region) as f64;
        let bonus = ((total_obs as f64 + 1.0).ln() / (n + 1.0)).sqrt();
        self.estimate(region) + self.ucb_c * bonus
    }

    /// Region to try next while the active one has no spot.
    ///
    /// Excludes `current` unless it is the only region; `None` when there is
    /// nothing to switch to.
    pub fn best_region_to_probe(&self, current: RegionId, total_obs: u64) -> Option<RegionId> {
        if self.num_regions == 1 {
            return None;
        }

        let mut best: Option<(RegionId, f64, u64)> = None;
        for region in (0..self.num_regions).filter(|&r| r != current) {
            let score = self.ucb_score(region, total_obs);
            // 0 sorts never-probed regions first
            let recency = self.stats.get(&region).map_or(0, |s| s.last_observed_step);

            let better = match best {
                None => true,
                Some((_, best_score, best_recency)) => {
                    if (score - best_score).abs() <= SCORE_TIE_EPSILON {
                        recency < best_recency
                    } else {
                        score > best_score
                    }
                }
            };
            if better {
                best = Some((region, score, recency));
            }
        }

        best.map(|(region, _, _)| region)
    }
}
