//! Spot availability traces
//!
//! A trace holds one boolean availability series per region, sampled every
//! `gap_seconds`. Traces come from JSON files or from a seeded synthetic
//! generator that alternates available/unavailable periods with
//! exponentially distributed lengths:
//!
//! ```text
//! up   ~ Exp(1 / mean_up_hours)
//! down ~ Exp(1 / mean_down_hours)
//! ```
//!
//! File format (`1` = preempted / no spot, `0` = spot available):
//!
//! ```json
//! {"metadata": {"gap_seconds": 600}, "data": [0, 0, 1, 0]}
//! {"metadata": {"gap_seconds": 600},
//!  "regions": [{"name": "us-east-1a", "data": [0, 1]}, {"name": "us-west-2b", "data": [1, 0]}]}
//! ```

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Exp};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Result, SimulationError};
use crate::types::RegionId;

/// Availability series of one region
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionTrace {
    pub name: String,
    pub available: Vec<bool>,
}

impl RegionTrace {
    pub fn availability(&self) -> f64 {
        if self.available.is_empty() {
            return 0.0;
        }
        self.available.iter().filter(|&&a| a).count() as f64 / self.available.len() as f64
    }
}

/// Per-region spot availability for one scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpotTrace {
    pub gap_seconds: f64,
    pub regions: Vec<RegionTrace>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct TraceMetadata {
    gap_seconds: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RegionTraceFile {
    #[serde(default)]
    name: Option<String>,
    data: Vec<u8>,
}

#[derive(Debug, Serialize, Deserialize)]
struct TraceFile {
    #[serde(default)]
    metadata: TraceMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    regions: Option<Vec<RegionTraceFile>>,
}

fn decode_series(path: &Path, data: &[u8]) -> Result<Vec<bool>> {
    data.iter()
        .map(|&v| match v {
            0 => Ok(true),
            1 => Ok(false),
            other => Err(SimulationError::trace(
                path,
                format!("expected 0 or 1 in data, found {other}"),
            )),
        })
        .collect()
}

impl SpotTrace {
    /// Same availability in every region for `steps` steps
    pub fn constant(num_regions: usize, steps: usize, gap_seconds: f64, available: bool) -> Self {
        SpotTrace {
            gap_seconds,
            regions: (0..num_regions)
                .map(|i| RegionTrace {
                    name: format!("region-{i}"),
                    available: vec![available; steps],
                })
                .collect(),
        }
    }

    /// Build from explicit per-region series
    pub fn from_series(gap_seconds: f64, series: Vec<Vec<bool>>) -> Self {
        SpotTrace {
            gap_seconds,
            regions: series
                .into_iter()
                .enumerate()
                .map(|(i, available)| RegionTrace {
                    name: format!("region-{i}"),
                    available,
                })
                .collect(),
        }
    }

    pub fn num_regions(&self) -> usize {
        self.regions.len()
    }

    /// Number of steps covered by the longest region series
    pub fn len(&self) -> usize {
        self.regions.iter().map(|r| r.available.len()).max().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Spot availability; steps beyond the end of a series have no spot
    pub fn is_available(&self, region: RegionId, step: usize) -> bool {
        self.regions
            .get(region)
            .and_then(|r| r.available.get(step).copied())
            .unwrap_or(false)
    }

    /// Load one trace file (single- or multi-region)
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let file: TraceFile = serde_json::from_str(&content)
            .map_err(|e| SimulationError::trace(path, e.to_string()))?;

        let gap_seconds = match file.metadata.gap_seconds {
            Some(g) if g.is_finite() && g > 0.0 => g,
            Some(g) => {
                return Err(SimulationError::trace(path, format!("invalid gap_seconds {g}")));
            }
            None => return Err(SimulationError::trace(path, "missing metadata.gap_seconds")),
        };

        let default_name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "region-0".to_string());

        let regions = match (file.data, file.regions) {
            (Some(data), None) => vec![RegionTrace {
                name: default_name,
                available: decode_series(path, &data)?,
            }],
            (None, Some(regions)) if !regions.is_empty() => regions
                .into_iter()
                .enumerate()
                .map(|(i, r)| {
                    Ok(RegionTrace {
                        name: r.name.unwrap_or_else(|| format!("region-{i}")),
                        available: decode_series(path, &r.data)?,
                    })
                })
                .collect::<Result<Vec<_>>>()?,
            (Some(_), Some(_)) => {
                return Err(SimulationError::trace(path, "both data and regions present"));
            }
            _ => return Err(SimulationError::trace(path, "no availability data")),
        };

        Ok(SpotTrace {
            gap_seconds,
            regions,
        })
    }

    /// Load one file per region and stack them in the given order
    pub fn from_files<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        let mut merged: Option<SpotTrace> = None;
        for path in paths {
            let trace = Self::from_file(path)?;
            match merged.as_mut() {
                None => merged = Some(trace),
                Some(m) => {
                    if (m.gap_seconds - trace.gap_seconds).abs() > 1e-9 {
                        return Err(SimulationError::trace(
                            path.as_ref(),
                            format!(
                                "gap_seconds {} differs from {}",
                                trace.gap_seconds, m.gap_seconds
                            ),
                        ));
                    }
                    m.regions.extend(trace.regions);
                }
            }
        }
        merged.ok_or_else(|| SimulationError::config("no trace files given"))
    }

    /// Write in the multi-region file format
    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = TraceFile {
            metadata: TraceMetadata {
                gap_seconds: Some(self.gap_seconds),
            },
            data: None,
            regions: Some(
                self.regions
                    .iter()
                    .map(|r| RegionTraceFile {
                        name: Some(r.name.clone()),
                        data: r.available.iter().map(|&a| if a { 0 } else { 1 }).collect(),
                    })
                    .collect(),
            ),
        };
        std::fs::write(path, serde_json::to_string(&file)?)?;
        Ok(())
    }
}

/// Availability profile of one synthetic region
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegionProfile {
    pub mean_up_hours: f64,
    pub mean_down_hours: f64,
}

impl RegionProfile {
    /// Long-run fraction of time with spot available
    pub fn availability(&self) -> f64 {
        self.mean_up_hours / (self.mean_up_hours + self.mean_down_hours)
    }
}

/// Seeded synthetic trace generator
pub struct TraceGenerator {
    rng: StdRng,
}

impl TraceGenerator {
    pub fn new(seed: u64) -> Self {
        TraceGenerator {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Generate a multi-region trace covering `duration_hours`
    ///
    /// # Arguments
    /// * `profiles` - One availability profile per region
    /// * `duration_hours` - Total time covered by the trace
    /// * `gap_seconds` - Time between samples
    pub fn generate(
        &mut self,
        profiles: &[RegionProfile],
        duration_hours: f64,
        gap_seconds: f64,
    ) -> Result<SpotTrace> {
        if !(gap_seconds > 0.0) {
            return Err(SimulationError::config("gap_seconds must be positive"));
        }
        let steps = (duration_hours * 3600.0 / gap_seconds).ceil() as usize;
        let gap_hours = gap_seconds / 3600.0;

        let mut regions = Vec::with_capacity(profiles.len());
        for (i, profile) in profiles.iter().enumerate() {
            if !(profile.mean_up_hours > 0.0 && profile.mean_down_hours > 0.0) {
                return Err(SimulationError::config(format!(
                    "region {i}: mean up/down hours must be positive"
                )));
            }
            let up = Exp::new(1.0 / profile.mean_up_hours)
                .map_err(|e| SimulationError::config(e.to_string()))?;
            let down = Exp::new(1.0 / profile.mean_down_hours)
                .map_err(|e| SimulationError::config(e.to_string()))?;

            let mut available = Vec::with_capacity(steps);
            let mut is_up = self.rng.gen_bool(profile.availability());
            let mut period_left = 0.0;
            for _ in 0..steps {
                while period_left <= 0.0 {
                    period_left += if is_up {
                        up.sample(&mut self.rng)
                    } else {
                        down.sample(&mut self.rng)
                    };
                    if period_left <= 0.0 {
                        is_up = !is_up;
                    }
                }
                available.push(is_up);
                period_left -= gap_hours;
                if period_left <= 0.0 {
                    is_up = !is_up;
                }
            }

            regions.push(RegionTrace {
                name: format!("region-{i}"),
                available,
            });
        }

        Ok(SpotTrace {
            gap_seconds,
            regions,
        })
    }
}
