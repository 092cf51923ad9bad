//! On-demand price anchors per scenario
//!
//! Environment directories are named `<region>_<device>_<count>` (for example
//! `us-west-2a_v100_8`). The on-demand price of a scenario is the device's
//! hourly price times the instance count; when the name does not follow that
//! shape, the first known device name found in the environment's own name is
//! used with a count of one. Parent directories are never searched.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{EvaluatorError, Result};

/// Ratio between on-demand and spot prices used for the spot anchor
pub const COST_K: f64 = 3.0;

/// Device → hourly on-demand price (USD) for one accelerator instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceTable {
    devices: BTreeMap<String, f64>,
}

impl Default for PriceTable {
    fn default() -> Self {
        let devices = [
            ("k80", 0.90),
            ("t4", 0.526),
            ("v100", 3.06),
            ("a10g", 1.006),
            ("l4", 0.805),
            ("a100", 4.096),
            ("h100", 12.29),
        ]
        .into_iter()
        .map(|(device, price)| (device.to_string(), price))
        .collect();
        PriceTable { devices }
    }
}

impl PriceTable {
    pub fn new(devices: BTreeMap<String, f64>) -> Self {
        PriceTable {
            devices: devices
                .into_iter()
                .map(|(k, v)| (k.to_ascii_lowercase(), v))
                .collect(),
        }
    }

    /// Load a `{"device": price, ...}` JSON object
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let devices: BTreeMap<String, f64> = serde_json::from_str(&content)?;
        if let Some((device, price)) = devices.iter().find(|(_, p)| !(**p > 0.0)) {
            return Err(EvaluatorError::dataset(format!(
                "price for {device} must be positive (got {price})"
            )));
        }
        Ok(Self::new(devices))
    }

    pub fn device_price(&self, device: &str) -> Option<f64> {
        self.devices.get(&device.to_ascii_lowercase()).copied()
    }

    /// Hourly on-demand price for the environment at `env_path`
    pub fn resolve_on_demand_price(&self, env_path: &str) -> Option<f64> {
        let lowered = env_path.to_ascii_lowercase();
        let trimmed = lowered.trim_end_matches(['/', '\\']);
        let name = Path::new(trimmed)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let stem = name.strip_suffix(".json").unwrap_or(&name);

        let mut parts = stem.rsplitn(3, '_');
        let (count, device, region) = (parts.next(), parts.next(), parts.next());
        if let (Some(count), Some(device), Some(region)) = (count, device, region) {
            if let (Ok(count), Some(price), false) =
                (count.parse::<u32>(), self.device_price(device), region.is_empty())
            {
                if count > 0 {
                    return Some(price * count as f64);
                }
            }
        }

        // Longest names first so "a100" is never shadowed by a shorter match
        let mut devices: Vec<(&String, &f64)> = self.devices.iter().collect();
        devices.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(b.0)));
        devices
            .into_iter()
            .find(|(device, _)| stem.contains(device.as_str()))
            .map(|(_, price)| *price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suffix_match_scales_by_count() {
        let table = PriceTable::default();
        assert_eq!(table.resolve_on_demand_price("data/us-west-2a_v100_1"), Some(3.06));
        let eight = table.resolve_on_demand_price("data/us-west-2a_v100_8/").unwrap();
        assert!((eight - 3.06 * 8.0).abs() < 1e-9);
        assert_eq!(table.resolve_on_demand_price("US-EAST-1A_K80_1"), Some(0.90));
    }

    #[test]
    fn test_substring_fallback() {
        let table = PriceTable::default();
        assert_eq!(table.resolve_on_demand_price("traces/weekly/v100-day3"), Some(3.06));
        assert_eq!(table.resolve_on_demand_price("traces/a100_spot_mix"), Some(4.096));
    }

    #[test]
    fn test_fallback_ignores_parent_directories() {
        let table = PriceTable::default();
        assert_eq!(table.resolve_on_demand_price("dataset4/test4/us-east-1a_tpu_1"), None);
        assert_eq!(table.resolve_on_demand_price("/data/l4-runs/weekly"), None);
        assert_eq!(table.resolve_on_demand_price("dataset4/weekly-k80"), Some(0.90));
    }

    #[test]
    fn test_unknown_device() {
        let table = PriceTable::default();
        assert_eq!(table.resolve_on_demand_price("traces/us-east-1a_tpu_4"), None);
        assert_eq!(table.resolve_on_demand_price(""), None);
    }

    #[test]
    fn test_custom_table_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prices.json");
        std::fs::write(&path, r#"{"TPU": 2.0}"#).unwrap();
        let table = PriceTable::from_file(&path).unwrap();
        assert_eq!(table.resolve_on_demand_price("eu-west4_tpu_2"), Some(4.0));

        std::fs::write(&path, r#"{"tpu": -1.0}"#).unwrap();
        assert!(PriceTable::from_file(&path).is_err());
    }
}
