use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;

/// Heartbeat age after which a node counts as stale.
pub const DEFAULT_NODE_TTL_MS: u64 = 5000;

/// Minimum spacing between two expiry sweeps.
pub const DEFAULT_EXPIRY_CHECK_INTERVAL_MS: u64 = 1000;

/// Dashboard settings: the regions every shard is expected to span, plus
/// staleness tuning for the node registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub app_name: String,
    pub regions: Vec<String>,
    pub master_region: Option<String>,
    pub node_ttl_ms: u64,
    pub expiry_check_interval_ms: u64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            app_name: String::new(),
            regions: Vec::new(),
            master_region: None,
            node_ttl_ms: DEFAULT_NODE_TTL_MS,
            expiry_check_interval_ms: DEFAULT_EXPIRY_CHECK_INTERVAL_MS,
        }
    }
}

impl DashboardConfig {
    /// Config with the given regions and default timings.
    pub fn with_regions<I, S>(regions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            regions: regions.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: DashboardConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let yaml = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&yaml)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.regions.is_empty() {
            return Err(ConfigError::NoRegions);
        }

        let mut seen = HashSet::new();
        for region in &self.regions {
            if !seen.insert(region.as_str()) {
                return Err(ConfigError::DuplicateRegion {
                    region: region.clone(),
                });
            }
        }

        if let Some(master) = &self.master_region {
            if !seen.contains(master.as_str()) {
                return Err(ConfigError::UnknownMasterRegion {
                    region: master.clone(),
                });
            }
        }

        if self.node_ttl_ms == 0 {
            return Err(ConfigError::InvalidInterval {
                field: "node_ttl_ms",
            });
        }
        if self.expiry_check_interval_ms == 0 {
            return Err(ConfigError::InvalidInterval {
                field: "expiry_check_interval_ms",
            });
        }

        Ok(())
    }

    /// Configured regions as a set, for coverage comparisons.
    pub fn region_set(&self) -> BTreeSet<String> {
        self.regions.iter().cloned().collect()
    }

    pub fn node_ttl(&self) -> Duration {
        Duration::from_millis(self.node_ttl_ms)
    }

    pub fn expiry_check_interval(&self) -> Duration {
        Duration::from_millis(self.expiry_check_interval_ms)
    }
}
