use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{read_file, Error, Result};

/// LDS ceiling used by the older resource usage view.
pub const LEGACY_LDS_CEILING: u64 = 65536;
pub const ICACHE_SIZE_BYTES: u64 = 32768;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LdsPolicy {
    /// Hazard when the used bytes reach the reported available bytes.
    #[default]
    Available,
    /// Hazard when the used bytes reach a fixed ceiling.
    FixedCeiling { bytes: u64 },
}

impl LdsPolicy {
    pub fn limit(&self, available: u64) -> u64 {
        match self {
            LdsPolicy::Available => available,
            LdsPolicy::FixedCeiling { bytes } => *bytes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub lds_policy: LdsPolicy,
    pub icache_size_bytes: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            lds_policy: LdsPolicy::Available,
            icache_size_bytes: ICACHE_SIZE_BYTES,
        }
    }
}

impl Config {
    pub fn from_yaml_str(text: &str) -> std::result::Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = read_file(path)?;
        Self::from_yaml_str(&text).map_err(|e| Error::Config(path.to_path_buf(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.lds_policy, LdsPolicy::Available);
        assert_eq!(config.icache_size_bytes, 32768);
    }

    #[test]
    fn empty_yaml_is_default() {
        assert_eq!(Config::from_yaml_str("{}").unwrap(), Config::default());
    }

    #[test]
    fn fixed_ceiling() {
        let yaml = "lds_policy:\n  fixed_ceiling:\n    bytes: 65536\nicache_size_bytes: 16384\n";
        let config = Config::from_yaml_str(yaml).unwrap();
        assert_eq!(
            config.lds_policy,
            LdsPolicy::FixedCeiling {
                bytes: LEGACY_LDS_CEILING
            }
        );
        assert_eq!(config.icache_size_bytes, 16384);
        assert_eq!(config.lds_policy.limit(32768), 65536);
    }

    #[test]
    fn available_policy() {
        let config = Config::from_yaml_str("lds_policy: available").unwrap();
        assert_eq!(config.lds_policy.limit(32768), 32768);
    }
}
