//! warden.toml configuration parser.
//!
//! Every section is optional. Durations are human strings such as `"10s"`,
//! `"500ms"`, `"5m"` or `"24h"`; a bare integer means seconds.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WardenConfig {
    pub controller: ControllerConfig,
    pub rollout: RolloutConfig,
    pub health: HealthConfig,
    pub state: StateConfig,
    pub fleet: FleetConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Namespace allow-list.
    pub namespaces: Vec<String>,
    pub cycle_period: String,
    /// Number of prior cycles a pod must also have failed in.
    pub window_depth: usize,
    pub max_consecutive_errors: u32,
    pub eviction_grace_period: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            namespaces: Vec::new(),
            cycle_period: "10s".to_string(),
            window_depth: 3,
            max_consecutive_errors: 10,
            eviction_grace_period: "30s".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RolloutConfig {
    pub soak_duration: String,
}

impl Default for RolloutConfig {
    fn default() -> Self {
        Self {
            soak_duration: "1h".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    pub min_healthy_duration: String,
    pub listen: String,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            min_healthy_duration: "30s".to_string(),
            listen: "0.0.0.0:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    pub data_dir: PathBuf,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("/var/lib/warden"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    /// Path of the JSON pod list read by the file fleet client.
    pub pods: PathBuf,
    /// Manifest source; `{namespace}` is substituted per namespace.
    pub manifest: String,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            pods: PathBuf::from("/etc/warden/fleet.json"),
            manifest: "file:///etc/warden/manifests/{namespace}.json".to_string(),
        }
    }
}

impl WardenConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: WardenConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn is_allowed(&self, namespace: &str) -> bool {
        self.controller.namespaces.iter().any(|n| n == namespace)
    }

    pub fn cycle_period(&self) -> Duration {
        parse_duration(&self.controller.cycle_period).unwrap_or(Duration::from_secs(10))
    }

    pub fn eviction_grace_period(&self) -> Duration {
        parse_duration(&self.controller.eviction_grace_period).unwrap_or(Duration::from_secs(30))
    }

    pub fn soak_duration(&self) -> Duration {
        parse_duration(&self.rollout.soak_duration).unwrap_or(Duration::from_secs(3600))
    }

    pub fn min_healthy_duration(&self) -> Duration {
        parse_duration(&self.health.min_healthy_duration).unwrap_or(Duration::from_secs(30))
    }
}

/// Parse a duration string like "5s", "500ms", "2m", "24h".
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(ms) = s.strip_suffix("ms") {
        ms.parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>().ok().map(|m| Duration::from_secs(m * 60))
    } else if let Some(hours) = s.strip_suffix('h') {
        hours.parse::<u64>().ok().map(|h| Duration::from_secs(h * 3600))
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}
