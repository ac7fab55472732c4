//! Domain types for pods, watchdogs, and per-pod data state.
//!
//! Pod metadata arrives from the fleet as a flat string map. Watchdog
//! entries live under the reserved [`WATCHDOG_PREFIX`] with values of the
//! form `Level/message`.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Reserved metadata key prefix for watchdog entries.
pub const WATCHDOG_PREFIX: &str = "wd.";

/// Flat metadata map attached to a pod (annotation key → value).
pub type Metadata = BTreeMap<String, String>;

/// Repo name → version token. Used for both known-good and latest sets.
pub type VersionSet = BTreeMap<String, String>;

/// Deployment slot identifier.
pub type SlotId = String;

// ── Pod identity ───────────────────────────────────────────────────

/// Primary key for all per-pod state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PodId {
    pub namespace: String,
    pub name: String,
}

impl PodId {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for PodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

// ── Watchdogs ──────────────────────────────────────────────────────

/// Severity of a watchdog report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchdogLevel {
    Unknown,
    Info,
    Warning,
    Error,
}

impl WatchdogLevel {
    /// Case-insensitive parse. Anything unrecognised is `Unknown`.
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("error") {
            WatchdogLevel::Error
        } else if s.eq_ignore_ascii_case("warning") {
            WatchdogLevel::Warning
        } else if s.eq_ignore_ascii_case("info") {
            WatchdogLevel::Info
        } else {
            WatchdogLevel::Unknown
        }
    }

    /// Severity weight: error=3, warning=2, info=1, unknown=0.
    pub fn weight(self) -> u8 {
        match self {
            WatchdogLevel::Unknown => 0,
            WatchdogLevel::Info => 1,
            WatchdogLevel::Warning => 2,
            WatchdogLevel::Error => 3,
        }
    }
}

impl fmt::Display for WatchdogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatchdogLevel::Unknown => write!(f, "Unknown"),
            WatchdogLevel::Info => write!(f, "Info"),
            WatchdogLevel::Warning => write!(f, "Warning"),
            WatchdogLevel::Error => write!(f, "Error"),
        }
    }
}

/// A single named health signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchdogStatus {
    pub name: String,
    pub level: WatchdogLevel,
    pub message: String,
}

impl WatchdogStatus {
    /// Parse a raw `Level/message` value. Returns `None` without a `/`.
    pub fn parse(name: &str, raw: &str) -> Option<Self> {
        let (level, message) = raw.split_once('/')?;
        Some(Self {
            name: name.to_string(),
            level: WatchdogLevel::parse(level),
            message: message.to_string(),
        })
    }

    /// Render back to the `Level/message` metadata form.
    pub fn to_entry(&self) -> String {
        format!("{}/{}", self.level, self.message)
    }
}

/// Extract all well-formed watchdogs from a metadata map, keyed by name.
pub fn watchdogs_from_metadata(metadata: &Metadata) -> BTreeMap<String, WatchdogStatus> {
    metadata
        .iter()
        .filter_map(|(key, value)| {
            let name = key.strip_prefix(WATCHDOG_PREFIX)?;
            WatchdogStatus::parse(name, value).map(|w| (name.to_string(), w))
        })
        .collect()
}

// ── Pod data state ─────────────────────────────────────────────────

/// What a pod has declared and what it is currently running, per slot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PodDataState {
    /// Slot → repo name.
    pub deployments: BTreeMap<SlotId, String>,
    /// Slot → currently requested version token.
    pub requests: BTreeMap<SlotId, String>,
    /// Repos this pod depends on without owning a slot.
    pub dependencies: BTreeSet<String>,
}

impl PodDataState {
    /// Whether any slot of this pod is mapped to `repo`.
    pub fn deploys(&self, repo: &str) -> bool {
        self.deployments.values().any(|r| r == repo)
    }

    /// Whether this pod deploys or depends on `repo`.
    pub fn relies_on(&self, repo: &str) -> bool {
        self.deploys(repo) || self.dependencies.contains(repo)
    }

    /// Request tokens of every slot mapped to `repo`.
    pub fn requests_for<'a>(&'a self, repo: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.deployments
            .iter()
            .filter(move |(_, r)| r.as_str() == repo)
            .filter_map(move |(slot, _)| self.requests.get(slot).map(String::as_str))
    }
}

/// Everything the controller knows about one pod in one cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodSnapshot {
    pub id: PodId,
    #[serde(default)]
    pub data: PodDataState,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default = "default_ready")]
    pub containers_ready: bool,
}

fn default_ready() -> bool {
    true
}

impl PodSnapshot {
    pub fn new(id: PodId) -> Self {
        Self {
            id,
            data: PodDataState::default(),
            metadata: Metadata::new(),
            containers_ready: true,
        }
    }

    pub fn watchdogs(&self) -> BTreeMap<String, WatchdogStatus> {
        watchdogs_from_metadata(&self.metadata)
    }

    /// Whether any watchdog reports error-level severity.
    pub fn has_error_watchdog(&self) -> bool {
        self.watchdogs()
            .values()
            .any(|w| w.level == WatchdogLevel::Error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_parse_is_case_insensitive() {
        assert_eq!(WatchdogLevel::parse("ERROR"), WatchdogLevel::Error);
        assert_eq!(WatchdogLevel::parse("Warning"), WatchdogLevel::Warning);
        assert_eq!(WatchdogLevel::parse("info"), WatchdogLevel::Info);
        assert_eq!(WatchdogLevel::parse("fatal"), WatchdogLevel::Unknown);
        assert_eq!(WatchdogLevel::parse(""), WatchdogLevel::Unknown);
    }

    #[test]
    fn watchdogs_only_read_prefixed_entries() {
        let mut md = Metadata::new();
        md.insert("a".into(), "Error/disk".into());
        md.insert("wd.sync".into(), "warning/lagging".into());
        md.insert("wd.broken".into(), "no-slash".into());

        let wds = watchdogs_from_metadata(&md);
        assert_eq!(wds.len(), 1);
        let sync = &wds["sync"];
        assert_eq!(sync.level, WatchdogLevel::Warning);
        assert_eq!(sync.message, "lagging");
    }

    #[test]
    fn error_watchdog_detection() {
        let mut pod = PodSnapshot::new(PodId::new("ns", "p"));
        assert!(!pod.has_error_watchdog());
        pod.metadata.insert("wd.x".into(), "Error/boom".into());
        assert!(pod.has_error_watchdog());
    }

    #[test]
    fn relies_on_covers_slots_and_dependencies() {
        let mut data = PodDataState::default();
        data.deployments.insert("1".into(), "d".into());
        data.dependencies.insert("e".into());
        assert!(data.deploys("d"));
        assert!(!data.deploys("e"));
        assert!(data.relies_on("e"));
        assert!(!data.relies_on("f"));
    }

    #[test]
    fn pod_id_display() {
        assert_eq!(PodId::new("content", "pod-0").to_string(), "content/pod-0");
    }
}
