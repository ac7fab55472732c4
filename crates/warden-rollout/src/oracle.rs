//! Upgrade oracle: decides the next version token per pod slot.
//!
//! Per call, in order:
//!
//! 1. Unknown pod or slot: hold.
//! 2. Any pod that deploys or depends on the slot's repo reports an
//!    error-level watchdog: the repo is frozen for everyone this cycle.
//! 3. No current request, or a corrupt one: fall back to known-good.
//! 4. Current equals latest: converged. Current equals known-good and is
//!    still inside the soak window: hold.
//! 5. Otherwise promote to latest, canary first: while no pod of the
//!    cohort runs latest, only the last cohort pod (input order) not on
//!    latest advances. Once one does, the rest follow.
//!
//! Everything is derived at construction; queries never mutate, so one
//! oracle can be shared freely within a cycle.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::{debug, warn};

use warden_core::{PodId, PodSnapshot, SlotId, VersionDescriptor, VersionSet};

use crate::policy::RolloutPolicy;

/// Immutable inputs for one control cycle.
#[derive(Debug, Clone, Default)]
pub struct RolloutSnapshot {
    pub known_good: VersionSet,
    pub latest: VersionSet,
    /// All pods of the namespace, in listing order.
    pub pods: Vec<PodSnapshot>,
    /// Unix seconds the snapshot was taken; used as "now".
    pub taken_at: u64,
}

/// Why no token was issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldReason {
    UnknownPod,
    UnknownSlot,
    /// Safety gate engaged for the repo.
    Frozen,
    /// Nothing to fall back to.
    NoKnownGood,
    Converged,
    Soaking,
    /// Nothing to promote to.
    NoLatest,
    /// Another pod is the canary this cycle.
    AwaitingCanary,
}

impl HoldReason {
    /// Holds worth a warning rather than a debug line.
    pub fn is_abnormal(self) -> bool {
        matches!(
            self,
            HoldReason::UnknownPod | HoldReason::UnknownSlot | HoldReason::Frozen
        )
    }
}

/// Outcome of one `(pod, slot)` query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Write this token as the slot's new request.
    Assign(String),
    Hold(HoldReason),
}

/// One token to be written back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataRequest {
    pub pod: PodId,
    pub slot: SlotId,
    pub token: String,
}

pub struct UpgradeOracle {
    pods: Vec<PodSnapshot>,
    index: HashMap<PodId, usize>,
    known_good: BTreeMap<String, VersionDescriptor>,
    latest: BTreeMap<String, VersionDescriptor>,
    frozen: BTreeSet<String>,
    policy: RolloutPolicy,
    now: u64,
}

impl UpgradeOracle {
    pub fn new(snapshot: RolloutSnapshot, policy: RolloutPolicy) -> Self {
        let RolloutSnapshot {
            known_good,
            latest,
            pods,
            taken_at,
        } = snapshot;

        let mut index = HashMap::with_capacity(pods.len());
        for (i, pod) in pods.iter().enumerate() {
            if index.contains_key(&pod.id) {
                warn!(pod = %pod.id, "duplicate pod in snapshot; keeping first");
                continue;
            }
            index.insert(pod.id.clone(), i);
        }

        let mut frozen = BTreeSet::new();
        for pod in pods.iter().filter(|p| p.has_error_watchdog()) {
            for repo in pod.data.deployments.values().chain(pod.data.dependencies.iter()) {
                if frozen.insert(repo.clone()) {
                    warn!(pod = %pod.id, %repo, "error watchdog; freezing repository");
                }
            }
        }

        Self {
            index,
            known_good: decode_set("known-good", &known_good),
            latest: decode_set("latest", &latest),
            frozen,
            pods,
            policy,
            now: taken_at,
        }
    }

    /// The token to write for `(pod, slot)`, or `None` to leave it alone.
    pub fn get_data_request(&self, pod: &PodId, slot: &str) -> Option<String> {
        match self.decide(pod, slot) {
            Decision::Assign(token) => Some(token),
            Decision::Hold(reason) => {
                if reason.is_abnormal() {
                    warn!(%pod, slot, ?reason, "no data request issued");
                } else {
                    debug!(%pod, slot, ?reason, "no data request issued");
                }
                None
            }
        }
    }

    /// Evaluate every declared slot of every pod.
    pub fn plan(&self) -> Vec<DataRequest> {
        self.pods
            .iter()
            .flat_map(|pod| {
                pod.data.deployments.keys().filter_map(move |slot| {
                    self.get_data_request(&pod.id, slot).map(|token| DataRequest {
                        pod: pod.id.clone(),
                        slot: slot.clone(),
                        token,
                    })
                })
            })
            .collect()
    }

    pub fn is_frozen(&self, repo: &str) -> bool {
        self.frozen.contains(repo)
    }

    pub fn decide(&self, pod_id: &PodId, slot: &str) -> Decision {
        let Some(pod) = self.index.get(pod_id).map(|&i| &self.pods[i]) else {
            return Decision::Hold(HoldReason::UnknownPod);
        };
        let Some(repo) = pod.data.deployments.get(slot) else {
            return Decision::Hold(HoldReason::UnknownSlot);
        };
        if self.frozen.contains(repo) {
            return Decision::Hold(HoldReason::Frozen);
        }

        let current = match pod.data.requests.get(slot) {
            None => return self.fall_back(repo),
            Some(token) => match VersionDescriptor::decode(token) {
                Ok(v) => v,
                Err(e) => {
                    warn!(pod = %pod_id, slot, %repo, error = %e, "corrupt request token; resetting");
                    return self.fall_back(repo);
                }
            },
        };

        let latest = self.latest.get(repo);
        if latest == Some(&current) {
            return Decision::Hold(HoldReason::Converged);
        }
        if self.known_good.get(repo) == Some(&current)
            && self.policy.is_soaking(current.age(self.now))
        {
            return Decision::Hold(HoldReason::Soaking);
        }
        let Some(latest) = latest else {
            return Decision::Hold(HoldReason::NoLatest);
        };

        let cohort: Vec<&PodSnapshot> = self.pods.iter().filter(|p| p.data.deploys(repo)).collect();
        let canary_done = cohort.iter().any(|p| runs(p, repo, latest));
        if canary_done {
            debug!(pod = %pod_id, slot, %repo, version = %latest, "canary confirmed; promoting");
            return self.assign(latest);
        }

        let canary = cohort.iter().rev().find(|p| !runs(p, repo, latest));
        match canary {
            Some(c) if c.id == *pod_id => {
                debug!(pod = %pod_id, slot, %repo, version = %latest, "promoting canary");
                self.assign(latest)
            }
            _ => Decision::Hold(HoldReason::AwaitingCanary),
        }
    }

    fn fall_back(&self, repo: &str) -> Decision {
        match self.known_good.get(repo) {
            Some(kg) => self.assign(kg),
            None => Decision::Hold(HoldReason::NoKnownGood),
        }
    }

    fn assign(&self, version: &VersionDescriptor) -> Decision {
        Decision::Assign(version.restamped(self.now).encode())
    }
}

/// Whether any slot of `pod` mapped to `repo` currently requests `version`.
fn runs(pod: &PodSnapshot, repo: &str, version: &VersionDescriptor) -> bool {
    pod.data
        .requests_for(repo)
        .any(|token| VersionDescriptor::decode(token).is_ok_and(|v| v == *version))
}

fn decode_set(kind: &str, set: &VersionSet) -> BTreeMap<String, VersionDescriptor> {
    set.iter()
        .filter_map(|(repo, token)| match VersionDescriptor::decode(token) {
            Ok(v) => Some((repo.clone(), v)),
            Err(e) => {
                warn!(kind, %repo, error = %e, "ignoring undecodable version token");
                None
            }
        })
        .collect()
}
