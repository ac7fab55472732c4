//! Eviction consensus: debounces "failing now" into "failing persistently".
//!
//! Keeps the failing sets of the last `depth` cycles. A pod is selected
//! for eviction only when it is in the current set and in every one of
//! those prior sets, i.e. failing for `depth + 1` consecutive cycles.
//! Owned by the control loop; not shared.

use std::collections::{BTreeSet, VecDeque};

use tracing::debug;

use warden_core::PodId;

#[derive(Debug)]
pub struct EvictionConsensus {
    depth: usize,
    window: VecDeque<BTreeSet<PodId>>,
}

impl EvictionConsensus {
    pub fn new(depth: usize) -> Self {
        Self {
            depth,
            window: VecDeque::with_capacity(depth + 1),
        }
    }

    /// Record this cycle's failing set and return the pods to evict.
    pub fn observe(&mut self, current: BTreeSet<PodId>) -> Vec<PodId> {
        while self.window.len() > self.depth {
            self.window.pop_front();
        }

        let evict: Vec<PodId> = if self.window.len() == self.depth {
            current
                .iter()
                .filter(|pod| self.window.iter().all(|past| past.contains(*pod)))
                .cloned()
                .collect()
        } else {
            debug!(
                cycles = self.window.len(),
                needed = self.depth,
                "eviction window still filling"
            );
            Vec::new()
        };

        self.window.push_back(current);
        evict
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Number of past cycles currently held.
    pub fn history_len(&self) -> usize {
        self.window.len()
    }
}

impl Default for EvictionConsensus {
    fn default() -> Self {
        Self::new(3)
    }
}
