//! VersionStore: redb-backed persistence of known-good and latest tokens.
//!
//! The store is the accessor the control loop reads its per-cycle
//! snapshot from. It never interprets tokens; decoding belongs to the
//! decision engine. The store supports both on-disk and in-memory
//! backends (the latter for testing).

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition, TableHandle};
use serde::{Deserialize, Serialize};
use tracing::debug;

use warden_core::{VersionSet, epoch_secs};

use crate::error::{StateError, StateResult};
use crate::tables::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

type VersionTable = TableDefinition<'static, &'static str, &'static [u8]>;

/// A stored token plus bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionEntry {
    pub repo: String,
    pub token: String,
    /// Unix seconds at which the entry was written.
    pub recorded_at: u64,
}

fn table_key(namespace: &str, repo: &str) -> String {
    format!("{namespace}/{repo}")
}

/// Thread-safe version store backed by redb.
#[derive(Clone)]
pub struct VersionStore {
    db: Arc<Database>,
}

impl VersionStore {
    /// Open (or create) a persistent store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "version store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory version store opened");
        Ok(store)
    }

    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        txn.open_table(KNOWN_GOOD).map_err(map_err!(Table))?;
        txn.open_table(LATEST).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Known-good ─────────────────────────────────────────────────

    pub fn put_known_good(&self, namespace: &str, repo: &str, token: &str) -> StateResult<()> {
        self.put(KNOWN_GOOD, namespace, repo, token)
    }

    pub fn get_known_good(&self, namespace: &str, repo: &str) -> StateResult<Option<VersionEntry>> {
        self.get(KNOWN_GOOD, namespace, repo)
    }

    /// The known-good set for a namespace (repo → token).
    pub fn known_good(&self, namespace: &str) -> StateResult<VersionSet> {
        self.list(KNOWN_GOOD, namespace)
    }

    pub fn delete_known_good(&self, namespace: &str, repo: &str) -> StateResult<bool> {
        self.delete(KNOWN_GOOD, namespace, repo)
    }

    // ── Latest ─────────────────────────────────────────────────────

    pub fn put_latest(&self, namespace: &str, repo: &str, token: &str) -> StateResult<()> {
        self.put(LATEST, namespace, repo, token)
    }

    pub fn get_latest(&self, namespace: &str, repo: &str) -> StateResult<Option<VersionEntry>> {
        self.get(LATEST, namespace, repo)
    }

    /// The latest set for a namespace (repo → token).
    pub fn latest(&self, namespace: &str) -> StateResult<VersionSet> {
        self.list(LATEST, namespace)
    }

    /// Copy the latest token of `repo` into the known-good table.
    ///
    /// Returns the promoted token, or `None` if there is no latest entry.
    pub fn promote_latest(&self, namespace: &str, repo: &str) -> StateResult<Option<String>> {
        let key = table_key(namespace, repo);
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let promoted;
        {
            let latest = txn.open_table(LATEST).map_err(map_err!(Table))?;
            let entry: Option<VersionEntry> = match latest.get(key.as_str()).map_err(map_err!(Read))? {
                Some(guard) => Some(serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?),
                None => None,
            };
            promoted = match entry {
                Some(entry) => {
                    let record = VersionEntry {
                        recorded_at: epoch_secs(),
                        ..entry
                    };
                    let value = serde_json::to_vec(&record).map_err(map_err!(Serialize))?;
                    let mut known_good = txn.open_table(KNOWN_GOOD).map_err(map_err!(Table))?;
                    known_good
                        .insert(key.as_str(), value.as_slice())
                        .map_err(map_err!(Write))?;
                    Some(record.token)
                }
                None => None,
            };
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, promoted = promoted.is_some(), "latest promoted to known-good");
        Ok(promoted)
    }

    // ── Table helpers ──────────────────────────────────────────────

    fn put(&self, table_def: VersionTable, namespace: &str, repo: &str, token: &str) -> StateResult<()> {
        let key = table_key(namespace, repo);
        let entry = VersionEntry {
            repo: repo.to_string(),
            token: token.to_string(),
            recorded_at: epoch_secs(),
        };
        let value = serde_json::to_vec(&entry).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(table_def).map_err(map_err!(Table))?;
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(table = table_def.name(), %key, "version stored");
        Ok(())
    }

    fn get(&self, table_def: VersionTable, namespace: &str, repo: &str) -> StateResult<Option<VersionEntry>> {
        let key = table_key(namespace, repo);
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(table_def).map_err(map_err!(Table))?;
        match table.get(key.as_str()).map_err(map_err!(Read))? {
            Some(guard) => {
                let entry: VersionEntry =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(entry))
            }
            None => Ok(None),
        }
    }

    fn list(&self, table_def: VersionTable, namespace: &str) -> StateResult<VersionSet> {
        let prefix = format!("{namespace}/");
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(table_def).map_err(map_err!(Table))?;
        let mut results = VersionSet::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (key, value) = entry.map_err(map_err!(Read))?;
            if key.value().starts_with(&prefix) {
                let entry: VersionEntry =
                    serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
                results.insert(entry.repo, entry.token);
            }
        }
        Ok(results)
    }

    fn delete(&self, table_def: VersionTable, namespace: &str, repo: &str) -> StateResult<bool> {
        let key = table_key(namespace, repo);
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(table_def).map_err(map_err!(Table))?;
            existed = table.remove(key.as_str()).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, existed, "version deleted");
        Ok(existed)
    }
}
