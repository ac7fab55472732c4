//! Operator commands against the version store.
//!
//! The store file is locked while the daemon runs; these are meant for
//! bootstrapping or for a stopped daemon.

use anyhow::{Context, bail};
use tracing::info;

use warden_core::{VersionDescriptor, VersionSet, WardenConfig};
use warden_state::VersionStore;

pub fn open_store(config: &WardenConfig) -> anyhow::Result<VersionStore> {
    std::fs::create_dir_all(&config.state.data_dir)
        .with_context(|| format!("creating data dir {}", config.state.data_dir.display()))?;
    let path = config.state.data_dir.join("warden.redb");
    let store = VersionStore::open(&path)?;
    info!(path = ?path, "version store opened");
    Ok(store)
}

fn ensure_allowed(config: &WardenConfig, namespace: &str) -> anyhow::Result<()> {
    if !config.is_allowed(namespace) {
        bail!("namespace {namespace} is not in the controller allow-list");
    }
    Ok(())
}

/// Token set rendered with decoded descriptors where possible.
fn describe(set: &VersionSet) -> serde_json::Value {
    set.iter()
        .map(|(repo, token)| {
            let value = match VersionDescriptor::decode(token) {
                Ok(v) => serde_json::to_value(v).unwrap_or(serde_json::Value::Null),
                Err(e) => serde_json::json!({ "invalid": e.to_string(), "token": token }),
            };
            (repo.clone(), value)
        })
        .collect::<serde_json::Map<_, _>>()
        .into()
}

pub fn show(config: &WardenConfig, namespace: &str) -> anyhow::Result<()> {
    ensure_allowed(config, namespace)?;
    let store = open_store(config)?;
    let report = serde_json::json!({
        "namespace": namespace,
        "knownGood": describe(&store.known_good(namespace)?),
        "latest": describe(&store.latest(namespace)?),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

pub fn promote(config: &WardenConfig, namespace: &str, repo: &str) -> anyhow::Result<()> {
    ensure_allowed(config, namespace)?;
    let store = open_store(config)?;
    let Some(token) = store.promote_latest(namespace, repo)? else {
        bail!("no latest version recorded for {namespace}/{repo}");
    };
    let version = VersionDescriptor::decode(&token)
        .map(|v| v.to_string())
        .unwrap_or_else(|_| token.clone());
    info!(namespace, repo, %version, "promoted latest to known-good");
    println!("{namespace}/{repo} known-good = {version}");
    Ok(())
}
