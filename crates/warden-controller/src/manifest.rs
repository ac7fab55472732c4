//! Manifest providers: capability-selected content manifest sources.
//!
//! Each provider says whether it can handle a source string; the registry
//! picks the first one that can, in registration order.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use warden_core::{ContentManifest, WardenError, WardenResult};

/// Placeholder substituted with the namespace in source strings.
pub const NAMESPACE_PLACEHOLDER: &str = "{namespace}";

#[async_trait]
pub trait ManifestProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether this provider understands `source`.
    fn can_handle(&self, source: &str) -> bool;

    async fn fetch(&self, source: &str, namespace: &str) -> WardenResult<ContentManifest>;
}

/// Ordered list of providers.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: Vec<Box<dyn ManifestProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in providers.
    pub fn with_defaults() -> Self {
        Self::new().register(FileManifestProvider)
    }

    pub fn register(mut self, provider: impl ManifestProvider + 'static) -> Self {
        self.providers.push(Box::new(provider));
        self
    }

    /// First provider that can handle `source`.
    pub fn select(&self, source: &str) -> Option<&dyn ManifestProvider> {
        self.providers
            .iter()
            .find(|p| p.can_handle(source))
            .map(|p| p.as_ref())
    }

    pub async fn fetch(&self, source: &str, namespace: &str) -> WardenResult<ContentManifest> {
        let provider = self
            .select(source)
            .ok_or_else(|| WardenError::UnsupportedSource(source.to_string()))?;
        debug!(provider = provider.name(), %source, %namespace, "fetching manifest");
        provider.fetch(source, namespace).await
    }
}

/// Reads a JSON manifest from the local filesystem.
///
/// Accepts `file://` URIs and absolute or `./`-relative paths. A missing
/// file is an empty manifest.
pub struct FileManifestProvider;

impl FileManifestProvider {
    fn resolve(source: &str, namespace: &str) -> PathBuf {
        let path = source.strip_prefix("file://").unwrap_or(source);
        PathBuf::from(path.replace(NAMESPACE_PLACEHOLDER, namespace))
    }
}

#[async_trait]
impl ManifestProvider for FileManifestProvider {
    fn name(&self) -> &'static str {
        "file"
    }

    fn can_handle(&self, source: &str) -> bool {
        source.starts_with("file://") || source.starts_with('/') || source.starts_with("./")
    }

    async fn fetch(&self, source: &str, namespace: &str) -> WardenResult<ContentManifest> {
        let path = Self::resolve(source, namespace);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(?path, %namespace, "manifest missing; treating as empty");
                Ok(ContentManifest::default())
            }
            Err(e) => Err(e.into()),
        }
    }
}
