pub mod config;
pub mod error;
pub mod manifest;
pub mod types;
pub mod version;

pub use config::WardenConfig;
pub use error::{TokenError, WardenError, WardenResult};
pub use manifest::{ContentManifest, ManifestVersion};
pub use types::*;
pub use version::VersionDescriptor;

/// Current wall-clock time as Unix seconds.
pub fn epoch_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
