//! Content version descriptors and their opaque token form.
//!
//! A token is URL-safe base64 (no padding) of a small JSON object. The
//! creation timestamp travels inside the token but takes no part in
//! equality, so re-issuing the same `(path, hash)` never looks like a new
//! version.

use std::hash::{Hash, Hasher};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};

use crate::error::TokenError;

/// One version of a content repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionDescriptor {
    pub path: String,
    pub hash: String,
    /// Unix seconds at which this descriptor was issued.
    pub created_at: u64,
}

/// Wire form. `created_at` is optional here so a missing field can be
/// reported as [`TokenError::MissingTimestamp`] instead of a parse error.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenBody {
    path: String,
    hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    created_at: Option<u64>,
}

impl VersionDescriptor {
    pub fn new(path: impl Into<String>, hash: impl Into<String>, created_at: u64) -> Self {
        Self {
            path: path.into(),
            hash: hash.into(),
            created_at,
        }
    }

    /// Same `(path, hash)`, issued at `now`.
    pub fn restamped(&self, now: u64) -> Self {
        Self {
            created_at: now,
            ..self.clone()
        }
    }

    /// Seconds elapsed since issue, clamped at zero.
    pub fn age(&self, now: u64) -> u64 {
        now.saturating_sub(self.created_at)
    }

    pub fn encode(&self) -> String {
        let body = TokenBody {
            path: self.path.clone(),
            hash: self.hash.clone(),
            created_at: Some(self.created_at),
        };
        // Serializing a struct of strings and an integer cannot fail.
        let json = serde_json::to_vec(&body).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(json)
    }

    pub fn decode(token: &str) -> Result<Self, TokenError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(token.trim())
            .map_err(|e| TokenError::Encoding(e.to_string()))?;
        let body: TokenBody =
            serde_json::from_slice(&bytes).map_err(|e| TokenError::Payload(e.to_string()))?;
        let created_at = body.created_at.ok_or(TokenError::MissingTimestamp)?;
        Ok(Self {
            path: body.path,
            hash: body.hash,
            created_at,
        })
    }
}

impl PartialEq for VersionDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path && self.hash == other.hash
    }
}

impl Eq for VersionDescriptor {}

impl Hash for VersionDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state);
        self.hash.hash(state);
    }
}

impl std::fmt::Display for VersionDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.path, self.hash)
    }
}
