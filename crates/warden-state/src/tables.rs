//! redb table definitions for the version store.
//!
//! Both tables use `{namespace}/{repo}` keys and JSON `VersionEntry` values.

use redb::TableDefinition;

/// Known-good version per repo.
pub const KNOWN_GOOD: TableDefinition<&str, &[u8]> = TableDefinition::new("known_good");

/// Latest discovered version per repo.
pub const LATEST: TableDefinition<&str, &[u8]> = TableDefinition::new("latest");
