//! Content-repository manifest: the versions available per repo.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::version::VersionDescriptor;

/// One available version as listed by the manifest source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestVersion {
    pub path: String,
    pub hash: String,
    pub created_at: u64,
}

impl ManifestVersion {
    pub fn descriptor(&self) -> VersionDescriptor {
        VersionDescriptor::new(&self.path, &self.hash, self.created_at)
    }
}

/// Repo name → available versions, as fetched for one namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentManifest {
    #[serde(default)]
    pub repos: BTreeMap<String, Vec<ManifestVersion>>,
}

impl ContentManifest {
    /// Newest version of `repo` by creation time. On equal timestamps the
    /// entry listed later wins.
    pub fn newest(&self, repo: &str) -> Option<&ManifestVersion> {
        self.repos
            .get(repo)?
            .iter()
            .fold(None, |best: Option<&ManifestVersion>, v| match best {
                Some(b) if b.created_at > v.created_at => Some(b),
                _ => Some(v),
            })
    }

    /// Newest descriptor for every repo that lists at least one version.
    pub fn newest_versions(&self) -> BTreeMap<String, VersionDescriptor> {
        self.repos
            .keys()
            .filter_map(|repo| self.newest(repo).map(|v| (repo.clone(), v.descriptor())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(path: &str, created_at: u64) -> ManifestVersion {
        ManifestVersion {
            path: path.to_string(),
            hash: format!("h-{path}"),
            created_at,
        }
    }

    #[test]
    fn newest_picks_latest_timestamp() {
        let mut m = ContentManifest::default();
        m.repos.insert("d".into(), vec![v("old", 1), v("new", 3), v("mid", 2)]);
        assert_eq!(m.newest("d").unwrap().path, "new");
        assert!(m.newest("missing").is_none());
    }

    #[test]
    fn newest_breaks_ties_by_position() {
        let mut m = ContentManifest::default();
        m.repos.insert("d".into(), vec![v("first", 5), v("second", 5)]);
        assert_eq!(m.newest("d").unwrap().path, "second");
    }

    #[test]
    fn empty_repo_has_no_newest() {
        let mut m = ContentManifest::default();
        m.repos.insert("d".into(), Vec::new());
        assert!(m.newest_versions().is_empty());
    }

    #[test]
    fn parses_json() {
        let json = r#"{"repos":{"d":[{"path":"a","hash":"a","createdAt":7}]}}"#;
        let m: ContentManifest = serde_json::from_str(json).unwrap();
        assert_eq!(m.newest_versions()["d"], VersionDescriptor::new("a", "a", 0));
    }
}
