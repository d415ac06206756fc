//! Change-feed models and the handler contract.
//!
//! A change record carries the raw manifest document of one package as
//! delivered by the origin registry. Records may be malformed (missing name
//! or versions), the engine treats those as no-ops.

mod follower;

pub use follower::{Follower, FollowerSettings};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Continuation that advances the feed cursor.
///
/// Handlers must invoke it exactly once per record, on every path, so an
/// unprocessable record can never stall the follower.
pub type Done = Box<dyn FnOnce() + Send + 'static>;

/// Callback contract the follower invokes once per incoming change record.
#[async_trait]
pub trait ChangeHandler: Send + Sync {
    async fn handle(&self, record: ChangeRecord, done: Done);
}

/// One raw event from the change feed.
#[derive(Debug, Clone)]
pub struct ChangeRecord {
    pub seq: Option<u64>,
    /// The package's full manifest document, kept as raw JSON so arbitrary
    /// metadata survives the round trip into the store untouched.
    pub json: serde_json::Value,
}

impl ChangeRecord {
    pub fn new(json: serde_json::Value) -> Self {
        Self { seq: None, json }
    }

    pub fn package_name(&self) -> Option<&str> {
        self.json.get("name")?.as_str()
    }

    /// Flatten the manifest's `versions` map into descriptors, preserving
    /// the map's order. Returns `None` when the map is missing or not an
    /// object, which marks the record as unprocessable.
    pub fn versions(&self) -> Option<Vec<VersionDescriptor>> {
        let versions = self.json.get("versions")?.as_object()?;
        Some(
            versions
                .iter()
                .map(|(version, entry)| VersionDescriptor::from_entry(version, entry))
                .collect(),
        )
    }
}

/// One entry of a manifest's version map, flattened for the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionDescriptor {
    pub version: String,
    /// Tarball URL; a descriptor without one is retained in the manifest
    /// but skipped for download.
    pub tarball: Option<String>,
    /// Integrity checksum, carried through best-effort and not verified.
    pub shasum: Option<String>,
}

impl VersionDescriptor {
    fn from_entry(version: &str, entry: &serde_json::Value) -> Self {
        // npm manifests nest the tarball reference under `dist`; some feeds
        // inline it at the top of the version entry.
        let dist = entry.get("dist").unwrap_or(entry);
        Self {
            version: version.to_string(),
            tarball: dist
                .get("tarball")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            shasum: dist
                .get("shasum")
                .and_then(|v| v.as_str())
                .map(str::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_name_and_versions() {
        let record = ChangeRecord::new(json!({
            "name": "new-module",
            "versions": {
                "1.0.0": {
                    "dist": {
                        "tarball": "http://registry/new-module/-/1.0.0/new-module-1.0.0.tar.gz",
                        "shasum": "123"
                    }
                }
            }
        }));

        assert_eq!(record.package_name(), Some("new-module"));
        let versions = record.versions().unwrap();
        assert_eq!(versions.len(), 1);
        assert_eq!(versions[0].version, "1.0.0");
        assert_eq!(
            versions[0].tarball.as_deref(),
            Some("http://registry/new-module/-/1.0.0/new-module-1.0.0.tar.gz")
        );
        assert_eq!(versions[0].shasum.as_deref(), Some("123"));
    }

    #[test]
    fn missing_name_or_versions_yields_none() {
        assert_eq!(ChangeRecord::new(json!({})).package_name(), None);
        assert!(ChangeRecord::new(json!({ "name": "x" })).versions().is_none());
        assert!(ChangeRecord::new(json!({ "name": "x", "versions": [] }))
            .versions()
            .is_none());
        assert_eq!(ChangeRecord::new(json!({ "name": 42 })).package_name(), None);
    }

    #[test]
    fn inlined_tarball_reference_is_accepted() {
        let record = ChangeRecord::new(json!({
            "name": "flat",
            "versions": { "0.1.0": { "tarball": "http://registry/flat.tar.gz" } }
        }));

        let versions = record.versions().unwrap();
        assert_eq!(
            versions[0].tarball.as_deref(),
            Some("http://registry/flat.tar.gz")
        );
        assert_eq!(versions[0].shasum, None);
    }

    #[test]
    fn version_without_tarball_is_retained() {
        let record = ChangeRecord::new(json!({
            "name": "sparse",
            "versions": { "1.0.0": {}, "1.0.1": { "dist": { "tarball": "http://r/t.tgz" } } }
        }));

        let versions = record.versions().unwrap();
        assert_eq!(versions.len(), 2);
        assert_eq!(versions[0].tarball, None);
        assert!(versions[1].tarball.is_some());
    }

    #[test]
    fn preserves_version_map_order() {
        let record = ChangeRecord::new(json!({
            "name": "ordered",
            "versions": { "2.0.0": {}, "1.0.0": {}, "3.0.0": {} }
        }));

        let order: Vec<_> = record
            .versions()
            .unwrap()
            .into_iter()
            .map(|v| v.version)
            .collect();
        assert_eq!(order, vec!["2.0.0", "1.0.0", "3.0.0"]);
    }
}
