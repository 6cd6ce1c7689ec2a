use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Registry metadata for a single package (the npm "packument").
///
/// Only the fields the auditor reads are modelled; everything else in the
/// registry document is ignored during deserialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageMetadata {
    #[serde(rename = "dist-tags")]
    pub dist_tags: BTreeMap<String, String>,
    pub versions: BTreeMap<String, VersionMetadata>,
}

impl PackageMetadata {
    /// The version the `latest` dist-tag points to.
    pub fn latest(&self) -> Option<&str> {
        self.dist_tags.get("latest").map(String::as_str)
    }

    pub fn version(&self, version: &str) -> Option<&VersionMetadata> {
        self.versions.get(version)
    }
}

/// Manifest of one published version.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VersionMetadata {
    pub dependencies: BTreeMap<String, String>,
    #[serde(rename = "devDependencies")]
    pub dev_dependencies: BTreeMap<String, String>,
    #[serde(rename = "optionalDependencies")]
    pub optional_dependencies: BTreeMap<String, String>,
    #[serde(deserialize_with = "deprecation_message")]
    pub deprecated: Option<String>,
}

impl VersionMetadata {
    /// Production and optional dependencies; an optional entry overrides a
    /// production entry of the same name.
    pub fn runtime_dependencies(&self) -> BTreeMap<&str, &str> {
        self.dependencies
            .iter()
            .chain(self.optional_dependencies.iter())
            .map(|(name, range)| (name.as_str(), range.as_str()))
            .collect()
    }
}

// The registry occasionally publishes `"deprecated": false` instead of omitting the field.
fn deprecation_message<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(msg)) if !msg.is_empty() => Some(msg),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_packument() {
        let json = r#"{
            "name": "left-pad",
            "dist-tags": { "latest": "1.3.0" },
            "versions": {
                "1.3.0": {
                    "dependencies": { "a": "^1.0.0" },
                    "optionalDependencies": { "b": "~2.0.0" },
                    "devDependencies": { "tap": "*" },
                    "deprecated": "use String.prototype.padStart()"
                },
                "1.2.0": { "deprecated": false }
            }
        }"#;

        let meta: PackageMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(meta.latest(), Some("1.3.0"));

        let v = meta.version("1.3.0").unwrap();
        assert_eq!(v.dev_dependencies.len(), 1);
        assert_eq!(
            v.deprecated.as_deref(),
            Some("use String.prototype.padStart()")
        );
        assert!(meta.version("1.2.0").unwrap().deprecated.is_none());
    }

    #[test]
    fn test_runtime_dependencies_exclude_dev() {
        let mut v = VersionMetadata::default();
        v.dependencies.insert("a".into(), "^1.0.0".into());
        v.dependencies.insert("shared".into(), "^1.0.0".into());
        v.optional_dependencies.insert("shared".into(), "^2.0.0".into());
        v.dev_dependencies.insert("tap".into(), "*".into());

        let deps = v.runtime_dependencies();
        assert_eq!(deps.len(), 2);
        assert_eq!(deps.get("shared"), Some(&"^2.0.0"));
        assert!(!deps.contains_key("tap"));
    }
}
