use serde::{Deserialize, Serialize};

/// A vulnerability record in the OSV schema.
///
/// Batch responses only populate `id` (and `modified`); the full record comes
/// from a single-package query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OsvVulnerability {
    pub id: String,
    pub summary: Option<String>,
    pub details: Option<String>,
    pub aliases: Vec<String>,
    pub severity: Vec<OsvSeverity>,
    pub affected: Vec<OsvAffected>,
}

impl OsvVulnerability {
    /// First alias that is a CVE identifier.
    pub fn cve(&self) -> Option<&str> {
        self.aliases
            .iter()
            .map(String::as_str)
            .find(|alias| alias.starts_with("CVE-"))
    }

    /// First `fixed` event of a SEMVER range that applies to `package`.
    pub fn fixed_version(&self, package: &str) -> Option<&str> {
        self.affected
            .iter()
            .filter(|affected| affected.package.name == package)
            .flat_map(|affected| affected.ranges.iter())
            .filter(|range| range.range_type == "SEMVER")
            .flat_map(|range| range.events.iter())
            .find_map(|event| event.fixed.as_deref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OsvSeverity {
    #[serde(rename = "type")]
    pub severity_type: String,
    pub score: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OsvAffected {
    pub package: OsvAffectedPackage,
    pub ranges: Vec<OsvRange>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OsvAffectedPackage {
    pub name: String,
    pub ecosystem: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OsvRange {
    #[serde(rename = "type")]
    pub range_type: String,
    pub events: Vec<OsvEvent>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OsvEvent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub introduced: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixed: Option<String>,
}
