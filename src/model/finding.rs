use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Category;
use crate::severity::Rating;

/// One vulnerability affecting one package at one install location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub package: String,
    pub version: String,
    pub id: String,
    pub cve: Option<String>,
    pub summary: String,
    /// Computed CVSS score, or the raw vector when it could not be scored.
    pub severity: Option<String>,
    pub vector: Option<String>,
    pub rating: Rating,
    pub fixed_version: Option<String>,
    pub category: Category,
    /// Package names from the root dependency down to this package.
    pub path: Vec<String>,
}

impl Finding {
    /// Numeric score used for ordering; unscored findings sort last.
    pub fn score(&self) -> f64 {
        self.severity
            .as_deref()
            .and_then(|s| s.parse::<f64>().ok())
            .unwrap_or(-1.0)
    }

    /// Reached only through another dependency, fixable by updating `parent()`.
    pub fn is_bundled(&self) -> bool {
        self.path.len() > 1
    }

    /// The root dependency that pulled this package in.
    pub fn parent(&self) -> Option<&str> {
        self.path.first().map(String::as_str)
    }
}

/// Complete result of one audit run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditReport {
    pub target: String,
    pub audited_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audited_version: Option<String>,
    /// Set when a newer release than the audited one exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_version: Option<String>,
    pub packages_checked: usize,
    pub findings: Vec<Finding>,
    pub warnings: Vec<String>,
    /// The run was interrupted; `findings` is partial.
    pub cancelled: bool,
}

impl AuditReport {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            audited_at: Utc::now(),
            audited_version: None,
            latest_version: None,
            packages_checked: 0,
            findings: Vec::new(),
            warnings: Vec::new(),
            cancelled: false,
        }
    }

    /// Orders findings by descending score, then package name, then id.
    pub fn sort_findings(&mut self) {
        self.findings.sort_by(|a, b| {
            b.score()
                .total_cmp(&a.score())
                .then_with(|| a.package.cmp(&b.package))
                .then_with(|| a.id.cmp(&b.id))
        });
    }

    pub fn direct(&self) -> Vec<&Finding> {
        self.findings.iter().filter(|f| !f.is_bundled()).collect()
    }

    pub fn bundled(&self) -> Vec<&Finding> {
        self.findings.iter().filter(|f| f.is_bundled()).collect()
    }

    pub fn count(&self, rating: Rating) -> usize {
        self.findings.iter().filter(|f| f.rating == rating).count()
    }

    /// Most severe rating present, if any finding exists.
    pub fn worst_rating(&self) -> Option<Rating> {
        self.findings.iter().map(|f| f.rating).min_by_key(|r| r.priority())
    }
}
