use dashmap::DashSet;
use parking_lot::Mutex;

use crate::model::{AuditReport, Finding, PackageKey};

/// `(name, version)` pairs already resolved in the current run.
///
/// [`VisitedSet::insert`] checks and inserts in one step, so concurrent
/// branches reaching the same pair agree on exactly one winner.
#[derive(Debug, Default)]
pub struct VisitedSet {
    seen: DashSet<PackageKey>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if `key` was not yet present.
    pub fn insert(&self, key: PackageKey) -> bool {
        self.seen.insert(key)
    }

    pub fn contains(&self, key: &PackageKey) -> bool {
        self.seen.contains(key)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// Append-only sink shared by all branches of one run.
///
/// Order of arrival is meaningless; [`FindingsCollector::finish`] sorts.
#[derive(Debug, Default)]
pub struct FindingsCollector {
    findings: Mutex<Vec<Finding>>,
    warnings: Mutex<Vec<String>>,
}

impl FindingsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, finding: Finding) {
        self.findings.lock().push(finding);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.warnings.lock().push(message.into());
    }

    pub fn len(&self) -> usize {
        self.findings.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.findings.lock().is_empty()
    }

    /// Moves everything collected into `report` and applies presentation order.
    pub fn finish(self, report: &mut AuditReport) {
        report.findings.extend(self.findings.into_inner());
        report.warnings.extend(self.warnings.into_inner());
        report.sort_findings();
    }
}
