//! Lock mode: audits the pinned entries of a lock file.

use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use tracing::{debug, info};

use super::{Auditor, FindingsCollector, VisitedSet};
use crate::checker::{MetadataSource, VulnerabilitySource, MAX_BATCH_SIZE};
use crate::error::AuditError;
use crate::lockfile::{LockEntry, LockFormat, ParsedLock};
use crate::model::{AuditReport, PackageKey};

impl<M: MetadataSource, V: VulnerabilitySource> Auditor<M, V> {
    /// Audits every entry of a lock file.
    ///
    /// Each distinct `(name, version)` is queried once: first in batches to
    /// find out which pairs are affected at all, then individually for the
    /// full records of the affected ones. A finding is reported for every
    /// install location of an affected pair.
    ///
    /// `target` names the report when the lock does not record a project name.
    pub async fn audit_lock(
        &self,
        content: &str,
        format: LockFormat,
        target: &str,
    ) -> Result<AuditReport, AuditError> {
        let parsed = format.parse(content);
        if parsed.entries.is_empty() && !parsed.problems.is_empty() {
            return Err(AuditError::InvalidLockFile(parsed.problems.join("; ")));
        }

        let mut report = AuditReport::new(parsed.root_name.as_deref().unwrap_or(target));
        let collector = FindingsCollector::new();
        for problem in &parsed.problems {
            collector.warn(problem.clone());
        }

        let (candidates, locations) = self.candidates(&parsed);
        info!(
            format = %format,
            entries = parsed.entries.len(),
            packages = candidates.len(),
            "auditing lock file"
        );

        let affected = self.batch_phase(&candidates, &collector).await;
        debug!(affected = affected.len(), "batch phase complete");
        self.detail_phase(affected, &parsed, &locations, &collector)
            .await;

        report.packages_checked = candidates.len();
        report.cancelled = self.cancel.is_cancelled();
        collector.finish(&mut report);
        Ok(report)
    }

    /// Distinct pairs to query, plus every entry that installs each pair.
    fn candidates<'a>(
        &self,
        parsed: &'a ParsedLock,
    ) -> (Vec<PackageKey>, HashMap<PackageKey, Vec<&'a LockEntry>>) {
        let visited = VisitedSet::new();
        let mut candidates = Vec::new();
        let mut locations: HashMap<PackageKey, Vec<&LockEntry>> = HashMap::new();

        for entry in &parsed.entries {
            if self.options.ignore.should_ignore_package(&entry.name) {
                debug!(package = %entry.name, "package ignored, not querying");
                continue;
            }
            let key = entry.key();
            if visited.insert(key.clone()) {
                candidates.push(key.clone());
            }
            locations.entry(key).or_default().push(entry);
        }

        (candidates, locations)
    }

    /// Phase one: which candidates have any vulnerability at all.
    async fn batch_phase(
        &self,
        candidates: &[PackageKey],
        collector: &FindingsCollector,
    ) -> Vec<PackageKey> {
        let mut affected = Vec::new();

        for chunk in candidates.chunks(MAX_BATCH_SIZE) {
            if self.cancel.is_cancelled() {
                break;
            }
            let result = self
                .bounded(
                    "batch query",
                    self.options.query_timeout * 2,
                    self.vulnerabilities.query_batch(chunk),
                )
                .await;

            match result {
                Ok(hits) => affected.extend(
                    chunk
                        .iter()
                        .filter(|key| hits.get(*key).is_some_and(|records| !records.is_empty()))
                        .cloned(),
                ),
                Err(e) => self.degrade(
                    collector,
                    format!(
                        "{} batch query failed for {} packages: {:#}",
                        self.vulnerabilities.name(),
                        chunk.len(),
                        e
                    ),
                ),
            }
        }

        affected
    }

    /// Phase two: full records for the affected pairs only.
    async fn detail_phase(
        &self,
        affected: Vec<PackageKey>,
        parsed: &ParsedLock,
        locations: &HashMap<PackageKey, Vec<&LockEntry>>,
        collector: &FindingsCollector,
    ) {
        stream::iter(affected)
            .map(|key| async move {
                if self.cancel.is_cancelled() {
                    return;
                }
                let records = match self.lookup_vulnerabilities(&key).await {
                    Ok(records) => records,
                    Err(e) => {
                        self.degrade(
                            collector,
                            format!("Vulnerability query failed for {}: {:#}", key, e),
                        );
                        return;
                    }
                };

                for entry in locations.get(&key).into_iter().flatten() {
                    let path = parsed.path_of(entry);
                    self.record(&records, &key, entry.category, &path, collector);
                }
            })
            .buffer_unordered(self.concurrency())
            .collect::<Vec<()>>()
            .await;
    }
}
