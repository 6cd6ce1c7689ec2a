use crate::model::{Category, Finding, OsvVulnerability, PackageKey};
use crate::severity::{score_v2, score_v3, Rating, SeverityFilter};

const NO_SUMMARY: &str = "No summary provided";

/// Flattens one vulnerability record into a [`Finding`].
///
/// Returns `None` when an active severity filter rejects the derived rating.
pub fn normalize(
    record: &OsvVulnerability,
    key: &PackageKey,
    category: Category,
    path: &[String],
    filter: &SeverityFilter,
) -> Option<Finding> {
    let (severity, vector) = match severity_of(record) {
        Some((severity, vector)) => (Some(severity), Some(vector)),
        None => (None, None),
    };
    let rating = match (&severity, &vector) {
        (Some(severity), Some(vector)) => Rating::from_score(severity, vector),
        _ => Rating::NotApplicable,
    };

    if !filter.is_empty() && !filter.accepts(rating) {
        return None;
    }

    Some(Finding {
        package: key.name.clone(),
        version: key.version.clone(),
        id: record.id.clone(),
        cve: record.cve().map(str::to_string),
        summary: record
            .summary
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| NO_SUMMARY.to_string()),
        severity,
        vector,
        rating,
        fixed_version: record.fixed_version(&key.name).map(str::to_string),
        category,
        path: path.to_vec(),
    })
}

/// Picks `(score, vector)` from the record's severity list.
///
/// A `CVSS_V2` vector wins over `CVSS_V3` whenever one is present. A vector
/// that cannot be scored is reported as-is in place of the score.
fn severity_of(record: &OsvVulnerability) -> Option<(String, String)> {
    type Scorer = fn(&str) -> Option<crate::severity::CvssScore>;
    let scorers: [(&str, Scorer); 2] = [("CVSS_V2", score_v2), ("CVSS_V3", score_v3)];

    scorers.iter().find_map(|(kind, score)| {
        let entry = record.severity.iter().find(|s| s.severity_type == *kind)?;
        let severity = score(&entry.score)
            .map(|s| s.to_string())
            .unwrap_or_else(|| entry.score.clone());
        Some((severity, entry.score.clone()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(json: serde_json::Value) -> OsvVulnerability {
        serde_json::from_value(json).unwrap()
    }

    fn key() -> PackageKey {
        PackageKey::new("lodash", "4.17.15")
    }

    fn run(record: &OsvVulnerability, filter: &SeverityFilter) -> Option<Finding> {
        normalize(record, &key(), Category::Mandatory, &["lodash".to_string()], filter)
    }

    #[test]
    fn test_full_record() {
        let record = record(serde_json::json!({
            "id": "GHSA-p6mc-m468-83gw",
            "summary": "Prototype Pollution in lodash",
            "aliases": ["GHSA-xxxx", "CVE-2020-8203", "CVE-2020-0000"],
            "severity": [
                { "type": "CVSS_V3", "score": "CVSS:3.1/AV:N/AC:H/PR:N/UI:N/S:U/C:N/I:H/A:H" }
            ],
            "affected": [{
                "package": { "name": "lodash", "ecosystem": "npm" },
                "ranges": [{ "type": "SEMVER", "events": [ { "introduced": "0" }, { "fixed": "4.17.19" } ] }]
            }]
        }));

        let finding = run(&record, &SeverityFilter::default()).unwrap();
        assert_eq!(finding.id, "GHSA-p6mc-m468-83gw");
        assert_eq!(finding.cve.as_deref(), Some("CVE-2020-8203"));
        assert_eq!(finding.severity.as_deref(), Some("7.4"));
        assert_eq!(finding.rating, Rating::High);
        assert_eq!(finding.fixed_version.as_deref(), Some("4.17.19"));
        assert_eq!(finding.path, vec!["lodash"]);
    }

    #[test]
    fn test_v2_vector_is_preferred() {
        let record = record(serde_json::json!({
            "id": "GHSA-1",
            "severity": [
                { "type": "CVSS_V3", "score": "CVSS:3.1/AV:N/AC:L/PR:N/UI:N/S:U/C:H/I:H/A:H" },
                { "type": "CVSS_V2", "score": "AV:N/AC:M/Au:N/C:N/I:P/A:N" }
            ]
        }));

        let finding = run(&record, &SeverityFilter::default()).unwrap();
        assert_eq!(finding.severity.as_deref(), Some("4.3"));
        assert_eq!(finding.rating, Rating::Medium);
        assert_eq!(finding.summary, NO_SUMMARY);
        assert!(finding.cve.is_none());
        assert!(finding.fixed_version.is_none());
    }

    #[test]
    fn test_unscorable_vector_is_kept_raw() {
        let record = record(serde_json::json!({
            "id": "GHSA-2",
            "severity": [ { "type": "CVSS_V3", "score": "CVSS:3.1/AV:Q" } ]
        }));

        let finding = run(&record, &SeverityFilter::default()).unwrap();
        assert_eq!(finding.severity.as_deref(), Some("CVSS:3.1/AV:Q"));
        assert_eq!(finding.rating, Rating::Unknown);
    }

    #[test]
    fn test_record_without_severity() {
        let record = record(serde_json::json!({ "id": "GHSA-3" }));
        let finding = run(&record, &SeverityFilter::default()).unwrap();
        assert!(finding.severity.is_none());
        assert_eq!(finding.rating, Rating::NotApplicable);
    }

    #[test]
    fn test_severity_filter() {
        let medium = record(serde_json::json!({
            "id": "GHSA-medium",
            "severity": [ { "type": "CVSS_V2", "score": "AV:N/AC:M/Au:N/C:N/I:P/A:N" } ]
        }));
        let critical = record(serde_json::json!({
            "id": "GHSA-critical",
            "severity": [ { "type": "CVSS_V3", "score": "CVSS:3.0/AV:N/AC:L/PR:N/UI:N/S:U/C:H/I:H/A:H" } ]
        }));
        let filter: SeverityFilter = "HIGH,critical".parse().unwrap();

        let kept: Vec<String> = [medium, critical]
            .iter()
            .filter_map(|r| run(r, &filter))
            .map(|f| f.id)
            .collect();
        assert_eq!(kept, vec!["GHSA-critical"]);
    }
}
