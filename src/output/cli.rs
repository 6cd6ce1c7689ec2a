use crate::model::{AuditReport, Finding};
use crate::severity::Rating;
use anyhow::Result;
use std::fmt::Write;
use tabled::{settings::Style, Table, Tabled};

const NONE: &str = "N/A";

#[derive(Tabled)]
struct DirectRow {
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Package")]
    package: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "CVE")]
    cve: String,
    #[tabled(rename = "Severity")]
    severity: String,
    #[tabled(rename = "Fixed")]
    fixed: String,
    #[tabled(rename = "Summary")]
    summary: String,
}

#[derive(Tabled)]
struct BundledRow {
    #[tabled(rename = "Parent")]
    parent: String,
    #[tabled(rename = "Package")]
    package: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "CVE")]
    cve: String,
    #[tabled(rename = "Severity")]
    severity: String,
    #[tabled(rename = "Fixed")]
    fixed: String,
    #[tabled(rename = "Update via")]
    update_via: String,
}

impl From<&Finding> for DirectRow {
    fn from(f: &Finding) -> Self {
        Self {
            category: f.category.to_string(),
            package: f.package.clone(),
            version: f.version.clone(),
            id: f.id.clone(),
            cve: or_none(f.cve.as_deref()),
            severity: format_severity(f),
            fixed: or_none(f.fixed_version.as_deref()),
            summary: truncate(&f.summary, 30),
        }
    }
}

impl From<&Finding> for BundledRow {
    fn from(f: &Finding) -> Self {
        let parent = f.parent().unwrap_or("Unknown").to_string();
        Self {
            update_via: format!("npm update {}", parent),
            parent,
            package: f.package.clone(),
            version: f.version.clone(),
            id: f.id.clone(),
            cve: or_none(f.cve.as_deref()),
            severity: format_severity(f),
            fixed: or_none(f.fixed_version.as_deref()),
        }
    }
}

pub fn print_cli_table(report: &AuditReport) -> Result<()> {
    print!("{}", render(report));
    Ok(())
}

/// Renders the report as it appears on the terminal.
pub fn render(report: &AuditReport) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail
    let _ = write_report(&mut out, report);
    out
}

fn write_report(out: &mut String, report: &AuditReport) -> std::fmt::Result {
    writeln!(out)?;
    match &report.audited_version {
        Some(version) => writeln!(out, "Audited {}@{}", report.target, version)?,
        None => writeln!(out, "Audited {}", report.target)?,
    }
    writeln!(
        out,
        "Completed at: {} ({} packages checked)",
        report.audited_at.format("%Y-%m-%d %H:%M:%S UTC"),
        report.packages_checked
    )?;
    if let Some(latest) = &report.latest_version {
        writeln!(out, "A newer version is available: {}", latest)?;
    }

    if !report.warnings.is_empty() {
        writeln!(out)?;
        writeln!(out, "Warnings:")?;
        for warning in &report.warnings {
            writeln!(out, "  - {}", warning)?;
        }
    }

    if report.cancelled {
        writeln!(out)?;
        writeln!(out, "Audit interrupted, results are partial.")?;
    }

    if report.findings.is_empty() {
        writeln!(out)?;
        writeln!(out, "No vulnerabilities found.")?;
        return Ok(());
    }

    let direct = report.direct();
    if !direct.is_empty() {
        writeln!(out)?;
        writeln!(out, "Direct Dependencies ({}):", direct.len())?;
        let rows: Vec<DirectRow> = direct.into_iter().map(DirectRow::from).collect();
        writeln!(out, "{}", Table::new(rows).with(Style::rounded()))?;
    }

    let bundled = report.bundled();
    if !bundled.is_empty() {
        writeln!(out)?;
        writeln!(out, "Bundled Dependencies ({}):", bundled.len())?;
        let rows: Vec<BundledRow> = bundled.into_iter().map(BundledRow::from).collect();
        writeln!(out, "{}", Table::new(rows).with(Style::rounded()))?;
    }

    writeln!(out)?;
    write_summary(out, report)?;
    write_legend(out)
}

fn write_summary(out: &mut String, report: &AuditReport) -> std::fmt::Result {
    writeln!(out, "Summary:")?;
    writeln!(
        out,
        "  Vulnerabilities: {} ({} direct, {} bundled)",
        report.findings.len(),
        report.direct().len(),
        report.bundled().len()
    )?;
    writeln!(
        out,
        "  {} critical, {} high, {} medium, {} low, {} unrated",
        report.count(Rating::Critical),
        report.count(Rating::High),
        report.count(Rating::Medium),
        report.count(Rating::Low),
        report.count(Rating::Unknown) + report.count(Rating::NotApplicable)
    )?;

    let critical = report.count(Rating::Critical);
    if critical > 0 {
        writeln!(
            out,
            "  {} {} immediate attention",
            colorize(Rating::Critical, &format!("{} CRITICAL", critical)),
            if critical == 1 { "issue requires" } else { "issues require" }
        )?;
    }
    Ok(())
}

fn write_legend(out: &mut String) -> std::fmt::Result {
    writeln!(out)?;
    writeln!(
        out,
        "Severity Legend: {} (9.0-10.0)  {} (7.0-8.9)  {} (4.0-6.9)  {} (0.1-3.9)",
        colorize(Rating::Critical, "CRITICAL"),
        colorize(Rating::High, "HIGH"),
        colorize(Rating::Medium, "MEDIUM"),
        colorize(Rating::Low, "LOW"),
    )
}

/// Score and rating, e.g. `9.8 CRITICAL`.
fn format_severity(finding: &Finding) -> String {
    match &finding.severity {
        Some(score) if finding.rating == Rating::Unknown => score.clone(),
        Some(score) => format!("{} {}", score, finding.rating),
        None => NONE.to_string(),
    }
}

fn colorize(rating: Rating, text: &str) -> String {
    match rating {
        Rating::Critical => format!("\x1b[31m{}\x1b[0m", text),
        Rating::High => format!("\x1b[91m{}\x1b[0m", text),
        Rating::Medium => format!("\x1b[33m{}\x1b[0m", text),
        Rating::Low => format!("\x1b[32m{}\x1b[0m", text),
        Rating::Unknown | Rating::NotApplicable => text.to_string(),
    }
}

fn or_none(value: Option<&str>) -> String {
    value.unwrap_or(NONE).to_string()
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Category;

    fn finding(package: &str, severity: Option<&str>, rating: Rating, path: &[&str]) -> Finding {
        Finding {
            package: package.to_string(),
            version: "1.0.0".to_string(),
            id: format!("GHSA-{}", package),
            cve: None,
            summary: "Prototype pollution in a very popular utility library".to_string(),
            severity: severity.map(str::to_string),
            vector: None,
            rating,
            fixed_version: Some("1.0.1".to_string()),
            category: Category::Mandatory,
            path: path.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 30), "short");
        assert_eq!(truncate("abcdefghij", 8), "abcde...");
        assert_eq!(truncate("ééééééé", 5), "éé...");
    }

    #[test]
    fn test_format_severity() {
        assert_eq!(
            format_severity(&finding("a", Some("9.8"), Rating::Critical, &["a"])),
            "9.8 CRITICAL"
        );
        assert_eq!(
            format_severity(&finding("a", Some("CVSS:3.1/AV:Q"), Rating::Unknown, &["a"])),
            "CVSS:3.1/AV:Q"
        );
        assert_eq!(format_severity(&finding("a", None, Rating::NotApplicable, &["a"])), "N/A");
    }

    #[test]
    fn test_render_groups() {
        let mut report = AuditReport::new("app");
        report.packages_checked = 12;
        report.findings = vec![
            finding("lodash", Some("7.4"), Rating::High, &["lodash"]),
            finding("qs", Some("9.8"), Rating::Critical, &["express", "qs"]),
        ];

        let text = render(&report);
        assert!(text.contains("Direct Dependencies (1):"));
        assert!(text.contains("Bundled Dependencies (1):"));
        assert!(text.contains("npm update express"));
        assert!(text.contains("Prototype pollution in a ve..."));
        assert!(text.contains("12 packages checked"));
        assert!(text.contains("Severity Legend"));
    }

    #[test]
    fn test_render_clean_report() {
        let mut report = AuditReport::new("app");
        report.warnings.push("Could not fetch metadata for gone".into());
        report.cancelled = true;

        let text = render(&report);
        assert!(text.contains("No vulnerabilities found."));
        assert!(text.contains("Could not fetch metadata for gone"));
        assert!(text.contains("results are partial"));
    }
}
