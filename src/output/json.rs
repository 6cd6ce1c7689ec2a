use crate::model::AuditReport;
use anyhow::Result;

pub fn print_json(report: &AuditReport) -> Result<()> {
    println!("{}", to_json(report)?);
    Ok(())
}

pub fn to_json(report: &AuditReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}
