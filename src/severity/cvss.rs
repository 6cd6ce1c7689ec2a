//! CVSS base score calculation.
//!
//! Scores are computed from the metric vector alone; temporal and environmental
//! metrics are ignored. Any vector that cannot be scored yields `None`.

use std::collections::HashMap;

/// A computed base score, displayed with one decimal.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct CvssScore(f64);

impl CvssScore {
    pub fn value(&self) -> f64 {
        self.0
    }
}

impl std::fmt::Display for CvssScore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.1}", self.0)
    }
}

/// Splits `KEY:VALUE/KEY:VALUE` into a map. Segments without a colon are
/// skipped; a segment with more than one colon makes the vector unreadable.
fn parse_metrics(vector: &str) -> Option<HashMap<&str, &str>> {
    let mut metrics = HashMap::new();
    for part in vector.split('/') {
        if !part.contains(':') {
            continue;
        }
        let mut kv = part.split(':');
        let (key, value) = (kv.next()?, kv.next()?);
        if kv.next().is_some() {
            return None;
        }
        metrics.insert(key, value);
    }
    Some(metrics)
}

/// Calculates a CVSS v3.x base score.
///
/// The vector must start with `CVSS:3`. A missing or unrecognized scope (`S`)
/// is treated as unchanged; any other missing metric makes the vector unscorable.
///
/// # Example
///
/// ```
/// use npm_auditor::severity::score_v3;
///
/// let score = score_v3("CVSS:3.1/AV:N/AC:L/PR:N/UI:N/S:U/C:H/I:H/A:H").unwrap();
/// assert_eq!(score.to_string(), "9.8");
/// ```
pub fn score_v3(vector: &str) -> Option<CvssScore> {
    if !vector.starts_with("CVSS:3") {
        return None;
    }
    let metrics = parse_metrics(vector)?;
    let metric = |key: &str| metrics.get(key).copied();

    let scope_changed = metric("S") == Some("C");

    let av = match metric("AV")? {
        "N" => 0.85,
        "A" => 0.62,
        "L" => 0.55,
        "P" => 0.2,
        _ => return None,
    };
    let ac = match metric("AC")? {
        "L" => 0.77,
        "H" => 0.44,
        _ => return None,
    };
    let pr = match (metric("PR")?, scope_changed) {
        ("N", _) => 0.85,
        ("L", false) => 0.62,
        ("L", true) => 0.68,
        ("H", false) => 0.27,
        ("H", true) => 0.50,
        _ => return None,
    };
    let ui = match metric("UI")? {
        "N" => 0.85,
        "R" => 0.62,
        _ => return None,
    };
    let cia = |key: &str| match metric(key)? {
        "H" => Some(0.56),
        "L" => Some(0.22),
        "N" => Some(0.0),
        _ => None,
    };
    let (c, i, a) = (cia("C")?, cia("I")?, cia("A")?);

    let iss = 1.0 - ((1.0 - c) * (1.0 - i) * (1.0 - a));
    let impact = if scope_changed {
        7.52 * (iss - 0.029) - 3.25 * (iss - 0.02_f64).powi(15)
    } else {
        6.42 * iss
    };
    let exploitability = 8.22 * av * ac * pr * ui;

    let base = if impact <= 0.0 {
        0.0
    } else if scope_changed {
        (1.08 * (impact + exploitability)).min(10.0)
    } else {
        (impact + exploitability).min(10.0)
    };

    // Round up at the tenths digit.
    Some(CvssScore((base * 10.0).ceil() / 10.0))
}

/// Calculates a CVSS v2 base score. Surrounding parentheses are tolerated.
///
/// # Example
///
/// ```
/// use npm_auditor::severity::score_v2;
///
/// let score = score_v2("(AV:N/AC:L/Au:N/C:P/I:P/A:P)").unwrap();
/// assert_eq!(score.to_string(), "7.5");
/// ```
pub fn score_v2(vector: &str) -> Option<CvssScore> {
    let clean = vector.replace(['(', ')'], "");
    let metrics = parse_metrics(&clean)?;
    let metric = |key: &str| metrics.get(key).copied();

    let av = match metric("AV")? {
        "L" => 0.395,
        "A" => 0.646,
        "N" => 1.0,
        _ => return None,
    };
    let ac = match metric("AC")? {
        "H" => 0.35,
        "M" => 0.61,
        "L" => 0.71,
        _ => return None,
    };
    let au = match metric("Au")? {
        "M" => 0.45,
        "S" => 0.56,
        "N" => 0.704,
        _ => return None,
    };
    let cia = |key: &str| match metric(key)? {
        "N" => Some(0.0),
        "P" => Some(0.275),
        "C" => Some(0.660),
        _ => None,
    };
    let (c, i, a) = (cia("C")?, cia("I")?, cia("A")?);

    let impact = 10.41 * (1.0 - (1.0 - c) * (1.0 - i) * (1.0 - a));
    if impact == 0.0 {
        return Some(CvssScore(0.0));
    }
    let exploitability = 20.0 * av * ac * au;
    let base = ((0.6 * impact) + (0.4 * exploitability) - 1.5) * 1.176;

    Some(CvssScore(base))
}
