//! Heuristic version resolution.
//!
//! This is deliberately not a semver range solver: it strips range operators
//! and accepts whatever is left if it starts with a numeric segment. Anything
//! it cannot classify (`*`, `workspace:*`, `x`, git urls, tags) is resolved
//! against the registry's `latest` dist-tag instead.

/// Outcome of resolving a declared range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedVersion {
    /// The range reduced to a concrete version string.
    Exact(String),
    /// Unclassifiable; use the package's `latest` dist-tag.
    Latest,
}

/// Reduces a semver range to a concrete version.
///
/// Returns `None` only for an empty range, which callers treat as "skip this
/// dependency" without querying anything.
///
/// # Example
///
/// ```
/// use npm_auditor::checker::{resolve_version, ResolvedVersion};
///
/// assert_eq!(resolve_version("^1.2.3"), Some(ResolvedVersion::Exact("1.2.3".into())));
/// assert_eq!(resolve_version("workspace:*"), Some(ResolvedVersion::Latest));
/// assert_eq!(resolve_version(""), None);
/// ```
pub fn resolve_version(range: &str) -> Option<ResolvedVersion> {
    if range.is_empty() {
        return None;
    }

    let mut clean = range.trim().to_string();
    for token in ["^", "~", ">=", ">", "=", "v"] {
        clean = clean.replace(token, "");
    }
    let clean = clean.trim();

    let first = clean.split('.').next().unwrap_or_default();
    if !first.is_empty() && first.chars().all(|c| c.is_ascii_digit()) {
        Some(ResolvedVersion::Exact(clean.to_string()))
    } else {
        Some(ResolvedVersion::Latest)
    }
}

/// Whether `latest` is a newer release than `current`.
pub fn is_newer(latest: &str, current: &str) -> bool {
    // Try semver comparison first
    if let (Ok(latest_ver), Ok(current_ver)) = (
        semver::Version::parse(latest.trim_start_matches('v')),
        semver::Version::parse(current.trim_start_matches('v')),
    ) {
        return latest_ver > current_ver;
    }

    latest != current
}
