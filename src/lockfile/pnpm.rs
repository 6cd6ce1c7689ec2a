use super::{LockEntry, ParsedLock};
use crate::model::Category;

pub(super) fn parse(content: &str) -> ParsedLock {
    let mut parsed = ParsedLock::default();
    let mut in_packages = false;
    let mut saw_section = false;
    let mut saw_version = false;
    // Index of the entry whose attributes are being read
    let mut current: Option<usize> = None;

    for line in content.lines() {
        if line.starts_with("lockfileVersion:") {
            saw_version = true;
        }
        if line.trim() == "packages:" {
            in_packages = true;
            saw_section = true;
            continue;
        }
        if !in_packages {
            continue;
        }

        if line.starts_with("  /") || line.starts_with("\t/") || line.starts_with("  '/") {
            current = parse_key(line.trim()).map(|(name, version)| {
                parsed
                    .entries
                    .push(LockEntry::direct(name, version, Category::Mandatory));
                parsed.entries.len() - 1
            });
        } else if !line.is_empty() && !line.starts_with([' ', '\t']) && line.trim_end().ends_with(':') {
            // Next top-level section
            break;
        } else if line.trim() == "dev: true" {
            if let Some(index) = current {
                parsed.entries[index].category = Category::Dev;
            }
        }
    }

    // A project without dependencies has a versioned lock with no `packages` section.
    if !saw_section && !saw_version {
        parsed
            .problems
            .push("No 'packages' section found in pnpm-lock.yaml".to_string());
    }
    parsed
}

/// Splits a `packages` key into name and version.
///
/// Accepts `/name/1.0.0`, `/@scope/name/1.0.0` and the newer
/// `/name@1.0.0` form, with or without peer suffixes
/// (`_react@18.2.0`, `(react@18.2.0)`).
fn parse_key(key: &str) -> Option<(String, String)> {
    let key = key
        .trim_end_matches(':')
        .trim_matches(|c| c == '\'' || c == '"')
        .strip_prefix('/')?;
    let key = key.split('(').next()?;

    let parts: Vec<&str> = key.split('/').collect();
    let (name, version) = match parts.as_slice() {
        [scope, name, version, ..] if scope.starts_with('@') => (format!("{}/{}", scope, name), *version),
        [scope, name_version] if scope.starts_with('@') => {
            let (name, version) = name_version.split_once('@')?;
            (format!("{}/{}", scope, name), version)
        }
        [name, version, ..] => (name.to_string(), *version),
        [name_version] => {
            let (name, version) = name_version.split_once('@')?;
            (name.to_string(), version)
        }
        [] => return None,
    };

    let version = version.split('_').next()?;
    if name.is_empty() || version.is_empty() {
        return None;
    }
    Some((name, version.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOCK_V5: &str = "lockfileVersion: 5.4

importers:
  .:
    specifiers:
      lodash: ^4.17.21

packages:

  /lodash/4.17.21:
    resolution: {integrity: sha512-v2kDEe57lecTulaDIuNTPy3Ry4gLGJ6Z1O3vE1krgXZNrsQ+LFTGHVxVjcXPs17LhbZVGedAJv8XZ1tvj5FvSg==}
    dev: false

  /@babel/core/7.22.0:
    resolution: {integrity: sha512-abc}
    dev: true

  /react-dom/18.2.0_react@18.2.0:
    resolution: {integrity: sha512-def}
    dev: false

settings:
  autoInstallPeers: true
";

    #[test]
    fn test_packages_section() {
        let parsed = parse(LOCK_V5);
        assert!(parsed.problems.is_empty());

        let keys: Vec<String> = parsed.entries.iter().map(|e| e.key().to_string()).collect();
        assert_eq!(
            keys,
            vec!["lodash@4.17.21", "@babel/core@7.22.0", "react-dom@18.2.0"]
        );
        assert_eq!(parsed.entries[0].category, Category::Mandatory);
        assert_eq!(parsed.entries[1].category, Category::Dev);
        assert_eq!(parsed.path_of(&parsed.entries[1]), vec!["@babel/core"]);
    }

    #[test]
    fn test_parse_key_forms() {
        let parse = |key: &str| parse_key(key).map(|(n, v)| format!("{}@{}", n, v));

        assert_eq!(parse("/lodash/4.17.21:").as_deref(), Some("lodash@4.17.21"));
        assert_eq!(parse("/@types/node/20.1.0:").as_deref(), Some("@types/node@20.1.0"));
        assert_eq!(parse("/lodash@4.17.21:").as_deref(), Some("lodash@4.17.21"));
        assert_eq!(parse("/@types/node@20.1.0:").as_deref(), Some("@types/node@20.1.0"));
        assert_eq!(
            parse("'/react-dom@18.2.0(react@18.2.0)':").as_deref(),
            Some("react-dom@18.2.0")
        );
        assert_eq!(parse("lodash/4.17.21:"), None);
        assert_eq!(parse("/lodash:"), None);
    }

    #[test]
    fn test_missing_section_is_reported() {
        let parsed = parse("settings:\n  autoInstallPeers: true\n");
        assert!(parsed.entries.is_empty());
        assert_eq!(parsed.problems.len(), 1);
    }

    #[test]
    fn test_lock_without_dependencies() {
        let parsed = parse("lockfileVersion: '6.0'\n\nsettings:\n  autoInstallPeers: true\n  excludeLinksFromLockfile: false\n");
        assert!(parsed.entries.is_empty());
        assert!(parsed.problems.is_empty());
    }
}
