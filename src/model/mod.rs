//! Core data types for packages, registry metadata, vulnerabilities, and findings.
//!
//! This module contains the fundamental types used throughout npm-auditor:
//!
//! - [`PackageKey`] - A concrete `(name, version)` pair
//! - [`Category`] - How a package was pulled into the tree (root, mandatory, dev, optional)
//! - [`PackageMetadata`] - Registry metadata for one package
//! - [`OsvVulnerability`] - A raw vulnerability record as returned by OSV
//! - [`Finding`] - A normalized vulnerability finding
//! - [`AuditReport`] - Complete audit results
//!
//! # Example
//!
//! ```
//! use npm_auditor::{AuditReport, Category, PackageKey};
//!
//! let key = PackageKey::new("lodash", "4.17.20");
//! let report = AuditReport::new("lodash");
//!
//! assert_eq!(key.to_string(), "lodash@4.17.20");
//! assert_eq!(Category::Dev.as_str(), "Dev");
//! assert!(report.findings.is_empty());
//! ```

mod finding;
mod metadata;
mod package;
mod vulnerability;

pub use finding::*;
pub use metadata::*;
pub use package::*;
pub use vulnerability::*;
