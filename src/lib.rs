pub mod audit;
pub mod cache;
pub mod checker;
pub mod config;
pub mod error;
pub mod input;
pub mod lockfile;
pub mod model;
pub mod output;
pub mod severity;

pub use audit::{AuditOptions, Auditor};
pub use cache::MetadataCache;
pub use config::Config;
pub use error::AuditError;
pub use input::Target;
pub use lockfile::LockFormat;
pub use model::{AuditReport, Category, Finding, PackageKey};
pub use severity::{Rating, SeverityFilter};
