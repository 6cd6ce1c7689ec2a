//! CVSS scoring and severity classification.
//!
//! - [`score_v3`] / [`score_v2`] turn a metric vector into a numeric base score
//! - [`Rating`] maps a score onto the LOW..CRITICAL scale of its CVSS version
//! - [`SeverityFilter`] holds the set of ratings a user asked to see

mod cvss;
mod rating;

pub use cvss::{score_v2, score_v3, CvssScore};
pub use rating::{Rating, SeverityFilter};
