use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;

/// Qualitative severity rating.
///
/// Variants are declared in sorting order, most severe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rating {
    #[serde(rename = "CRITICAL")]
    Critical,
    #[serde(rename = "HIGH")]
    High,
    #[serde(rename = "MEDIUM")]
    Medium,
    #[serde(rename = "LOW")]
    Low,
    #[serde(rename = "UNKNOWN")]
    Unknown,
    /// The vulnerability carries no severity information at all.
    #[serde(rename = "N/A")]
    NotApplicable,
}

impl Rating {
    /// Rates a score string against the scale implied by its vector.
    ///
    /// `CVSS:3` vectors use the v3 scale (with a CRITICAL tier starting at 9.0);
    /// anything else uses the v2 scale, which tops out at HIGH. A score that does
    /// not parse, or falls outside the scale, is `Unknown`.
    ///
    /// # Example
    ///
    /// ```
    /// use npm_auditor::severity::Rating;
    ///
    /// assert_eq!(Rating::from_score("9.5", "CVSS:3.1/AV:N"), Rating::Critical);
    /// assert_eq!(Rating::from_score("9.5", "AV:N/AC:L"), Rating::High);
    /// ```
    pub fn from_score(score: &str, vector: &str) -> Rating {
        let Ok(score) = score.trim().parse::<f64>() else {
            return Rating::Unknown;
        };

        if vector.starts_with("CVSS:3") {
            match score {
                s if (0.1..=3.9).contains(&s) => Rating::Low,
                s if (4.0..=6.9).contains(&s) => Rating::Medium,
                s if (7.0..=8.9).contains(&s) => Rating::High,
                s if (9.0..=10.0).contains(&s) => Rating::Critical,
                _ => Rating::Unknown,
            }
        } else {
            match score {
                s if (0.0..=3.9).contains(&s) => Rating::Low,
                s if (4.0..=6.9).contains(&s) => Rating::Medium,
                s if (7.0..=10.0).contains(&s) => Rating::High,
                _ => Rating::Unknown,
            }
        }
    }

    /// Sort key, lower is more severe.
    pub fn priority(&self) -> u8 {
        match self {
            Rating::Critical => 0,
            Rating::High => 1,
            Rating::Medium => 2,
            Rating::Low => 3,
            Rating::Unknown => 4,
            Rating::NotApplicable => 5,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Rating::Critical => "CRITICAL",
            Rating::High => "HIGH",
            Rating::Medium => "MEDIUM",
            Rating::Low => "LOW",
            Rating::Unknown => "UNKNOWN",
            Rating::NotApplicable => "N/A",
        }
    }
}

impl std::fmt::Display for Rating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Rating {
    type Err = String;

    /// Parses one of the filterable ratings, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "CRITICAL" => Ok(Rating::Critical),
            "HIGH" => Ok(Rating::High),
            "MEDIUM" => Ok(Rating::Medium),
            "LOW" => Ok(Rating::Low),
            _ => Err(format!(
                "Unknown severity: {}. Use LOW, MEDIUM, HIGH or CRITICAL",
                s.trim()
            )),
        }
    }
}

/// Set of ratings a finding must have to be reported.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeverityFilter {
    accepted: HashSet<Rating>,
}

impl SeverityFilter {
    pub fn new(ratings: impl IntoIterator<Item = Rating>) -> Self {
        Self {
            accepted: ratings.into_iter().collect(),
        }
    }

    pub fn accepts(&self, rating: Rating) -> bool {
        self.accepted.contains(&rating)
    }

    pub fn is_empty(&self) -> bool {
        self.accepted.is_empty()
    }
}

impl FromStr for SeverityFilter {
    type Err = String;

    /// Parses a comma-separated list such as `"high,CRITICAL"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ratings = s
            .split(',')
            .filter(|part| !part.trim().is_empty())
            .map(Rating::from_str)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(ratings))
    }
}
