// ============================================================================
// Maven 坐标 - GATV / GA / GAT keys
// ============================================================================
//
// Positional, colon-delimited tuples used as map keys everywhere. Fields are
// never reordered and never interpreted beyond string equality.

use crate::error::{AutofixError, AutofixResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Gatv {
    pub group: String,
    pub artifact: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub version: String,
}

impl Gatv {
    pub fn new(group: &str, artifact: &str, type_: &str, version: &str) -> Self {
        Gatv {
            group: group.to_string(),
            artifact: artifact.to_string(),
            type_: type_.to_string(),
            version: version.to_string(),
        }
    }

    /// Strict parse: exactly four non-empty fields.
    pub fn parse(value: &str) -> AutofixResult<Self> {
        let parts: Vec<&str> = value.split(':').collect();
        if parts.len() != 4 {
            return Err(AutofixError::InvalidGatv {
                value: value.to_string(),
                reason: "expected group:artifact:type:version",
            });
        }
        if parts.iter().any(|p| p.trim().is_empty()) {
            return Err(AutofixError::InvalidGatv {
                value: value.to_string(),
                reason: "empty coordinate field",
            });
        }
        Ok(Gatv::new(parts[0], parts[1], parts[2], parts[3]))
    }

    pub fn ga(&self) -> String {
        ga(&self.group, &self.artifact)
    }

    pub fn gat(&self) -> String {
        format!("{}:{}:{}", self.group, self.artifact, self.type_)
    }

    pub fn with_version(&self, version: &str) -> Self {
        Gatv {
            version: version.to_string(),
            ..self.clone()
        }
    }

    pub fn same_ga(&self, other: &Gatv) -> bool {
        self.group == other.group && self.artifact == other.artifact
    }
}

impl fmt::Display for Gatv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}:{}", self.group, self.artifact, self.type_, self.version)
    }
}

impl FromStr for Gatv {
    type Err = AutofixError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Gatv::parse(s)
    }
}

pub fn ga(group: &str, artifact: &str) -> String {
    format!("{group}:{artifact}")
}

/// Truncate a GATV-ish key at the second colon (`g:a:t:v` -> `g:a`).
pub fn truncate_to_ga(key: &str) -> &str {
    match key.match_indices(':').nth(1) {
        Some((idx, _)) => &key[..idx],
        None => key,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_keys() {
        let gatv = Gatv::parse("org.projectlombok:lombok:jar:1.18.22").unwrap();
        assert_eq!(gatv.ga(), "org.projectlombok:lombok");
        assert_eq!(gatv.gat(), "org.projectlombok:lombok:jar");
        assert_eq!(gatv.to_string(), "org.projectlombok:lombok:jar:1.18.22");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(Gatv::parse("org.projectlombok:lombok:1.18.22").is_err());
        assert!(Gatv::parse("a:b:c:d:e").is_err());
        assert!(Gatv::parse("a::jar:1").is_err());
    }

    #[test]
    fn test_truncate_to_ga() {
        assert_eq!(truncate_to_ga("g:a:jar:1.0"), "g:a");
        assert_eq!(truncate_to_ga("g:a"), "g:a");
        assert_eq!(truncate_to_ga("g"), "g");
    }
}
