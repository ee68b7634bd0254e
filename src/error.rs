//! Error types for callscope.
//!
//! Only two things in the library can actually fail: a payload that does not
//! pass validation in strict mode, and a config file that cannot be read or
//! parsed. Everything else (ambiguous calls, exhausted budgets) is reported
//! in-band in the results.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How bad a validation finding is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Suspicious but harmless (duplicates, unknown placeholder targets).
    Warning,
    /// The entry breaks a structural rule.
    Error,
}

/// One structural finding against an input payload.
///
/// `path` points into the envelope, e.g. `functions[3].startLine`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub path: String,
    pub message: String,
    pub severity: Severity,
}

impl ValidationIssue {
    pub fn error(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            severity: Severity::Error,
        }
    }

    pub fn warning(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            severity: Severity::Warning,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "{}: {}: {}", tag, self.path, self.message)
    }
}

/// Payload failures surfaced to the caller.
#[derive(Debug, Error)]
pub enum PayloadError {
    /// The document is not an object or array of envelopes at all.
    #[error("unsupported payload shape: {0}")]
    UnsupportedShape(String),

    /// Strict validation found structural errors.
    #[error("payload failed validation with {} error(s)", .issues.iter().filter(|i| i.is_error()).count())]
    Invalid { issues: Vec<ValidationIssue> },

    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Config file failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_counts_only_errors() {
        let err = PayloadError::Invalid {
            issues: vec![
                ValidationIssue::error("functions[0].id", "missing id"),
                ValidationIssue::warning("functions[1].id", "duplicate id"),
            ],
        };
        assert_eq!(err.to_string(), "payload failed validation with 1 error(s)");
    }

    #[test]
    fn test_issue_display() {
        let issue = ValidationIssue::warning("callEdges[2]", "duplicate pair");
        assert_eq!(issue.to_string(), "warning: callEdges[2]: duplicate pair");
    }
}
