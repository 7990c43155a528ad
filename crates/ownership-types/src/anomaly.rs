//! Advisory anomaly findings

use serde::{Deserialize, Serialize};

/// Ordered so that `Critical > Warning > Info`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }
}

/// Never blocking; consumers decide how to surface it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyFinding {
    pub kind: String,
    pub severity: Severity,
    pub message: String,
    pub evidence: serde_json::Value,
}

impl AnomalyFinding {
    pub fn new(
        kind: impl Into<String>,
        severity: Severity,
        message: impl Into<String>,
        evidence: serde_json::Value,
    ) -> Self {
        Self {
            kind: kind.into(),
            severity,
            message: message.into(),
            evidence,
        }
    }
}

/// Most severe first; stable within a severity
pub fn sort_by_severity(findings: &mut [AnomalyFinding]) {
    findings.sort_by(|a, b| b.severity.cmp(&a.severity));
}
