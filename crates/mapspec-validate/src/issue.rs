use serde::{Deserialize, Serialize};

/// What is wrong with a document location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    MissingField,
    WrongType,
    UnknownLayerType,
    OutOfRange,
    InvalidValue,
    DanglingReference,
}

/// Severity of a validation issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// The document is invalid.
    Error,
    /// Renderable, but probably not what was intended.
    Warning,
}

/// One `(path, message)` pair reported by validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub path: String,
    pub message: String,
    pub kind: IssueKind,
    pub severity: Severity,
}

impl ValidationIssue {
    pub fn error(path: impl Into<String>, kind: IssueKind, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            kind,
            severity: Severity::Error,
        }
    }

    pub fn warning(path: impl Into<String>, kind: IssueKind, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            kind,
            severity: Severity::Warning,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Format issues as the instruction text sent back for a repair round-trip.
pub fn describe_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .filter(|i| i.is_error())
        .map(|i| format!("- {}", i))
        .collect::<Vec<_>>()
        .join("\n")
}
