//! Diagnostic codes and error reporting
//!
//! IMPORTANT: Diagnostic codes are versioned and stable.
//! NEVER rename or remove codes - they are part of the public API.
//! Add new codes with new names only.

use serde::{Deserialize, Serialize};

/// Diagnostic code registry (v1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiagnosticCode {
    // Structural errors
    /// An edge endpoint does not match any node id
    GraphDanglingEdge,

    /// The same id is used by nodes of different kinds
    GraphIdCollision,

    // Suspicious shapes
    /// Two pipeline steps of the same kind share a name
    GraphDuplicateStep,

    /// Data-flow edges form a cycle
    GraphCycle,

    // Informational
    /// Transform with neither inputs nor outputs
    GraphIsolatedStep,

    /// Meta step whose nested graph has no tables and no steps
    GraphEmptyGroup,
}

impl DiagnosticCode {
    /// Get the diagnostic code as a stable string identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GraphDanglingEdge => "GRAPH_DANGLING_EDGE",
            Self::GraphIdCollision => "GRAPH_ID_COLLISION",
            Self::GraphDuplicateStep => "GRAPH_DUPLICATE_STEP",
            Self::GraphCycle => "GRAPH_CYCLE",
            Self::GraphIsolatedStep => "GRAPH_ISOLATED_STEP",
            Self::GraphEmptyGroup => "GRAPH_EMPTY_GROUP",
        }
    }

    /// Severity used when the config carries no override
    pub fn default_severity(&self) -> Severity {
        match self {
            Self::GraphDanglingEdge | Self::GraphIdCollision => Severity::Error,
            Self::GraphDuplicateStep | Self::GraphCycle => Severity::Warn,
            Self::GraphIsolatedStep | Self::GraphEmptyGroup => Severity::Info,
        }
    }
}

impl std::fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational message
    Info,

    /// Warning - should be reviewed but not blocking
    Warn,

    /// Error - the graph cannot be rendered faithfully
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A diagnostic message with structured metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Stable diagnostic code
    pub code: DiagnosticCode,

    /// Severity level
    pub severity: Severity,

    /// Human-readable message
    pub message: String,

    /// Node the diagnostic is about, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,

    /// Enclosing group ids, outermost first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scope: Vec<String>,

    /// Other node ids involved (edge endpoints, colliding steps, cycle members)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub related: Vec<String>,
}

impl Diagnostic {
    /// Create a new diagnostic with minimal fields
    pub fn new(code: DiagnosticCode, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            code,
            severity,
            message: message.into(),
            node: None,
            scope: Vec::new(),
            related: Vec::new(),
        }
    }

    /// Set the node
    pub fn with_node(mut self, node: impl Into<String>) -> Self {
        self.node = Some(node.into());
        self
    }

    /// Set the enclosing group path
    pub fn with_scope(mut self, scope: Vec<String>) -> Self {
        self.scope = scope;
        self
    }

    /// Set related node ids
    pub fn with_related(mut self, related: Vec<String>) -> Self {
        self.related = related;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_code_stability() {
        assert_eq!(DiagnosticCode::GraphDanglingEdge.as_str(), "GRAPH_DANGLING_EDGE");
        assert_eq!(DiagnosticCode::GraphIdCollision.as_str(), "GRAPH_ID_COLLISION");
        assert_eq!(DiagnosticCode::GraphEmptyGroup.as_str(), "GRAPH_EMPTY_GROUP");
    }

    #[test]
    fn serialized_code_matches_as_str() {
        let json = serde_json::to_string(&DiagnosticCode::GraphDuplicateStep).unwrap();
        assert_eq!(json, "\"GRAPH_DUPLICATE_STEP\"");
    }

    #[test]
    fn diagnostic_serialization() {
        let code = DiagnosticCode::GraphDanglingEdge;
        let diag = Diagnostic::new(
            code,
            code.default_severity(),
            "Edge 'T1' -> 'missing' points to an unknown node",
        )
        .with_node("T1")
        .with_related(vec!["missing".to_string()]);

        assert_eq!(diag.severity, Severity::Error);

        let json = serde_json::to_string(&diag).unwrap();
        assert!(json.contains("GRAPH_DANGLING_EDGE"));
        assert!(json.contains("\"error\""));
        assert!(!json.contains("scope"));
    }

    #[test]
    fn severity_ordering() {
        assert!(Severity::Error > Severity::Warn);
        assert!(Severity::Warn > Severity::Info);
    }
}
