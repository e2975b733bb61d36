//! report.json written by `pipegraph check`
//!
//! Consumers parse this file, so fields are only ever added. Removing or
//! renaming one bumps `ReportVersion::major`.

use serde::{Deserialize, Serialize};
use crate::diagnostic::{Diagnostic, Severity};

/// Schema version of report.json
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportVersion {
    pub major: u32,
    pub minor: u32,
}

impl ReportVersion {
    pub const CURRENT: ReportVersion = ReportVersion { major: 1, minor: 0 };
}

impl std::fmt::Display for ReportVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Shape of a normalized graph
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    /// Tables, transforms and group placeholders together
    pub nodes: usize,

    /// Distinct edges
    pub edges: usize,

    pub tables: usize,
    pub transforms: usize,

    /// Group placeholders, one per meta step
    pub groups: usize,

    /// Deepest meta nesting level (0 for a flat pipeline)
    pub max_depth: usize,
}

/// Diagnostic counts by severity, plus the graph shape
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total: usize,
    pub errors: usize,
    pub warnings: usize,
    pub info: usize,
    pub graph: GraphStats,
}

/// Validation outcome for one graph file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub version: ReportVersion,

    /// RFC 3339, UTC
    pub timestamp: String,

    pub summary: ReportSummary,
    pub diagnostics: Vec<Diagnostic>,

    /// Input path, id strategy and similar run details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl Report {
    /// Count `diagnostics` by severity and stamp the current time
    pub fn from_diagnostics(diagnostics: Vec<Diagnostic>, graph: GraphStats) -> Self {
        let count = |severity: Severity| diagnostics.iter().filter(|d| d.severity == severity).count();

        let summary = ReportSummary {
            total: diagnostics.len(),
            errors: count(Severity::Error),
            warnings: count(Severity::Warn),
            info: count(Severity::Info),
            graph,
        };

        Self {
            version: ReportVersion::CURRENT,
            timestamp: chrono::Utc::now().to_rfc3339(),
            summary,
            diagnostics,
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn has_errors(&self) -> bool {
        self.summary.errors > 0
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write pretty-printed JSON to `path`
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let json = self.to_json().map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::DiagnosticCode;

    fn stats() -> GraphStats {
        GraphStats { nodes: 3, edges: 2, tables: 2, transforms: 1, groups: 0, max_depth: 0 }
    }

    #[test]
    fn clean_report() {
        let report = Report::from_diagnostics(Vec::new(), stats());

        assert_eq!(report.version, ReportVersion::CURRENT);
        assert_eq!(report.summary.total, 0);
        assert!(!report.has_errors());
    }

    #[test]
    fn summary_counts_by_severity() {
        let diagnostics = vec![
            Diagnostic::new(DiagnosticCode::GraphDanglingEdge, Severity::Error, "Dangling edge"),
            Diagnostic::new(DiagnosticCode::GraphCycle, Severity::Warn, "Cycle"),
            Diagnostic::new(DiagnosticCode::GraphIsolatedStep, Severity::Info, "Isolated step"),
        ];

        let report = Report::from_diagnostics(diagnostics, stats());
        assert_eq!(report.summary.total, 3);
        assert_eq!(report.summary.errors, 1);
        assert_eq!(report.summary.warnings, 1);
        assert_eq!(report.summary.info, 1);
        assert_eq!(report.summary.graph, stats());
        assert!(report.has_errors());
    }

    #[test]
    fn metadata_is_omitted_when_unset() {
        let json = Report::from_diagnostics(Vec::new(), stats()).to_json().unwrap();
        assert!(json.contains("\"max_depth\""));
        assert!(!json.contains("metadata"));

        let json = Report::from_diagnostics(Vec::new(), stats())
            .with_metadata(serde_json::json!({"graph": "graph.json"}))
            .to_json()
            .unwrap();
        assert!(json.contains("\"metadata\""));
    }

    #[test]
    fn save_to_file_writes_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");

        Report::from_diagnostics(Vec::new(), stats()).save_to_file(&path).unwrap();

        let parsed: Report = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed.version, ReportVersion::CURRENT);
        assert_eq!(parsed.summary.graph, stats());
    }
}
