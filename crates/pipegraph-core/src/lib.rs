//! pipegraph core
//!
//! Shared domain types: diagnostic codes, the report format and the
//! `pipegraph.toml` configuration schema.
//! Never rename diagnostic codes - they are part of the public API.

pub mod diagnostic;
pub mod report;
pub mod config;

pub use diagnostic::{Diagnostic, DiagnosticCode, Severity};
pub use report::{GraphStats, Report, ReportSummary, ReportVersion};
pub use config::{Config, ConfigError, FilterConfig, IdStrategy, SeverityThreshold};
