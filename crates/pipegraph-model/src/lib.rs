//! Pipeline graph description
//!
//! This crate handles:
//! - Parsing the graph JSON served by the catalog backend (`catalog` + `pipeline`)
//! - Typed access to tables, transforms and nested meta steps
//! - Selecting steps by name prefix and labels

pub mod graph;
pub mod filter;

pub use graph::{GraphData, GraphError, Label, MetaStep, PipeTable, PipelineStep, ScopedStep, TransformStep};
pub use filter::StepFilter;
