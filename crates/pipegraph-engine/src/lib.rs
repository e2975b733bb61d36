//! Graph normalization engine
//!
//! Flattens a nested catalog + pipeline description into uniquely
//! identified nodes and directed edges, validates the result and answers
//! lineage queries over it.

pub mod normalize;
pub mod validate;
pub mod lineage;
pub mod elements;

pub use normalize::{normalize, Edge, NodeData, NodeKind, NormalizeError, NormalizedGraph, Normalizer, Normalized};
pub use validate::Validator;
pub use lineage::{LineageGraph, NodeId};
pub use elements::{to_elements, Element};
