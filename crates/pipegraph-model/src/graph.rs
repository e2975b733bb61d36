//! Graph description parsing
//!
//! Mirrors the JSON document returned by the backend `/graph` endpoint: a
//! `catalog` of tables keyed by name and an ordered `pipeline` of steps.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

/// A step label, `(key, value)`
pub type Label = (String, String);

/// Catalog + pipeline pair, possibly nested inside a meta step
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphData {
    /// Tables keyed by name, in document order
    #[serde(default)]
    pub catalog: IndexMap<String, PipeTable>,

    /// Pipeline steps in declaration order
    #[serde(default)]
    pub pipeline: Vec<PipelineStep>,
}

impl GraphData {
    /// Load a graph description from file
    pub fn from_file(path: &Path) -> Result<Self, GraphError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| GraphError::IoError(path.display().to_string(), e.to_string()))?;

        Self::from_json(&contents)
    }

    /// Parse a graph description from a JSON string
    pub fn from_json(json: &str) -> Result<Self, GraphError> {
        serde_json::from_str(json)
            .map_err(|e| GraphError::ParseError(e.to_string()))
    }

    /// True when there are no tables and no steps
    pub fn is_empty(&self) -> bool {
        self.catalog.is_empty() && self.pipeline.is_empty()
    }

    /// Deepest meta nesting level (0 when no step is a meta step)
    pub fn depth(&self) -> usize {
        self.pipeline
            .iter()
            .filter_map(|step| match step {
                PipelineStep::Meta(meta) => Some(1 + meta.graph.depth()),
                PipelineStep::Transform(_) => None,
            })
            .max()
            .unwrap_or(0)
    }

    /// Every step at every nesting level, depth-first in declaration order
    pub fn scoped_steps(&self) -> Vec<ScopedStep<'_>> {
        let mut out = Vec::new();
        collect_steps(self, &mut Vec::new(), &mut out);
        out
    }
}

fn collect_steps<'a>(graph: &'a GraphData, scope: &mut Vec<&'a str>, out: &mut Vec<ScopedStep<'a>>) {
    for step in &graph.pipeline {
        out.push(ScopedStep {
            scope: scope.clone(),
            step,
        });

        if let PipelineStep::Meta(meta) = step {
            scope.push(&meta.name);
            collect_steps(&meta.graph, scope, out);
            scope.pop();
        }
    }
}

/// A step together with the names of its enclosing meta steps
#[derive(Debug, Clone, PartialEq)]
pub struct ScopedStep<'a> {
    /// Enclosing meta step names, outermost first
    pub scope: Vec<&'a str>,

    /// The step itself
    pub step: &'a PipelineStep,
}

/// Table description from the catalog
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipeTable {
    /// Backend identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Display name (usually equal to the catalog key)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Primary key columns, in order
    #[serde(default)]
    pub indexes: Vec<String>,

    /// Row count
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,

    /// Storage class label (e.g. `TableStoreDB`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_class: Option<String>,

    /// Any other attributes sent by the backend
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PipeTable {
    /// Attribute record used as node data
    pub fn attributes(&self) -> Map<String, Value> {
        let mut attrs = Map::new();

        if let Some(id) = &self.id {
            attrs.insert("id".to_string(), Value::from(id.as_str()));
        }
        if let Some(name) = &self.name {
            attrs.insert("name".to_string(), Value::from(name.as_str()));
        }
        attrs.insert("indexes".to_string(), Value::from(self.indexes.clone()));
        if let Some(size) = self.size {
            attrs.insert("size".to_string(), Value::from(size));
        }
        if let Some(store_class) = &self.store_class {
            attrs.insert("store_class".to_string(), Value::from(store_class.as_str()));
        }

        for (key, value) in &self.extra {
            attrs.insert(key.clone(), value.clone());
        }

        attrs
    }
}

/// A pipeline step, discriminated by its `type` field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PipelineStep {
    /// Consumes input tables and produces output tables
    Transform(TransformStep),

    /// Groups a nested catalog + pipeline under one parent node
    Meta(MetaStep),
}

impl PipelineStep {
    /// Step name, used as its node id
    pub fn name(&self) -> &str {
        match self {
            Self::Transform(step) => &step.name,
            Self::Meta(step) => &step.name,
        }
    }

    /// The `type` discriminator as it appears in JSON
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transform(_) => "transform",
            Self::Meta(_) => "meta",
        }
    }
}

/// Transform step
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformStep {
    /// Step name (unique across the pipeline)
    pub name: String,

    /// Backend identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Function label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub func: Option<String>,

    /// Input table names
    #[serde(default)]
    pub inputs: Vec<String>,

    /// Output table names
    #[serde(default)]
    pub outputs: Vec<String>,

    /// `(key, value)` labels used for step selection
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<Label>,

    /// Any other attributes sent by the backend (`transform_type`, `indexes`, counters)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TransformStep {
    /// Create a transform with the given wiring and no other attributes
    pub fn new(name: impl Into<String>, inputs: &[&str], outputs: &[&str]) -> Self {
        Self {
            name: name.into(),
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            outputs: outputs.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    /// Check whether the step carries a label
    pub fn has_label(&self, key: &str, value: &str) -> bool {
        self.labels.iter().any(|(k, v)| k == key && v == value)
    }

    /// Attribute record used as node data: everything but `inputs` and `outputs`
    pub fn attributes(&self) -> Map<String, Value> {
        let mut attrs = Map::new();

        if let Some(id) = &self.id {
            attrs.insert("id".to_string(), Value::from(id.as_str()));
        }
        attrs.insert("name".to_string(), Value::from(self.name.as_str()));
        if let Some(func) = &self.func {
            attrs.insert("func".to_string(), Value::from(func.as_str()));
        }
        if !self.labels.is_empty() {
            let labels = self
                .labels
                .iter()
                .map(|(k, v)| Value::from(vec![k.as_str(), v.as_str()]))
                .collect::<Vec<_>>();
            attrs.insert("labels".to_string(), Value::Array(labels));
        }

        for (key, value) in &self.extra {
            attrs.insert(key.clone(), value.clone());
        }

        attrs
    }
}

/// Meta step wrapping a nested graph
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetaStep {
    /// Group name, used as the parent id of everything nested inside
    pub name: String,

    /// Backend identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Nested catalog + pipeline
    #[serde(default)]
    pub graph: GraphData,
}

/// Graph loading errors
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("Failed to read graph file '{0}': {1}")]
    IoError(String, String),

    #[error("Failed to parse graph JSON: {0}")]
    ParseError(String),
}
