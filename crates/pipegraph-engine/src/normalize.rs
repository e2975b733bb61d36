//! Graph normalization
//!
//! Turns a nested catalog + pipeline description into a flat node map and
//! an edge set that a graph renderer consumes directly. Meta steps become
//! non-selectable group nodes; everything declared inside them points at
//! the group through `parent`.

use indexmap::IndexMap;
use pipegraph_core::{Config, Diagnostic, GraphStats, IdStrategy, Severity, SeverityThreshold};
use pipegraph_model::{GraphData, PipelineStep};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

use crate::validate::Validator;

/// Keys owned by the typed fields of [`NodeData`]
const RESERVED_KEYS: [&str; 3] = ["type", "parent", "selectable"];

/// What a node stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// Catalog table
    Table,

    /// Transform step
    Transform,

    /// Placeholder anchoring the contents of a meta step
    Group,
}

impl NodeKind {
    /// Lowercase name, as serialized
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::Transform => "transform",
            Self::Group => "group",
        }
    }

    /// Node id for a table/step name under the given strategy
    pub fn node_id(&self, strategy: IdStrategy, name: &str) -> String {
        match strategy {
            IdStrategy::Plain => name.to_string(),
            IdStrategy::Namespaced => format!("{}:{}", self.as_str(), name),
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attribute record of one node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
    /// Node kind, serialized as `type`
    #[serde(rename = "type")]
    pub kind: NodeKind,

    /// Enclosing group id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,

    /// Set to `false` on group placeholders
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selectable: Option<bool>,

    /// Catalog or step attributes
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl NodeData {
    /// Empty node of the given kind
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            parent: None,
            selectable: None,
            attributes: Map::new(),
        }
    }

    /// Non-selectable group placeholder
    pub fn placeholder(name: &str, parent: Option<String>) -> Self {
        let mut node = Self::new(NodeKind::Group);
        node.selectable = Some(false);
        node.parent = parent;
        node.attributes.insert("name".to_string(), Value::from(name));
        node
    }

    /// Merge attributes over the existing ones; later values win
    pub fn merge(&mut self, attributes: Map<String, Value>) {
        for (key, value) in attributes {
            if RESERVED_KEYS.contains(&key.as_str()) {
                continue;
            }
            self.attributes.insert(key, value);
        }
    }

    /// The `name` attribute, if it is a string
    pub fn name(&self) -> Option<&str> {
        self.attributes.get("name").and_then(Value::as_str)
    }

    /// Whether the renderer should let the user select this node
    pub fn is_selectable(&self) -> bool {
        self.selectable.unwrap_or(true)
    }
}

/// Directed edge between two node ids
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
}

impl Edge {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

/// Flat nodes and edges produced by one normalization pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedGraph {
    /// Nodes keyed by id, in first-insertion order
    pub nodes: IndexMap<String, NodeData>,

    /// Distinct edges
    pub edges: BTreeSet<Edge>,

    /// Deepest meta nesting level reached
    #[serde(default)]
    pub max_depth: usize,
}

impl NormalizedGraph {
    /// Look up a node
    pub fn node(&self, id: &str) -> Option<&NodeData> {
        self.nodes.get(id)
    }

    /// Check whether a node id exists
    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Ids of the nodes whose parent is `group`
    pub fn children_of(&self, group: &str) -> Vec<&str> {
        self.nodes
            .iter()
            .filter(|(_, node)| node.parent.as_deref() == Some(group))
            .map(|(id, _)| id.as_str())
            .collect()
    }

    /// Edges with an endpoint missing from the node map
    pub fn dangling_edges(&self) -> Vec<&Edge> {
        self.edges
            .iter()
            .filter(|edge| !self.contains(&edge.source) || !self.contains(&edge.target))
            .collect()
    }

    /// Node/edge counts for reporting
    pub fn stats(&self) -> GraphStats {
        let count = |kind: NodeKind| self.nodes.values().filter(|n| n.kind == kind).count();

        GraphStats {
            nodes: self.nodes.len(),
            edges: self.edges.len(),
            tables: count(NodeKind::Table),
            transforms: count(NodeKind::Transform),
            groups: count(NodeKind::Group),
            max_depth: self.max_depth,
        }
    }
}

/// A normalized graph together with its validation diagnostics
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub graph: NormalizedGraph,
    pub diagnostics: Vec<Diagnostic>,
}

impl Normalized {
    /// Number of error-level diagnostics
    pub fn error_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.severity == Severity::Error).count()
    }
}

/// Normalization errors
#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error("Graph failed validation with {errors} error(s)")]
    Invalid {
        errors: usize,
        diagnostics: Vec<Diagnostic>,
    },
}

/// Normalizes graph descriptions with a fixed id strategy and validation policy
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    id_strategy: IdStrategy,
    strict: bool,
    severity: SeverityThreshold,
}

impl Normalizer {
    /// Plain ids, permissive
    pub fn new() -> Self {
        Self::default()
    }

    /// Take id strategy, strictness and severity overrides from config
    pub fn from_config(config: &Config) -> Self {
        Self {
            id_strategy: config.id_strategy,
            strict: config.strict,
            severity: config.severity.clone(),
        }
    }

    pub fn with_id_strategy(mut self, id_strategy: IdStrategy) -> Self {
        self.id_strategy = id_strategy;
        self
    }

    /// Fail on error-level diagnostics instead of returning them
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_severity(mut self, severity: SeverityThreshold) -> Self {
        self.severity = severity;
        self
    }

    pub fn id_strategy(&self) -> IdStrategy {
        self.id_strategy
    }

    /// Flatten without validating. Never fails; malformed input yields
    /// dangling edges or merged nodes.
    pub fn normalize(&self, graph: &GraphData) -> NormalizedGraph {
        let mut out = NormalizedGraph::default();
        self.process(&mut out, graph, &mut Vec::new());

        tracing::debug!(
            nodes = out.nodes.len(),
            edges = out.edges.len(),
            depth = out.max_depth,
            "normalized graph"
        );

        out
    }

    /// Flatten and validate
    ///
    /// In strict mode any error-level diagnostic turns into
    /// [`NormalizeError::Invalid`].
    pub fn run(&self, graph: &GraphData) -> Result<Normalized, NormalizeError> {
        let normalized = self.normalize(graph);
        let diagnostics = Validator::new(self.id_strategy)
            .with_severity(self.severity.clone())
            .validate(graph, &normalized);

        let result = Normalized {
            graph: normalized,
            diagnostics,
        };

        let errors = result.error_count();
        if errors > 0 {
            tracing::warn!(errors, strict = self.strict, "graph has validation errors");

            if self.strict {
                return Err(NormalizeError::Invalid {
                    errors,
                    diagnostics: result.diagnostics,
                });
            }
        }

        Ok(result)
    }

    /// `groups` holds the ids of the enclosing meta steps, innermost last
    fn process(&self, out: &mut NormalizedGraph, graph: &GraphData, groups: &mut Vec<String>) {
        let grouped = groups.last().cloned();

        if let Some(group) = &grouped {
            let enclosing = groups.len().checked_sub(2).map(|i| groups[i].clone());
            let name = group_name(group, self.id_strategy);

            tracing::debug!(
                group = %group,
                tables = graph.catalog.len(),
                steps = graph.pipeline.len(),
                "entering nested graph"
            );

            out.nodes.insert(group.clone(), NodeData::placeholder(name, enclosing));
            out.max_depth = out.max_depth.max(groups.len());
        }

        for (table, properties) in &graph.catalog {
            let id = NodeKind::Table.node_id(self.id_strategy, table);
            let node = out
                .nodes
                .entry(id)
                .or_insert_with(|| NodeData::new(NodeKind::Table));

            node.kind = NodeKind::Table;
            node.merge(properties.attributes());
            if let Some(group) = &grouped {
                node.parent = Some(group.clone());
            }
        }

        for step in &graph.pipeline {
            match step {
                PipelineStep::Transform(transform) => {
                    let id = NodeKind::Transform.node_id(self.id_strategy, &transform.name);

                    let mut node = NodeData::new(NodeKind::Transform);
                    node.merge(transform.attributes());
                    node.parent = grouped.clone();
                    out.nodes.insert(id.clone(), node);

                    for input in &transform.inputs {
                        out.edges.insert(Edge::new(
                            NodeKind::Table.node_id(self.id_strategy, input),
                            id.clone(),
                        ));
                    }

                    for output in &transform.outputs {
                        out.edges.insert(Edge::new(
                            id.clone(),
                            NodeKind::Table.node_id(self.id_strategy, output),
                        ));
                    }
                }
                PipelineStep::Meta(meta) => {
                    groups.push(NodeKind::Group.node_id(self.id_strategy, &meta.name));
                    self.process(out, &meta.graph, groups);
                    groups.pop();
                }
            }
        }
    }
}

/// Strip the kind prefix a namespaced group id carries
fn group_name(id: &str, strategy: IdStrategy) -> &str {
    match strategy {
        IdStrategy::Plain => id,
        IdStrategy::Namespaced => id.strip_prefix("group:").unwrap_or(id),
    }
}

/// Flatten `graph` with plain ids and no validation
pub fn normalize(graph: &GraphData) -> NormalizedGraph {
    Normalizer::new().normalize(graph)
}
