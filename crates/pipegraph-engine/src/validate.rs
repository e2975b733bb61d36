//! Graph validation
//!
//! The normalizer itself accepts anything. These checks report the shapes
//! that render wrongly: dangling edges, ids shared by different kinds of
//! node, duplicate steps and data-flow cycles.

use pipegraph_core::{Diagnostic, DiagnosticCode, IdStrategy, SeverityThreshold};
use pipegraph_model::{GraphData, PipelineStep};
use std::collections::{BTreeMap, BTreeSet};

use crate::lineage::LineageGraph;
use crate::normalize::{NodeKind, NormalizedGraph};

/// Produces diagnostics for a graph and its normalized form
#[derive(Debug, Clone, Default)]
pub struct Validator {
    id_strategy: IdStrategy,
    severity: SeverityThreshold,
}

impl Validator {
    pub fn new(id_strategy: IdStrategy) -> Self {
        Self {
            id_strategy,
            severity: SeverityThreshold::default(),
        }
    }

    pub fn with_severity(mut self, severity: SeverityThreshold) -> Self {
        self.severity = severity;
        self
    }

    /// Run every check. `normalized` must come from `graph` under the same id strategy.
    pub fn validate(&self, graph: &GraphData, normalized: &NormalizedGraph) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();

        self.check_dangling_edges(normalized, &mut diagnostics);
        self.check_id_collisions(graph, &mut diagnostics);
        self.check_duplicate_steps(graph, &mut diagnostics);
        self.check_cycles(normalized, &mut diagnostics);
        self.check_step_shapes(graph, &mut diagnostics);

        tracing::debug!(count = diagnostics.len(), "validation finished");

        diagnostics
    }

    fn diagnostic(&self, code: DiagnosticCode, message: String) -> Diagnostic {
        let severity = self.severity.get_severity(code, code.default_severity());
        Diagnostic::new(code, severity, message)
    }

    fn check_dangling_edges(&self, normalized: &NormalizedGraph, out: &mut Vec<Diagnostic>) {
        for edge in normalized.dangling_edges() {
            let missing: Vec<String> = [&edge.source, &edge.target]
                .into_iter()
                .filter(|id| !normalized.contains(id))
                .cloned()
                .collect();

            // Report against the endpoint that does exist (the transform, usually)
            let anchor = if normalized.contains(&edge.source) { &edge.source } else { &edge.target };

            out.push(
                self.diagnostic(
                    DiagnosticCode::GraphDanglingEdge,
                    format!(
                        "Edge '{}' -> '{}' references unknown node(s): {}",
                        edge.source,
                        edge.target,
                        missing.join(", ")
                    ),
                )
                .with_node(anchor.clone())
                .with_related(missing),
            );
        }
    }

    fn check_id_collisions(&self, graph: &GraphData, out: &mut Vec<Diagnostic>) {
        let mut kinds: BTreeMap<String, BTreeSet<NodeKind>> = BTreeMap::new();
        self.collect_kinds(graph, &mut kinds);

        for (id, kinds) in kinds {
            if kinds.len() < 2 {
                continue;
            }

            let names: Vec<String> = kinds.iter().map(|k| k.to_string()).collect();
            out.push(
                self.diagnostic(
                    DiagnosticCode::GraphIdCollision,
                    format!("Id '{}' is used by more than one kind of node: {}", id, names.join(", ")),
                )
                .with_node(id)
                .with_related(names),
            );
        }
    }

    fn collect_kinds(&self, graph: &GraphData, kinds: &mut BTreeMap<String, BTreeSet<NodeKind>>) {
        let mut record = |kind: NodeKind, name: &str| {
            kinds
                .entry(kind.node_id(self.id_strategy, name))
                .or_default()
                .insert(kind);
        };

        for table in graph.catalog.keys() {
            record(NodeKind::Table, table.as_str());
        }

        let mut nested = Vec::new();
        for step in &graph.pipeline {
            match step {
                PipelineStep::Transform(transform) => record(NodeKind::Transform, transform.name.as_str()),
                PipelineStep::Meta(meta) => {
                    record(NodeKind::Group, meta.name.as_str());
                    nested.push(&meta.graph);
                }
            }
        }

        for graph in nested {
            self.collect_kinds(graph, kinds);
        }
    }

    fn check_duplicate_steps(&self, graph: &GraphData, out: &mut Vec<Diagnostic>) {
        let mut seen: BTreeMap<(&'static str, &str), Vec<String>> = BTreeMap::new();

        for scoped in graph.scoped_steps() {
            seen.entry((scoped.step.kind(), scoped.step.name()))
                .or_default()
                .push(scoped.scope.join("/"));
        }

        for ((kind, name), scopes) in seen {
            if scopes.len() < 2 {
                continue;
            }

            out.push(
                self.diagnostic(
                    DiagnosticCode::GraphDuplicateStep,
                    format!("{} step '{}' is declared {} times", kind, name, scopes.len()),
                )
                .with_node(name),
            );
        }
    }

    fn check_cycles(&self, normalized: &NormalizedGraph, out: &mut Vec<Diagnostic>) {
        let members = LineageGraph::from_normalized(normalized).cycle_members();
        if members.is_empty() {
            return;
        }

        out.push(
            self.diagnostic(
                DiagnosticCode::GraphCycle,
                format!("Data flow contains a cycle through {} node(s)", members.len()),
            )
            .with_related(members),
        );
    }

    fn check_step_shapes(&self, graph: &GraphData, out: &mut Vec<Diagnostic>) {
        for scoped in graph.scoped_steps() {
            let scope: Vec<String> = scoped.scope.iter().map(|s| s.to_string()).collect();

            match scoped.step {
                PipelineStep::Transform(transform)
                    if transform.inputs.is_empty() && transform.outputs.is_empty() =>
                {
                    out.push(
                        self.diagnostic(
                            DiagnosticCode::GraphIsolatedStep,
                            format!("Transform '{}' has no inputs and no outputs", transform.name),
                        )
                        .with_node(NodeKind::Transform.node_id(self.id_strategy, &transform.name))
                        .with_scope(scope),
                    );
                }
                PipelineStep::Meta(meta) if meta.graph.is_empty() => {
                    out.push(
                        self.diagnostic(
                            DiagnosticCode::GraphEmptyGroup,
                            format!("Meta step '{}' contains no tables and no steps", meta.name),
                        )
                        .with_node(NodeKind::Group.node_id(self.id_strategy, &meta.name))
                        .with_scope(scope),
                    );
                }
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::Normalizer;
    use pipegraph_core::Severity;

    fn check(json: &str, strategy: IdStrategy) -> Vec<Diagnostic> {
        let graph = GraphData::from_json(json).unwrap();
        let normalized = Normalizer::new().with_id_strategy(strategy).normalize(&graph);
        Validator::new(strategy).validate(&graph, &normalized)
    }

    fn codes(diagnostics: &[Diagnostic]) -> Vec<DiagnosticCode> {
        diagnostics.iter().map(|d| d.code).collect()
    }

    #[test]
    fn clean_graph_has_no_diagnostics() {
        let diagnostics = check(
            r#"{"catalog": {"A": {}, "B": {}},
                "pipeline": [{"type": "transform", "name": "T1", "inputs": ["A"], "outputs": ["B"]}]}"#,
            IdStrategy::Plain,
        );
        assert!(diagnostics.is_empty(), "{:?}", diagnostics);
    }

    #[test]
    fn dangling_edge_is_an_error() {
        let diagnostics = check(
            r#"{"catalog": {"A": {}},
                "pipeline": [{"type": "transform", "name": "T1", "inputs": ["A"], "outputs": ["ghost"]}]}"#,
            IdStrategy::Plain,
        );

        assert_eq!(codes(&diagnostics), vec![DiagnosticCode::GraphDanglingEdge]);
        assert_eq!(diagnostics[0].severity, Severity::Error);
        assert_eq!(diagnostics[0].node.as_deref(), Some("T1"));
        assert_eq!(diagnostics[0].related, vec!["ghost".to_string()]);
    }

    #[test]
    fn table_and_transform_sharing_a_name_collide() {
        let json = r#"{"catalog": {"orders": {}, "raw": {}},
            "pipeline": [{"type": "transform", "name": "orders", "inputs": ["raw"], "outputs": []}]}"#;

        let plain = check(json, IdStrategy::Plain);
        assert!(codes(&plain).contains(&DiagnosticCode::GraphIdCollision));

        let namespaced = check(json, IdStrategy::Namespaced);
        assert!(!codes(&namespaced).contains(&DiagnosticCode::GraphIdCollision));
    }

    #[test]
    fn duplicate_transform_names_warn() {
        let diagnostics = check(
            r#"{"catalog": {"A": {}},
                "pipeline": [
                    {"type": "transform", "name": "T1", "inputs": ["A"]},
                    {"type": "meta", "name": "G", "graph": {"pipeline": [
                        {"type": "transform", "name": "T1", "inputs": ["A"]}
                    ]}}
                ]}"#,
            IdStrategy::Plain,
        );

        assert_eq!(codes(&diagnostics), vec![DiagnosticCode::GraphDuplicateStep]);
        assert_eq!(diagnostics[0].severity, Severity::Warn);
    }

    #[test]
    fn cycle_is_reported() {
        let diagnostics = check(
            r#"{"catalog": {"A": {}, "B": {}},
                "pipeline": [
                    {"type": "transform", "name": "T1", "inputs": ["A"], "outputs": ["B"]},
                    {"type": "transform", "name": "T2", "inputs": ["B"], "outputs": ["A"]}
                ]}"#,
            IdStrategy::Plain,
        );

        assert_eq!(codes(&diagnostics), vec![DiagnosticCode::GraphCycle]);
        assert_eq!(diagnostics[0].related.len(), 4);
    }

    #[test]
    fn cycle_excludes_nodes_fed_by_it() {
        let diagnostics = check(
            r#"{"catalog": {"A": {}, "B": {}, "C": {}},
                "pipeline": [
                    {"type": "transform", "name": "T1", "inputs": ["A"], "outputs": ["B"]},
                    {"type": "transform", "name": "T2", "inputs": ["B"], "outputs": ["A", "C"]}
                ]}"#,
            IdStrategy::Plain,
        );

        assert_eq!(codes(&diagnostics), vec![DiagnosticCode::GraphCycle]);
        assert_eq!(diagnostics[0].related, vec!["A", "B", "T1", "T2"]);
        assert!(diagnostics[0].message.contains("4 node(s)"));
    }

    #[test]
    fn isolated_step_and_empty_group_are_info() {
        let diagnostics = check(
            r#"{"pipeline": [
                {"type": "transform", "name": "noop"},
                {"type": "meta", "name": "G", "graph": {}}
            ]}"#,
            IdStrategy::Plain,
        );

        assert_eq!(
            codes(&diagnostics),
            vec![DiagnosticCode::GraphIsolatedStep, DiagnosticCode::GraphEmptyGroup]
        );
        assert!(diagnostics.iter().all(|d| d.severity == Severity::Info));
    }

    #[test]
    fn severity_override_applies() {
        let graph = GraphData::from_json(r#"{"pipeline": [{"type": "transform", "name": "noop"}]}"#).unwrap();
        let normalized = Normalizer::new().normalize(&graph);

        let mut severity = SeverityThreshold::default();
        severity.set_override(DiagnosticCode::GraphIsolatedStep, Severity::Error);

        let diagnostics = Validator::new(IdStrategy::Plain)
            .with_severity(severity)
            .validate(&graph, &normalized);

        assert_eq!(diagnostics[0].severity, Severity::Error);
    }

    #[test]
    fn nested_diagnostics_carry_scope() {
        let diagnostics = check(
            r#"{"pipeline": [{"type": "meta", "name": "G", "graph": {"pipeline": [
                {"type": "transform", "name": "noop"}
            ]}}]}"#,
            IdStrategy::Plain,
        );

        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].scope, vec!["G".to_string()]);
    }
}
