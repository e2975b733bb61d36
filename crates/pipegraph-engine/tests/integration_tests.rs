//! Integration tests for normalization, validation and lineage over the fixture graph

use pipegraph_core::{Config, DiagnosticCode, IdStrategy, Severity};
use pipegraph_engine::{normalize, to_elements, LineageGraph, NodeKind, Normalizer};
use pipegraph_model::{GraphData, PipelineStep, StepFilter};
use pretty_assertions::assert_eq;
use std::collections::BTreeSet;
use std::path::Path;

fn fixture() -> GraphData {
    GraphData::from_file(Path::new("../../fixtures/graph.json")).unwrap()
}

#[test]
fn node_count_matches_catalog_and_transforms() {
    let graph = fixture();
    let out = normalize(&graph);

    let mut expected: BTreeSet<String> = BTreeSet::new();
    let mut edge_total = BTreeSet::new();
    collect(&graph, &mut expected, &mut edge_total);

    let actual: BTreeSet<String> = out
        .nodes
        .iter()
        .filter(|(_, n)| n.kind != NodeKind::Group)
        .map(|(id, _)| id.clone())
        .collect();

    assert_eq!(actual, expected);
    assert_eq!(out.edges.len(), edge_total.len());
}

fn collect(graph: &GraphData, nodes: &mut BTreeSet<String>, edges: &mut BTreeSet<(String, String)>) {
    nodes.extend(graph.catalog.keys().cloned());
    for step in &graph.pipeline {
        match step {
            PipelineStep::Transform(t) => {
                nodes.insert(t.name.clone());
                edges.extend(t.inputs.iter().map(|i| (i.clone(), t.name.clone())));
                edges.extend(t.outputs.iter().map(|o| (t.name.clone(), o.clone())));
            }
            PipelineStep::Meta(m) => collect(&m.graph, nodes, edges),
        }
    }
}

#[test]
fn every_nested_node_points_at_its_group() {
    let out = normalize(&fixture());

    for id in ["offer_clicks", "count_clicks", "export_clicks"] {
        assert_eq!(out.nodes[id].parent.as_deref(), Some("offers"), "node {}", id);
    }
    for id in ["events", "user_profile", "user_lang", "agg_profile", "offers"] {
        assert_eq!(out.nodes[id].parent, None, "node {}", id);
    }
    assert!(!out.nodes["offers"].is_selectable());
}

#[test]
fn fixture_is_valid() {
    let result = Normalizer::new().strict(true).run(&fixture()).unwrap();

    assert_eq!(result.error_count(), 0);
    assert!(result.diagnostics.iter().all(|d| d.severity < Severity::Error));
    assert_eq!(result.graph.stats().max_depth, 1);
}

#[test]
fn config_drives_the_normalizer() {
    let config = Config::from_toml("id_strategy = \"namespaced\"\nstrict = true").unwrap();
    let normalizer = Normalizer::from_config(&config);
    assert_eq!(normalizer.id_strategy(), IdStrategy::Namespaced);

    let result = normalizer.run(&fixture()).unwrap();
    assert!(result.graph.contains("table:events"));
    assert!(result.graph.contains("transform:count_clicks"));
    assert_eq!(
        result.graph.nodes["table:offer_clicks"].parent.as_deref(),
        Some("group:offers")
    );
}

#[test]
fn filtering_removes_nodes_but_keeps_tables() {
    let filtered = StepFilter::new().with_prefix("count").apply(&fixture());
    let out = normalize(&filtered);

    assert!(out.contains("count_clicks"));
    assert!(!out.contains("agg_profile"));
    assert!(!out.contains("export_clicks"));
    assert!(out.contains("user_lang"));
}

#[test]
fn filtering_out_a_producer_keeps_grouped_tables() {
    let graph = GraphData::from_json(
        r#"{"catalog": {"A": {}},
            "pipeline": [
                {"type": "meta", "name": "G", "graph": {
                    "catalog": {"C": {}},
                    "pipeline": [{"type": "transform", "name": "make_c", "inputs": ["A"], "outputs": ["C"]}]
                }},
                {"type": "transform", "name": "use_c", "inputs": ["C"]}
            ]}"#,
    )
    .unwrap();

    let filtered = StepFilter::new().with_prefix("use").apply(&graph);
    let result = Normalizer::new().strict(true).run(&filtered).unwrap();

    assert!(result.graph.contains("C"));
    assert_eq!(result.graph.nodes["C"].parent.as_deref(), Some("G"));
    assert!(!result.graph.contains("make_c"));
    assert!(result.graph.dangling_edges().is_empty());
    assert!(result
        .diagnostics
        .iter()
        .all(|d| d.code != DiagnosticCode::GraphDanglingEdge));
}

#[test]
fn filter_fixture_by_prefix_has_no_dangling_edges() {
    let filtered = StepFilter::new().with_prefix("agg").apply(&fixture());
    let out = normalize(&filtered);

    assert!(out.contains("offer_clicks"));
    assert!(out.contains("offers"));
    assert!(out.dangling_edges().is_empty());
}

#[test]
fn lineage_over_fixture() {
    let out = normalize(&fixture());
    let lineage = LineageGraph::from_normalized(&out);

    let downstream: BTreeSet<_> = lineage.downstream("user_profile").into_iter().collect();
    let expected: BTreeSet<String> = ["count_clicks", "offer_clicks", "export_clicks"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    assert_eq!(downstream, expected);

    assert!(lineage.has_path("events", "export_clicks"));
    assert!(lineage.topological_sort().is_some());
}

#[test]
fn element_list_has_every_node_and_edge() {
    let out = normalize(&fixture());
    let elements = to_elements(&out);

    assert_eq!(elements.len(), out.nodes.len() + out.edges.len());
}

#[test]
fn strict_mode_reports_collisions() {
    let graph = GraphData::from_json(
        r#"{"catalog": {"orders": {}},
            "pipeline": [{"type": "transform", "name": "orders", "inputs": ["orders"]}]}"#,
    )
    .unwrap();

    let err = Normalizer::new().strict(true).run(&graph).unwrap_err();
    let pipegraph_engine::NormalizeError::Invalid { diagnostics, .. } = err;
    assert!(diagnostics.iter().any(|d| d.code == DiagnosticCode::GraphIdCollision));
}
