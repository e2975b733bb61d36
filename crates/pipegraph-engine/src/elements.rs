//! Renderer element list
//!
//! Cytoscape takes a flat list of node and edge definitions; each carries its
//! payload under `data`, and node data must include the node `id`.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::normalize::{Edge, NodeData, NormalizedGraph};

/// One renderer element
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "group")]
pub enum Element {
    #[serde(rename = "nodes")]
    Node {
        selectable: bool,
        data: Map<String, Value>,
    },

    #[serde(rename = "edges")]
    Edge {
        grabbable: bool,
        data: Edge,
    },
}

impl Element {
    fn node(id: &str, node: &NodeData) -> Self {
        let mut data = Map::new();
        data.insert("id".to_string(), Value::from(id));
        data.insert(
            "label".to_string(),
            Value::from(node.name().unwrap_or(id)),
        );
        data.insert("type".to_string(), Value::from(node.kind.as_str()));
        if let Some(parent) = &node.parent {
            data.insert("parent".to_string(), Value::from(parent.as_str()));
        }

        for (key, value) in &node.attributes {
            // the map key is the renderer id; a backend `id` attribute must not shadow it
            if key == "id" || key == "label" {
                continue;
            }
            data.insert(key.clone(), value.clone());
        }

        Self::Node {
            selectable: node.is_selectable(),
            data,
        }
    }
}

/// Nodes in insertion order, then edges in sorted order
pub fn to_elements(graph: &NormalizedGraph) -> Vec<Element> {
    let nodes = graph.nodes.iter().map(|(id, node)| Element::node(id, node));
    let edges = graph.edges.iter().map(|edge| Element::Edge {
        grabbable: false,
        data: edge.clone(),
    });

    nodes.chain(edges).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;
    use pipegraph_model::GraphData;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn elements_for_simple_pipeline() {
        let graph = GraphData::from_json(
            r#"{"catalog": {"A": {"name": "A", "indexes": ["id"]}},
                "pipeline": [{"type": "transform", "name": "T1", "id": "step-1", "inputs": ["A"], "transform_type": "BatchTransformStep"}]}"#,
        )
        .unwrap();

        let elements = serde_json::to_value(to_elements(&normalize(&graph))).unwrap();

        assert_eq!(
            elements,
            json!([
                {"group": "nodes", "selectable": true, "data": {"id": "A", "label": "A", "type": "table", "name": "A", "indexes": ["id"]}},
                {"group": "nodes", "selectable": true, "data": {"id": "T1", "label": "T1", "type": "transform", "name": "T1", "transform_type": "BatchTransformStep"}},
                {"group": "edges", "grabbable": false, "data": {"source": "A", "target": "T1"}}
            ])
        );
    }

    #[test]
    fn group_placeholder_is_not_selectable() {
        let graph = GraphData::from_json(
            r#"{"pipeline": [{"type": "meta", "name": "G", "graph": {"catalog": {"C": {}}}}]}"#,
        )
        .unwrap();

        let elements = to_elements(&normalize(&graph));
        assert_eq!(elements.len(), 2);

        let Element::Node { selectable, data } = &elements[0] else {
            panic!("expected a node");
        };
        assert!(!selectable);
        assert_eq!(data["id"], "G");
        assert_eq!(data["type"], "group");

        let Element::Node { data, .. } = &elements[1] else {
            panic!("expected a node");
        };
        assert_eq!(data["parent"], "G");
        assert_eq!(data["label"], "C");
    }
}
