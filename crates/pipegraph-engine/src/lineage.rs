//! Lineage graph construction and traversal
//!
//! Builds forward and reverse adjacency over the normalized edges for
//! upstream/downstream queries.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

use crate::normalize::NormalizedGraph;

/// Node identifier (key of the normalized node map)
pub type NodeId = String;

/// Data-flow graph with forward and reverse edges
#[derive(Debug, Clone, Default)]
pub struct LineageGraph {
    /// Reverse edges: node -> nodes feeding it
    parents: BTreeMap<NodeId, Vec<NodeId>>,

    /// Forward edges: node -> nodes it feeds
    children: BTreeMap<NodeId, Vec<NodeId>>,

    /// All nodes, including dangling edge endpoints
    nodes: BTreeSet<NodeId>,
}

impl LineageGraph {
    /// Build from a normalized graph
    pub fn from_normalized(graph: &NormalizedGraph) -> Self {
        let mut lineage = Self::default();

        for id in graph.nodes.keys() {
            lineage.nodes.insert(id.clone());
        }

        for edge in &graph.edges {
            lineage.nodes.insert(edge.source.clone());
            lineage.nodes.insert(edge.target.clone());

            lineage
                .parents
                .entry(edge.target.clone())
                .or_default()
                .push(edge.source.clone());
            lineage
                .children
                .entry(edge.source.clone())
                .or_default()
                .push(edge.target.clone());
        }

        lineage
    }

    /// All nodes in the graph, sorted
    pub fn all_nodes(&self) -> Vec<&NodeId> {
        self.nodes.iter().collect()
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.nodes.contains(node_id)
    }

    /// Immediate parents (producers/inputs) of a node
    pub fn parents(&self, node_id: &str) -> Vec<&NodeId> {
        self.parents
            .get(node_id)
            .map(|deps| deps.iter().collect())
            .unwrap_or_default()
    }

    /// Immediate children (consumers/outputs) of a node
    pub fn children(&self, node_id: &str) -> Vec<&NodeId> {
        self.children
            .get(node_id)
            .map(|deps| deps.iter().collect())
            .unwrap_or_default()
    }

    /// Everything fed by this node, transitively, in BFS order. The node
    /// itself is never listed, even when it sits on a cycle.
    pub fn downstream(&self, node_id: &str) -> Vec<NodeId> {
        Self::reach(&self.children, node_id)
    }

    /// Everything feeding this node, transitively, in BFS order
    pub fn upstream(&self, node_id: &str) -> Vec<NodeId> {
        Self::reach(&self.parents, node_id)
    }

    fn reach(adjacency: &BTreeMap<NodeId, Vec<NodeId>>, node_id: &str) -> Vec<NodeId> {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        let mut result = Vec::new();

        visited.insert(node_id.to_string());
        if let Some(next) = adjacency.get(node_id) {
            queue.extend(next.iter().cloned());
        }

        while let Some(current) = queue.pop_front() {
            if !visited.insert(current.clone()) {
                continue;
            }

            if let Some(next) = adjacency.get(&current) {
                for n in next {
                    if !visited.contains(n) {
                        queue.push_back(n.clone());
                    }
                }
            }

            result.push(current);
        }

        result
    }

    /// Check if there's a path from source to target
    pub fn has_path(&self, source: &str, target: &str) -> bool {
        self.downstream(source).iter().any(|n| n == target)
    }

    /// Topological order of all nodes, `None` if the data flow has a cycle
    pub fn topological_sort(&self) -> Option<Vec<NodeId>> {
        let order = self.kahn();
        (order.len() == self.nodes.len()).then_some(order)
    }

    /// Nodes lying on at least one cycle, sorted
    ///
    /// Nodes that are merely reachable from a cycle are not members.
    pub fn cycle_members(&self) -> Vec<NodeId> {
        let mut members = BTreeSet::new();

        for component in self.strongly_connected() {
            let looped = component.len() > 1
                || self
                    .children
                    .get(&component[0])
                    .map_or(false, |next| next.contains(&component[0]));

            if looped {
                members.extend(component);
            }
        }

        members.into_iter().collect()
    }

    fn kahn(&self) -> Vec<NodeId> {
        let mut in_degree: BTreeMap<&str, usize> = self
            .nodes
            .iter()
            .map(|n| (n.as_str(), self.parents.get(n).map_or(0, Vec::len)))
            .collect();

        let mut queue: VecDeque<&str> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(node, _)| *node)
            .collect();

        let mut order = Vec::new();

        while let Some(node) = queue.pop_front() {
            order.push(node.to_string());

            for child in self.children.get(node).into_iter().flatten() {
                if let Some(degree) = in_degree.get_mut(child.as_str()) {
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(child.as_str());
                    }
                }
            }
        }

        order
    }

    /// Tarjan's strongly connected components (iterative)
    fn strongly_connected(&self) -> Vec<Vec<NodeId>> {
        let mut index: HashMap<&str, usize> = HashMap::new();
        let mut low: HashMap<&str, usize> = HashMap::new();
        let mut on_stack: HashSet<&str> = HashSet::new();
        let mut stack: Vec<&str> = Vec::new();
        let mut components = Vec::new();

        for root in &self.nodes {
            if index.contains_key(root.as_str()) {
                continue;
            }

            // (node, position of the next child to visit)
            let mut work: Vec<(&str, usize)> = vec![(root.as_str(), 0)];

            while let Some((node, pos)) = work.pop() {
                if pos == 0 {
                    let next = index.len();
                    index.insert(node, next);
                    low.insert(node, next);
                    stack.push(node);
                    on_stack.insert(node);
                }

                let children = self.children.get(node).map(Vec::as_slice).unwrap_or_default();
                if let Some(child) = children.get(pos) {
                    work.push((node, pos + 1));

                    let child = child.as_str();
                    if !index.contains_key(child) {
                        work.push((child, 0));
                    } else if on_stack.contains(child) {
                        let lowered = low[node].min(index[child]);
                        low.insert(node, lowered);
                    }
                    continue;
                }

                if low[node] == index[node] {
                    let mut component = Vec::new();
                    while let Some(member) = stack.pop() {
                        on_stack.remove(member);
                        component.push(member.to_string());
                        if member == node {
                            break;
                        }
                    }
                    components.push(component);
                }

                if let Some(&(parent, _)) = work.last() {
                    let lowered = low[parent].min(low[node]);
                    low.insert(parent, lowered);
                }
            }
        }

        components
    }
}
