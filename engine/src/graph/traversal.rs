//! Client-side weighted traversal over a snapshot of the knowledge graph.
//!
//! Edge cost is `1 / (intrinsic_confidence * contextual_relevance)`, so
//! trusted, relevant edges are cheap and low-trust edges cost a flat
//! [`LOW_TRUST_EDGE_WEIGHT`]. Paths are simple (no node visited twice) and
//! bounded by the query depth.

use std::cmp::Ordering;
use std::collections::HashMap;

use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use super::{PathQuery, PathRow};
use crate::model::{clamp_confidence, Concept, Relationship};

pub const LOW_TRUST_EDGE_WEIGHT: f64 = 10.0;

pub fn edge_weight(rel: &Relationship) -> f64 {
    let intrinsic = clamp_confidence(rel.intrinsic_confidence);
    let contextual = clamp_confidence(rel.contextual_relevance);
    if intrinsic <= 0.0 || contextual <= 0.0 {
        return LOW_TRUST_EDGE_WEIGHT;
    }
    1.0 / (intrinsic * contextual)
}

pub struct MemoryGraph {
    graph: DiGraph<Concept, Relationship>,
    index: HashMap<String, NodeIndex>,
}

impl MemoryGraph {
    /// Edges whose endpoints are not among `nodes` are skipped.
    pub fn build(
        nodes: impl IntoIterator<Item = Concept>,
        edges: impl IntoIterator<Item = Relationship>,
    ) -> Self {
        let mut graph = DiGraph::new();
        let mut index = HashMap::new();
        for node in nodes {
            let id = node.id.clone();
            let ix = graph.add_node(node);
            index.insert(id, ix);
        }
        for rel in edges {
            let (Some(&src), Some(&dst)) = (index.get(&rel.src), index.get(&rel.dst)) else {
                continue;
            };
            graph.add_edge(src, dst, rel);
        }
        Self { graph, index }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn weighted_paths(&self, query: &PathQuery) -> Vec<PathRow> {
        let Some(&origin) = self.index.get(&query.origin) else {
            return Vec::new();
        };
        if query.limit == 0 || (query.exclude_short_term && self.graph[origin].is_short_term()) {
            return Vec::new();
        }

        let mut best: HashMap<NodeIndex, (f64, Vec<EdgeIndex>)> = HashMap::new();
        let mut nodes = vec![origin];
        let mut edges = Vec::new();
        self.walk(origin, 0.0, query, &mut nodes, &mut edges, &mut best);

        let mut rows: Vec<PathRow> = best
            .into_iter()
            .map(|(terminal, (weight, path))| self.row(terminal, weight, &path))
            .collect();
        rows.sort_by(|a, b| {
            a.weight
                .partial_cmp(&b.weight)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.terminal.id.cmp(&b.terminal.id))
        });
        rows.truncate(query.limit);
        rows
    }

    fn walk(
        &self,
        at: NodeIndex,
        weight: f64,
        query: &PathQuery,
        nodes: &mut Vec<NodeIndex>,
        edges: &mut Vec<EdgeIndex>,
        best: &mut HashMap<NodeIndex, (f64, Vec<EdgeIndex>)>,
    ) {
        if edges.len() >= query.max_depth {
            return;
        }
        for edge in self.graph.edges_directed(at, Direction::Outgoing) {
            let next = edge.target();
            if nodes.contains(&next) {
                continue;
            }
            let node = &self.graph[next];
            if query.exclude_short_term && node.is_short_term() {
                continue;
            }
            let total = weight + edge_weight(edge.weight());
            nodes.push(next);
            edges.push(edge.id());
            if node.mentions(&query.term) {
                let improves = best.get(&next).map(|(w, _)| total < *w).unwrap_or(true);
                if improves {
                    best.insert(next, (total, edges.clone()));
                }
            }
            self.walk(next, total, query, nodes, edges, best);
            nodes.pop();
            edges.pop();
        }
    }

    fn row(&self, terminal: NodeIndex, weight: f64, path: &[EdgeIndex]) -> PathRow {
        let mut nodes = Vec::with_capacity(path.len() + 1);
        let mut rels = Vec::with_capacity(path.len());
        for (i, &e) in path.iter().enumerate() {
            if let Some((src, dst)) = self.graph.edge_endpoints(e) {
                if i == 0 {
                    nodes.push(self.graph[src].clone());
                }
                nodes.push(self.graph[dst].clone());
            }
            rels.push(self.graph[e].clone());
        }
        PathRow { terminal: self.graph[terminal].clone(), edges: rels, nodes, weight }
    }
}
