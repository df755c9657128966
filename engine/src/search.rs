//! Weighted graph retrieval ("quantum search").
//!
//! Paths start at the origin node and end at a node mentioning the search
//! term. Lower path weight means a more trusted route. Storage failures
//! and timeouts degrade to an empty result; the direct-match fallback only
//! runs when the traversal succeeded and found nothing.

use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::completion::bounded;
use crate::graph::{GraphStore, PathQuery, PathRow};
use crate::model::{clamp_confidence, Concept, ContextNode, MemoryDocument, Relationship, ORIGIN_ID};

pub const MAX_PATH_DEPTH: usize = 4;
pub const SHORT_TERM_PENALTY: f64 = 5.0;

/// Usage contexts containing any of these bypass short-term memory entirely.
const CRITICAL_MARKERS: &[&str] = &[
    "critical", "critico", "critica", "urgent", "urgente", "audit", "auditoria", "security", "seguranca",
    "compliance", "emergency", "emergencia",
];

pub fn is_critical_context(usage_context: Option<&str>) -> bool {
    let Some(ctx) = usage_context else { return false };
    let lowered = ctx.to_lowercase();
    CRITICAL_MARKERS.iter().any(|m| lowered.contains(m))
}

/// `Node1 -[REL]-> Node2 -[REL]-> ...`
pub fn format_path(nodes: &[Concept], rels: &[Relationship]) -> String {
    let mut segments = Vec::with_capacity(nodes.len() * 2);
    for (i, node) in nodes.iter().enumerate() {
        segments.push(node.display_name().to_string());
        if i + 1 < nodes.len() {
            if let Some(rel) = rels.get(i) {
                segments.push(format!("-[{}]->", rel.rel_type));
            }
        }
    }
    segments.join(" ")
}

fn path_document(row: PathRow, critical: bool) -> MemoryDocument {
    let mut weight = row.weight;
    if !critical && row.touches_short_term() {
        weight += SHORT_TERM_PENALTY;
    }

    let mut confidences: Vec<f64> = row.edges.iter().map(|r| clamp_confidence(r.intrinsic_confidence)).collect();
    let own = clamp_confidence(row.terminal.intrinsic_confidence);
    if own > 0.0 {
        confidences.push(own);
    }
    let intrinsic = if confidences.is_empty() { 0.0 } else { confidences.iter().sum::<f64>() / confidences.len() as f64 };

    let content = format_path(&row.nodes, &row.edges);
    let context_nodes = row
        .nodes
        .iter()
        .map(|n| ContextNode { id: n.id.clone(), name: n.display_name().to_string(), status: n.status })
        .collect();
    let terminal = row.terminal;
    MemoryDocument {
        title: terminal.display_name().to_string(),
        id: Some(terminal.id),
        content,
        url: terminal.source_url.unwrap_or_default(),
        intrinsic_confidence: Some(intrinsic),
        external_confidence: None,
        final_score: None,
        status: Some(terminal.status),
        path_weight: weight,
        context_nodes,
    }
}

fn direct_document(node: Concept) -> MemoryDocument {
    let content = node.description.clone().filter(|d| !d.is_empty()).unwrap_or_else(|| node.name.clone());
    MemoryDocument {
        title: node.display_name().to_string(),
        id: Some(node.id),
        content,
        url: node.source_url.unwrap_or_default(),
        intrinsic_confidence: Some(clamp_confidence(node.intrinsic_confidence)),
        external_confidence: None,
        final_score: None,
        status: Some(node.status),
        path_weight: 0.0,
        context_nodes: Vec::new(),
    }
}

#[derive(Clone)]
pub struct QuantumSearch {
    store: Arc<dyn GraphStore>,
    timeout: Duration,
}

impl QuantumSearch {
    pub fn new(store: Arc<dyn GraphStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    pub async fn search(&self, term: &str, usage_context: Option<&str>, limit: usize) -> Vec<MemoryDocument> {
        let term = term.trim().to_lowercase();
        if term.is_empty() || limit == 0 {
            return Vec::new();
        }
        let critical = is_critical_context(usage_context);
        let query = PathQuery {
            origin: ORIGIN_ID.to_string(),
            max_depth: MAX_PATH_DEPTH,
            term: term.clone(),
            exclude_short_term: critical,
            limit,
        };

        // an unreachable or slow store yields nothing rather than a partial fallback
        let Some(rows) = bounded("weighted_paths", self.timeout, self.store.weighted_paths(&query)).await else {
            return Vec::new();
        };
        let mut documents: Vec<MemoryDocument> = rows.into_iter().map(|row| path_document(row, critical)).collect();

        if documents.is_empty() {
            let direct = bounded("find_concepts", self.timeout, self.store.find_concepts(&term, limit)).await.unwrap_or_default();
            debug!(%term, hits = direct.len(), "no traversal path, falling back to direct match");
            documents = direct.into_iter().map(direct_document).collect();
        }

        documents.sort_by(|a, b| a.path_weight.partial_cmp(&b.path_weight).unwrap_or(Ordering::Equal));
        documents.truncate(limit);
        info!(%term, critical, results = documents.len(), "memory search finished");
        documents
    }
}
