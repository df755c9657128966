//! Graph store seam.
//!
//! The engine only talks to the persistent knowledge graph through
//! [`GraphStore`]. The embedded implementation lives in [`sled_store`];
//! weighted traversal is computed client-side by [`traversal`].

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::lifecycle::LifecycleThresholds;
use crate::model::{Concept, ContextSummary, DissonanceRecord, MetaKnowledge, Relationship};

pub mod sled_store;
pub mod traversal;

pub use sled_store::SledGraphStore;

/// Pattern-match query: paths leaving `origin` whose terminal node mentions `term`.
#[derive(Debug, Clone, PartialEq)]
pub struct PathQuery {
	pub origin: String,
	pub max_depth: usize,
	/// Already lower-cased.
	pub term: String,
	/// Drop every path that touches a short-term node.
	pub exclude_short_term: bool,
	pub limit: usize,
}

/// One row of a weighted-path query: the best path found to `terminal`.
#[derive(Debug, Clone, PartialEq)]
pub struct PathRow {
	pub terminal: Concept,
	pub edges: Vec<Relationship>,
	/// Origin first, terminal last.
	pub nodes: Vec<Concept>,
	pub weight: f64,
}

impl PathRow {
	pub fn touches_short_term(&self) -> bool {
		self.nodes.iter().any(|n| n.is_short_term())
	}
}

/// Point update applied by reinforcement and contradiction penalties.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Reinforcement {
	pub strength_delta: f64,
	pub confidence_delta: f64,
	pub validated: bool,
}

impl Reinforcement {
	pub fn strength(delta: f64) -> Self {
		Self { strength_delta: delta, ..Self::default() }
	}

	pub fn validated(delta: f64) -> Self {
		Self { strength_delta: delta, validated: true, ..Self::default() }
	}
}

/// A fact to MERGE into the graph: `(source)-[relationship]->(target)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Triple {
	#[serde(default)]
	pub source: String,
	#[serde(default)]
	pub relationship: String,
	#[serde(default)]
	pub target: String,
}

impl Triple {
	pub fn new(source: &str, relationship: &str, target: &str) -> Self {
		Self { source: source.into(), relationship: relationship.into(), target: target.into() }
	}
}

#[async_trait]
pub trait GraphStore: Send + Sync {
	/// Best path per matching terminal node, ascending by raw weight, capped by `limit`.
	async fn weighted_paths(&self, query: &PathQuery) -> Result<Vec<PathRow>>;

	/// Concepts whose name or title contains `term` (lower-cased), no traversal.
	async fn find_concepts(&self, term: &str, limit: usize) -> Result<Vec<Concept>>;

	async fn get_node(&self, id: &str) -> Result<Option<Concept>>;

	/// Returns `false` when no node has this id.
	async fn reinforce(&self, id: &str, change: Reinforcement) -> Result<bool>;

	/// MERGE semantics: create missing concepts/edges, refresh existing ones.
	async fn upsert_triples(&self, triples: &[Triple]) -> Result<usize>;

	/// Create the origin and creator nodes when missing. Returns whether anything was written.
	async fn seed_genesis(&self) -> Result<bool>;

	async fn backfill_ids(&self) -> Result<usize>;

	/// Clamp stored confidence and relevance into [0,1] and negative strength to 0.
	async fn repair_confidences(&self) -> Result<usize>;

	async fn decay_strength(&self, factor: f64) -> Result<usize>;

	async fn promote_concepts(&self, thresholds: &LifecycleThresholds, now: i64) -> Result<usize>;

	async fn prune_concepts(&self, thresholds: &LifecycleThresholds) -> Result<usize>;

	async fn record_dissonance(&self, node_id: &str, explanation: &str) -> Result<DissonanceRecord>;

	async fn dissonances_for(&self, node_id: &str) -> Result<Vec<DissonanceRecord>>;

	async fn record_meta_knowledge(&self, entry: MetaKnowledge) -> Result<()>;

	async fn meta_knowledge(&self) -> Result<Vec<MetaKnowledge>>;

	/// Latest summary per session overwrites the previous one.
	async fn save_context_summary(&self, session_id: &str, summary: &str) -> Result<ContextSummary>;

	async fn context_summary(&self, session_id: &str) -> Result<Option<ContextSummary>>;
}
