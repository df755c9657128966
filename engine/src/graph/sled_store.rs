use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, warn};

use super::traversal::MemoryGraph;
use super::{GraphStore, PathQuery, PathRow, Reinforcement, Triple};
use crate::lifecycle::LifecycleThresholds;
use crate::model::{
	clamp_confidence, normalize_relationship, now_ms, Concept, ContextSummary, DissonanceRecord, MemoryStatus,
	MetaKnowledge, NodeKind, Relationship, CREATOR_ID, ORIGIN_ID,
};

const NODES: &str = "kg_nodes";
const NAMES: &str = "kg_names";
const EDGES: &str = "kg_edges";
const EDGES_IN: &str = "kg_edges_in";
const DISSONANCE: &str = "dissonance";
const META: &str = "meta_knowledge";
const SUMMARIES: &str = "context_summaries";

const UNKNOWN_NAME: &str = "Unknown";

/// Knowledge graph persisted in sled trees.
///
/// Nodes are keyed by id, edges by `src->dst::TYPE` with a reverse index
/// `dst<-src::TYPE` whose value is the forward key.
#[derive(Clone)]
pub struct SledGraphStore {
	db: sled::Db,
}

fn edge_key(src: &str, dst: &str, rel_type: &str) -> String { format!("{}->{}::{}", src, dst, rel_type) }

fn reverse_key(src: &str, dst: &str, rel_type: &str) -> String { format!("{}<-{}::{}", dst, src, rel_type) }

/// Decode a stored node; a node stored without an id answers to its element key.
fn decode_node(key: &[u8], value: &[u8]) -> Option<Concept> {
	let mut node: Concept = serde_json::from_slice(value).ok()?;
	if node.id.trim().is_empty() {
		node.id = String::from_utf8_lossy(key).to_string();
	}
	Some(node)
}

/// Atomically rewrite one node. `change` returns false to leave it untouched.
/// Yields the node before and after, or `None` when the key is absent.
fn modify_node(tree: &sled::Tree, key: &[u8], mut change: impl FnMut(&mut Concept) -> bool) -> Result<Option<(Concept, Concept)>> {
	let mut outcome = None;
	tree.update_and_fetch(key, |current| {
		let bytes = current?;
		let Some(mut node) = decode_node(key, bytes) else { return Some(bytes.to_vec()) };
		let before = node.clone();
		if !change(&mut node) {
			outcome = Some((before, node));
			return Some(bytes.to_vec());
		}
		match serde_json::to_vec(&node) {
			Ok(v) => { outcome = Some((before, node)); Some(v) }
			Err(_) => Some(bytes.to_vec()),
		}
	})?;
	Ok(outcome)
}

fn clean_name(raw: &str) -> String {
	let name = raw.replace('\'', "");
	let name = name.trim();
	if name.is_empty() { UNKNOWN_NAME.to_string() } else { name.to_string() }
}

impl SledGraphStore {
	pub fn new(db: sled::Db) -> Self { Self { db } }

	pub fn open(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		let db = sled::open(path).with_context(|| format!("opening graph store at {}", path.display()))?;
		Ok(Self::new(db))
	}

	pub fn db(&self) -> &sled::Db { &self.db }

	fn tree(&self, name: &str) -> Result<sled::Tree> { Ok(self.db.open_tree(name)?) }

	/// Insert or replace a node as-is.
	pub fn put_node(&self, node: &Concept) -> Result<()> {
		let nodes = self.tree(NODES)?;
		nodes.insert(node.id.as_bytes(), serde_json::to_vec(node)?)?;
		if node.is_concept() {
			self.tree(NAMES)?.insert(node.name.as_bytes(), node.id.as_bytes())?;
		}
		Ok(())
	}

	/// Insert or replace an edge as-is.
	pub fn put_edge(&self, rel: &Relationship) -> Result<()> {
		let fwd = edge_key(&rel.src, &rel.dst, &rel.rel_type);
		self.tree(EDGES)?.insert(fwd.as_bytes(), serde_json::to_vec(rel)?)?;
		self.tree(EDGES_IN)?.insert(reverse_key(&rel.src, &rel.dst, &rel.rel_type).as_bytes(), fwd.as_bytes())?;
		Ok(())
	}

	pub fn nodes(&self) -> Result<Vec<Concept>> {
		let mut out = Vec::new();
		for kv in self.tree(NODES)?.iter() {
			let (k, v) = kv?;
			if let Some(node) = decode_node(&k, &v) { out.push(node); }
		}
		Ok(out)
	}

	pub fn edges(&self) -> Result<Vec<Relationship>> {
		let mut out = Vec::new();
		for kv in self.tree(EDGES)?.iter() {
			let (_, v) = kv?;
			if let Ok(rel) = serde_json::from_slice::<Relationship>(&v) { out.push(rel); }
		}
		Ok(out)
	}

	pub fn edge(&self, src: &str, dst: &str, rel_type: &str) -> Result<Option<Relationship>> {
		let v = self.tree(EDGES)?.get(edge_key(src, dst, rel_type).as_bytes())?;
		Ok(v.and_then(|v| serde_json::from_slice(&v).ok()))
	}

	pub fn concept_by_name(&self, name: &str) -> Result<Option<Concept>> {
		let Some(id) = self.tree(NAMES)?.get(name.as_bytes())? else { return Ok(None) };
		let Some(v) = self.tree(NODES)?.get(&id)? else { return Ok(None) };
		Ok(decode_node(&id, &v))
	}

	/// Adjacency snapshot used for client-side traversal.
	pub fn snapshot(&self) -> Result<MemoryGraph> { Ok(MemoryGraph::build(self.nodes()?, self.edges()?)) }

	fn edges_touching(&self, id: &str) -> Result<Vec<Relationship>> {
		let edges = self.tree(EDGES)?;
		let mut out = Vec::new();
		for kv in edges.scan_prefix(format!("{}->", id).as_bytes()) {
			let (_, v) = kv?;
			if let Ok(rel) = serde_json::from_slice::<Relationship>(&v) { out.push(rel); }
		}
		for kv in self.tree(EDGES_IN)?.scan_prefix(format!("{}<-", id).as_bytes()) {
			let (_, fwd) = kv?;
			if let Some(v) = edges.get(&fwd)? {
				if let Ok(rel) = serde_json::from_slice::<Relationship>(&v) { out.push(rel); }
			}
		}
		Ok(out)
	}

	fn remove_edge(&self, rel: &Relationship) -> Result<()> {
		self.tree(EDGES)?.remove(edge_key(&rel.src, &rel.dst, &rel.rel_type).as_bytes())?;
		self.tree(EDGES_IN)?.remove(reverse_key(&rel.src, &rel.dst, &rel.rel_type).as_bytes())?;
		Ok(())
	}

	fn detach(&self, id: &str) -> Result<usize> {
		let touching = self.edges_touching(id)?;
		for rel in &touching { self.remove_edge(rel)?; }
		Ok(touching.len())
	}

	/// Move a node stored under `old_key` to its (new) id, carrying its edges along.
	fn rekey_node(&self, old_key: &[u8], node: &Concept) -> Result<()> {
		let old = String::from_utf8_lossy(old_key).to_string();
		let touching = self.edges_touching(&old)?;
		for rel in &touching {
			self.remove_edge(rel)?;
			let mut moved = rel.clone();
			if moved.src == old { moved.src = node.id.clone(); }
			if moved.dst == old { moved.dst = node.id.clone(); }
			self.put_edge(&moved)?;
		}
		self.tree(NODES)?.remove(old_key)?;
		self.put_node(node)
	}

	fn merge_concept(&self, name: &str, now: i64) -> Result<String> {
		let nodes = self.tree(NODES)?;
		if (name == ORIGIN_ID || name == CREATOR_ID) && nodes.contains_key(name.as_bytes())? {
			return Ok(name.to_string());
		}
		let names = self.tree(NAMES)?;
		let fresh = Concept::new(name, now);
		match names.compare_and_swap(name.as_bytes(), None as Option<&[u8]>, Some(fresh.id.as_bytes()))? {
			Ok(()) => {
				nodes.insert(fresh.id.as_bytes(), serde_json::to_vec(&fresh)?)?;
				Ok(fresh.id)
			}
			Err(claimed) => {
				let id = claimed.current.map(|v| String::from_utf8_lossy(&v).to_string()).unwrap_or_default();
				let touched = modify_node(&nodes, id.as_bytes(), |n| {
					n.last_activated_at = Some(now);
					n.updated_at = Some(now);
					true
				})?;
				if touched.is_none() {
					// name index pointed at a node that is gone
					let revived = Concept { id: id.clone(), ..fresh };
					nodes.insert(id.as_bytes(), serde_json::to_vec(&revived)?)?;
				}
				Ok(id)
			}
		}
	}

	fn merge_edge(&self, src: &str, dst: &str, rel_type: &str, now: i64) -> Result<()> {
		match self.edge(src, dst, rel_type)? {
			Some(mut rel) => {
				rel.updated_at = Some(now);
				self.put_edge(&rel)
			}
			None => self.put_edge(&Relationship::new(src, dst, rel_type, now)),
		}
	}

	fn merge_triple(&self, triple: &Triple, now: i64) -> Result<()> {
		let src = self.merge_concept(&clean_name(&triple.source), now)?;
		let dst = self.merge_concept(&clean_name(&triple.target), now)?;
		self.merge_edge(&src, &dst, &normalize_relationship(&triple.relationship), now)
	}

	/// Run a scan or traversal on the blocking pool so callers can time it out.
	async fn offload<T, F>(&self, what: &'static str, work: F) -> Result<T>
	where
		T: Send + 'static,
		F: FnOnce(SledGraphStore) -> Result<T> + Send + 'static,
	{
		let store = self.clone();
		tokio::task::spawn_blocking(move || work(store)).await.with_context(|| format!("{} task panicked", what))?
	}

	fn paths_blocking(&self, query: &PathQuery) -> Result<Vec<PathRow>> {
		let graph = self.snapshot()?;
		let rows = graph.weighted_paths(query);
		debug!(nodes = graph.node_count(), edges = graph.edge_count(), rows = rows.len(), "weighted traversal");
		Ok(rows)
	}

	fn concepts_blocking(&self, term: &str, limit: usize) -> Result<Vec<Concept>> {
		let mut found = Vec::new();
		for kv in self.tree(NODES)?.iter() {
			if found.len() >= limit { break; }
			let (k, v) = kv?;
			let Some(node) = decode_node(&k, &v) else { continue };
			if !node.is_concept() { continue; }
			let hit = node.name.to_lowercase().contains(term)
				|| node.title.as_deref().map(|t| t.to_lowercase().contains(term)).unwrap_or(false);
			if hit { found.push(node); }
		}
		Ok(found)
	}

	fn backfill_blocking(&self) -> Result<usize> {
		let nodes = self.tree(NODES)?;
		let mut missing = Vec::new();
		for kv in nodes.iter() {
			let (k, v) = kv?;
			if let Ok(node) = serde_json::from_slice::<Concept>(&v) {
				if node.id.trim().is_empty() { missing.push((k, node)); }
			}
		}
		for (key, mut node) in missing.iter().cloned() {
			node.id = uuid::Uuid::new_v4().to_string();
			self.rekey_node(&key, &node)?;
		}
		Ok(missing.len())
	}

	fn decay_blocking(&self, factor: f64) -> Result<usize> {
		let nodes = self.tree(NODES)?;
		let mut decayed = 0usize;
		for key in nodes.iter().keys() {
			let key = key?;
			let changed = modify_node(&nodes, &key, |n| {
				if !n.is_concept() { return false; }
				n.synaptic_strength *= factor;
				true
			})?;
			if matches!(changed, Some((ref before, _)) if before.is_concept()) { decayed += 1; }
		}
		Ok(decayed)
	}

	fn promote_blocking(&self, thresholds: &LifecycleThresholds, now: i64) -> Result<usize> {
		let nodes = self.tree(NODES)?;
		let mut promoted = 0usize;
		for key in nodes.iter().keys() {
			let key = key?;
			if let Some((before, after)) = modify_node(&nodes, &key, |n| thresholds.promote(n, now))? {
				if before.status != after.status { promoted += 1; }
			}
		}
		Ok(promoted)
	}

	fn prune_blocking(&self, thresholds: &LifecycleThresholds) -> Result<usize> {
		let nodes = self.tree(NODES)?;
		let names = self.tree(NAMES)?;
		let mut pruned = 0usize;
		for kv in nodes.iter() {
			let (k, v) = kv?;
			let Some(node) = decode_node(&k, &v) else { continue };
			if !thresholds.should_prune(&node) { continue; }
			// a concurrent reinforcement wins over the prune
			if nodes.compare_and_swap(&k, Some(&v), None as Option<&[u8]>)?.is_err() { continue; }
			let key = String::from_utf8_lossy(&k).to_string();
			self.detach(&key)?;
			let _ = names.compare_and_swap(node.name.as_bytes(), Some(&k), None as Option<&[u8]>)?;
			pruned += 1;
		}
		Ok(pruned)
	}

	/// Clamp stored confidences into [0,1] and floor strength at 0, nodes and edges alike.
	fn repair_blocking(&self) -> Result<usize> {
		let nodes = self.tree(NODES)?;
		let mut repaired = 0usize;
		for key in nodes.iter().keys() {
			let key = key?;
			let changed = modify_node(&nodes, &key, |n| {
				let confidence = clamp_confidence(n.intrinsic_confidence);
				let strength = if n.synaptic_strength.is_nan() { 0.0 } else { n.synaptic_strength.max(0.0) };
				if confidence == n.intrinsic_confidence && strength == n.synaptic_strength { return false; }
				n.intrinsic_confidence = confidence;
				n.synaptic_strength = strength;
				true
			})?;
			if matches!(changed, Some((ref before, ref after)) if before != after) { repaired += 1; }
		}
		let edges = self.tree(EDGES)?;
		for kv in edges.iter() {
			let (k, v) = kv?;
			let Ok(mut rel) = serde_json::from_slice::<Relationship>(&v) else { continue };
			let (ic, cr) = (clamp_confidence(rel.intrinsic_confidence), clamp_confidence(rel.contextual_relevance));
			if ic == rel.intrinsic_confidence && cr == rel.contextual_relevance { continue; }
			rel.intrinsic_confidence = ic;
			rel.contextual_relevance = cr;
			// skip when a concurrent writer replaced the edge meanwhile
			if edges.compare_and_swap(&k, Some(&v), Some(serde_json::to_vec(&rel)?))?.is_ok() { repaired += 1; }
		}
		Ok(repaired)
	}
}

#[async_trait]
impl GraphStore for SledGraphStore {
	async fn weighted_paths(&self, query: &PathQuery) -> Result<Vec<PathRow>> {
		let query = query.clone();
		self.offload("weighted_paths", move |store| store.paths_blocking(&query)).await
	}

	async fn find_concepts(&self, term: &str, limit: usize) -> Result<Vec<Concept>> {
		let term = term.to_string();
		self.offload("find_concepts", move |store| store.concepts_blocking(&term, limit)).await
	}

	async fn get_node(&self, id: &str) -> Result<Option<Concept>> {
		let v = self.tree(NODES)?.get(id.as_bytes())?;
		Ok(v.and_then(|v| decode_node(id.as_bytes(), &v)))
	}

	async fn reinforce(&self, id: &str, change: Reinforcement) -> Result<bool> {
		let now = now_ms();
		let touched = modify_node(&self.tree(NODES)?, id.as_bytes(), |n| {
			n.synaptic_strength = (n.synaptic_strength + change.strength_delta).max(0.0);
			n.intrinsic_confidence = clamp_confidence(n.intrinsic_confidence + change.confidence_delta);
			n.last_activated_at = Some(now);
			if change.validated {
				n.validated_by_planner = true;
				n.last_validated_at = Some(now);
			}
			true
		})?;
		Ok(touched.is_some())
	}

	async fn upsert_triples(&self, triples: &[Triple]) -> Result<usize> {
		let now = now_ms();
		let mut merged = 0usize;
		for triple in triples {
			match self.merge_triple(triple, now) {
				Ok(()) => merged += 1,
				Err(err) => warn!(source = %triple.source, target = %triple.target, error = %err, "failed to merge triple"),
			}
		}
		self.db.flush_async().await?;
		Ok(merged)
	}

	async fn seed_genesis(&self) -> Result<bool> {
		let nodes = self.tree(NODES)?;
		if nodes.contains_key(ORIGIN_ID.as_bytes())? { return Ok(false); }
		let now = now_ms();
		let origin = Concept {
			id: ORIGIN_ID.to_string(),
			kind: NodeKind::Consciousness,
			name: "Nexus".to_string(),
			description: Some("An autonomous cognitive assistant built to evolve.".to_string()),
			status: MemoryStatus::LongTerm,
			intrinsic_confidence: 0.0,
			..Concept::new("Nexus", now)
		};
		nodes.insert(origin.id.as_bytes(), serde_json::to_vec(&origin)?)?;
		if !nodes.contains_key(CREATOR_ID.as_bytes())? {
			let creator = Concept {
				id: CREATOR_ID.to_string(),
				kind: NodeKind::Entity,
				name: "User".to_string(),
				description: Some("The person who built me. Helping them comes first.".to_string()),
				status: MemoryStatus::LongTerm,
				intrinsic_confidence: 0.0,
				..Concept::new("User", now)
			};
			nodes.insert(creator.id.as_bytes(), serde_json::to_vec(&creator)?)?;
		}
		let mut link = Relationship::new(ORIGIN_ID, CREATOR_ID, "CREATED_BY", now);
		link.intrinsic_confidence = 1.0;
		self.put_edge(&link)?;
		self.db.flush_async().await?;
		Ok(true)
	}

	async fn backfill_ids(&self) -> Result<usize> {
		self.offload("backfill_ids", |store| store.backfill_blocking()).await
	}

	async fn repair_confidences(&self) -> Result<usize> {
		self.offload("repair_confidences", |store| store.repair_blocking()).await
	}

	async fn decay_strength(&self, factor: f64) -> Result<usize> {
		self.offload("decay_strength", move |store| store.decay_blocking(factor)).await
	}

	async fn promote_concepts(&self, thresholds: &LifecycleThresholds, now: i64) -> Result<usize> {
		let thresholds = *thresholds;
		self.offload("promote_concepts", move |store| store.promote_blocking(&thresholds, now)).await
	}

	async fn prune_concepts(&self, thresholds: &LifecycleThresholds) -> Result<usize> {
		let thresholds = *thresholds;
		self.offload("prune_concepts", move |store| store.prune_blocking(&thresholds)).await
	}

	async fn record_dissonance(&self, node_id: &str, explanation: &str) -> Result<DissonanceRecord> {
		let rec = DissonanceRecord {
			id: uuid::Uuid::new_v4().to_string(),
			node_id: node_id.to_string(),
			explanation: explanation.to_string(),
			recorded_at: now_ms(),
		};
		let key = format!("{}::{:020}::{}", node_id, rec.recorded_at, rec.id);
		self.tree(DISSONANCE)?.insert(key.as_bytes(), serde_json::to_vec(&rec)?)?;
		Ok(rec)
	}

	async fn dissonances_for(&self, node_id: &str) -> Result<Vec<DissonanceRecord>> {
		let mut out = Vec::new();
		for kv in self.tree(DISSONANCE)?.scan_prefix(format!("{}::", node_id).as_bytes()) {
			let (_, v) = kv?;
			if let Ok(rec) = serde_json::from_slice(&v) { out.push(rec); }
		}
		Ok(out)
	}

	async fn record_meta_knowledge(&self, entry: MetaKnowledge) -> Result<()> {
		let key = format!("{:020}::{}", entry.recorded_at, entry.id);
		self.tree(META)?.insert(key.as_bytes(), serde_json::to_vec(&entry)?)?;
		Ok(())
	}

	async fn meta_knowledge(&self) -> Result<Vec<MetaKnowledge>> {
		let mut out = Vec::new();
		for kv in self.tree(META)?.iter() {
			let (_, v) = kv?;
			if let Ok(entry) = serde_json::from_slice(&v) { out.push(entry); }
		}
		Ok(out)
	}

	async fn save_context_summary(&self, session_id: &str, summary: &str) -> Result<ContextSummary> {
		let rec = ContextSummary {
			id: uuid::Uuid::new_v4().to_string(),
			session_id: session_id.to_string(),
			summary: summary.to_string(),
			updated_at: now_ms(),
		};
		self.tree(SUMMARIES)?.insert(session_id.as_bytes(), serde_json::to_vec(&rec)?)?;
		Ok(rec)
	}

	async fn context_summary(&self, session_id: &str) -> Result<Option<ContextSummary>> {
		let v = self.tree(SUMMARIES)?.get(session_id.as_bytes())?;
		Ok(v.and_then(|v| serde_json::from_slice(&v).ok()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::temp_store;

	#[tokio::test]
	async fn upsert_merges_instead_of_duplicating() {
		let (_dir, store) = temp_store();
		let triples = vec![
			Triple::new("Python", "criado por", "Guido van Rossum"),
			Triple::new("Python", "CRIADO_POR", "Guido van Rossum"),
		];
		assert_eq!(store.upsert_triples(&triples).await.unwrap(), 2);
		let nodes = store.nodes().unwrap();
		assert_eq!(nodes.len(), 2);
		let python = store.concept_by_name("Python").unwrap().unwrap();
		assert_eq!(python.status, MemoryStatus::ShortTerm);
		assert_eq!(python.intrinsic_confidence, 0.25);
		assert_eq!(python.synaptic_strength, 1.0);
		let guido = store.concept_by_name("Guido van Rossum").unwrap().unwrap();
		let edge = store.edge(&python.id, &guido.id, "CRIADO_POR").unwrap().unwrap();
		assert_eq!(edge.intrinsic_confidence, 0.25);
		assert_eq!(edge.contextual_relevance, 1.0);
		assert!(edge.updated_at.is_some());
		assert_eq!(store.edges().unwrap().len(), 1);
	}

	#[tokio::test]
	async fn blank_triple_parts_fall_back() {
		let (_dir, store) = temp_store();
		store.upsert_triples(&[Triple::new("  ", "", "O'Brien")]).await.unwrap();
		let unknown = store.concept_by_name("Unknown").unwrap().unwrap();
		let obrien = store.concept_by_name("OBrien").unwrap().unwrap();
		assert!(store.edge(&unknown.id, &obrien.id, "RELATED_TO").unwrap().is_some());
	}

	#[tokio::test]
	async fn creator_triples_attach_to_seeded_entity() {
		let (_dir, store) = temp_store();
		assert!(store.seed_genesis().await.unwrap());
		assert!(!store.seed_genesis().await.unwrap());
		store.upsert_triples(&[Triple::new("CREATOR", "has pet", "Banguela")]).await.unwrap();
		let pet = store.concept_by_name("Banguela").unwrap().unwrap();
		assert!(store.edge(CREATOR_ID, &pet.id, "HAS_PET").unwrap().is_some());
		assert!(store.concept_by_name("CREATOR").unwrap().is_none());
	}

	#[tokio::test]
	async fn reinforce_clamps_and_marks_validation() {
		let (_dir, store) = temp_store();
		let mut c = Concept::new("Gato", 0);
		c.intrinsic_confidence = 0.05;
		c.synaptic_strength = 0.05;
		store.put_node(&c).unwrap();

		let penalty = Reinforcement { strength_delta: -0.1, confidence_delta: -0.1, validated: false };
		assert!(store.reinforce(&c.id, penalty).await.unwrap());
		let after = store.get_node(&c.id).await.unwrap().unwrap();
		assert_eq!(after.intrinsic_confidence, 0.0);
		assert_eq!(after.synaptic_strength, 0.0);
		assert!(!after.validated_by_planner);

		store.reinforce(&c.id, Reinforcement::validated(2.0)).await.unwrap();
		let after = store.get_node(&c.id).await.unwrap().unwrap();
		assert!((after.synaptic_strength - 2.0).abs() < 1e-12);
		assert!(after.validated_by_planner);
		assert!(after.last_validated_at.is_some());

		assert!(!store.reinforce("missing", Reinforcement::strength(1.0)).await.unwrap());
	}

	#[tokio::test]
	async fn prune_removes_node_edges_and_name() {
		let (_dir, store) = temp_store();
		store.upsert_triples(&[Triple::new("weak", "LINKS", "other")]).await.unwrap();
		let weak = store.concept_by_name("weak").unwrap().unwrap();
		store.reinforce(&weak.id, Reinforcement::strength(-0.95)).await.unwrap();
		let pruned = store.prune_concepts(&LifecycleThresholds::default()).await.unwrap();
		assert_eq!(pruned, 1);
		assert!(store.get_node(&weak.id).await.unwrap().is_none());
		assert!(store.concept_by_name("weak").unwrap().is_none());
		assert!(store.edges().unwrap().is_empty());
		assert!(store.concept_by_name("other").unwrap().is_some());
	}

	#[tokio::test]
	async fn backfill_assigns_ids_and_moves_edges() {
		let (_dir, store) = temp_store();
		let legacy = serde_json::json!({
			"kind": "Concept", "name": "Legacy", "status": "SHORT_TERM",
			"intrinsic_confidence": 0.4, "synaptic_strength": 2.0, "created_at": 1
		});
		store.tree(NODES).unwrap().insert(b"legacy-key", serde_json::to_vec(&legacy).unwrap()).unwrap();
		let other = Concept::new("Other", 1);
		store.put_node(&other).unwrap();
		store.put_edge(&Relationship::new("legacy-key", &other.id, "KNOWS", 1)).unwrap();

		// before backfill the element key stands in for the id
		assert_eq!(store.get_node("legacy-key").await.unwrap().unwrap().id, "legacy-key");

		assert_eq!(store.backfill_ids().await.unwrap(), 1);
		assert_eq!(store.backfill_ids().await.unwrap(), 0);
		assert!(store.get_node("legacy-key").await.unwrap().is_none());
		let moved = store.concept_by_name("Legacy").unwrap().unwrap();
		assert_ne!(moved.id, "legacy-key");
		assert!(uuid::Uuid::parse_str(&moved.id).is_ok());
		assert!(store.edge(&moved.id, &other.id, "KNOWS").unwrap().is_some());
		assert_eq!(store.edges().unwrap().len(), 1);
	}

	#[tokio::test]
	async fn records_are_appended_and_summaries_overwrite() {
		let (_dir, store) = temp_store();
		store.record_dissonance("n1", "first").await.unwrap();
		store.record_dissonance("n1", "second").await.unwrap();
		store.record_dissonance("n2", "other").await.unwrap();
		assert_eq!(store.dissonances_for("n1").await.unwrap().len(), 2);

		store.save_context_summary("s1", "old").await.unwrap();
		store.save_context_summary("s1", "new").await.unwrap();
		assert_eq!(store.context_summary("s1").await.unwrap().unwrap().summary, "new");
		assert!(store.context_summary("s2").await.unwrap().is_none());
	}

	#[tokio::test]
	async fn find_concepts_skips_non_concepts() {
		let (_dir, store) = temp_store();
		store.seed_genesis().await.unwrap();
		store.upsert_triples(&[Triple::new("Nexus project", "IS_A", "plan")]).await.unwrap();
		let hits = store.find_concepts("nexus", 10).await.unwrap();
		assert_eq!(hits.len(), 1);
		assert_eq!(hits[0].name, "Nexus project");
		assert_eq!(store.find_concepts("", 1).await.unwrap().len(), 1);
	}
}
