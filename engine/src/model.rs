use serde::{Deserialize, Serialize};

pub const ORIGIN_ID: &str = "SELF";
pub const CREATOR_ID: &str = "CREATOR";

pub const DEFAULT_INTRINSIC_CONFIDENCE: f64 = 0.25;
pub const DEFAULT_SYNAPTIC_STRENGTH: f64 = 1.0;
pub const DEFAULT_CONTEXTUAL_RELEVANCE: f64 = 1.0;
pub const DEFAULT_RELATIONSHIP: &str = "RELATED_TO";

pub fn now_ms() -> i64 {
	std::time::SystemTime::now()
		.duration_since(std::time::UNIX_EPOCH)
		.map(|d| d.as_millis() as i64)
		.unwrap_or(0)
}

/// Clamp a confidence value into [0,1]; NaN collapses to 0.
pub fn clamp_confidence(value: f64) -> f64 {
	if value.is_nan() { return 0.0; }
	value.clamp(0.0, 1.0)
}

fn default_strength() -> f64 { DEFAULT_SYNAPTIC_STRENGTH }

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MemoryStatus {
	ShortTerm,
	LongTerm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
	Consciousness,
	Entity,
	Concept,
}

/// A node of the knowledge graph. Only `NodeKind::Concept` nodes take part in
/// ingestion, fallback search and the maintenance cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Concept {
	#[serde(default)]
	pub id: String,
	pub kind: NodeKind,
	pub name: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub title: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub source_url: Option<String>,
	pub status: MemoryStatus,
	#[serde(default)]
	pub intrinsic_confidence: f64,
	#[serde(default = "default_strength")]
	pub synaptic_strength: f64,
	#[serde(default)]
	pub validated_by_planner: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub last_validated_at: Option<i64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub last_activated_at: Option<i64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub promoted_at: Option<i64>,
	pub created_at: i64,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub updated_at: Option<i64>,
}

impl Concept {
	/// A freshly ingested short-term concept.
	pub fn new(name: &str, now: i64) -> Self {
		Self {
			id: uuid::Uuid::new_v4().to_string(),
			kind: NodeKind::Concept,
			name: name.to_string(),
			title: None,
			description: None,
			source_url: None,
			status: MemoryStatus::ShortTerm,
			intrinsic_confidence: DEFAULT_INTRINSIC_CONFIDENCE,
			synaptic_strength: DEFAULT_SYNAPTIC_STRENGTH,
			validated_by_planner: false,
			last_validated_at: None,
			last_activated_at: Some(now),
			promoted_at: None,
			created_at: now,
			updated_at: None,
		}
	}

	pub fn is_concept(&self) -> bool { self.kind == NodeKind::Concept }

	pub fn is_short_term(&self) -> bool { self.status == MemoryStatus::ShortTerm }

	/// Case-insensitive containment over name, title and description.
	pub fn mentions(&self, term: &str) -> bool {
		let hit = |s: &str| s.to_lowercase().contains(term);
		hit(&self.name)
			|| self.title.as_deref().map(hit).unwrap_or(false)
			|| self.description.as_deref().map(hit).unwrap_or(false)
	}

	pub fn display_name(&self) -> &str {
		if !self.name.is_empty() { return &self.name; }
		if let Some(t) = self.title.as_deref() { if !t.is_empty() { return t; } }
		&self.id
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
	pub src: String,
	pub dst: String,
	#[serde(rename = "type")]
	pub rel_type: String,
	#[serde(default)]
	pub intrinsic_confidence: f64,
	#[serde(default)]
	pub contextual_relevance: f64,
	pub created_at: i64,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub updated_at: Option<i64>,
}

impl Relationship {
	pub fn new(src: &str, dst: &str, rel_type: &str, now: i64) -> Self {
		Self {
			src: src.to_string(),
			dst: dst.to_string(),
			rel_type: rel_type.to_string(),
			intrinsic_confidence: DEFAULT_INTRINSIC_CONFIDENCE,
			contextual_relevance: DEFAULT_CONTEXTUAL_RELEVANCE,
			created_at: now,
			updated_at: None,
		}
	}

	/// Edges without positive confidence and relevance are low-trust.
	pub fn is_low_trust(&self) -> bool {
		self.intrinsic_confidence <= 0.0 || self.contextual_relevance <= 0.0
	}
}

/// Normalise a free-form relation label into the `UPPER_SNAKE` form used as edge type.
pub fn normalize_relationship(raw: &str) -> String {
	let upper = raw.trim().to_uppercase().replace(' ', "_");
	let cleaned: String = upper.chars().filter(|c| c.is_ascii_alphanumeric() || *c == '_').collect();
	if cleaned.is_empty() { DEFAULT_RELATIONSHIP.to_string() } else { cleaned }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DissonanceRecord {
	pub id: String,
	pub node_id: String,
	pub explanation: String,
	pub recorded_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaKnowledge {
	pub id: String,
	pub original_answer: String,
	pub corrected_answer: String,
	pub dissonance: String,
	pub source_url: String,
	pub source_title: String,
	pub recorded_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextSummary {
	pub id: String,
	pub session_id: String,
	pub summary: String,
	pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextNode {
	pub id: String,
	pub name: String,
	pub status: MemoryStatus,
}

/// A retrieved piece of memory as it flows through ranking and correction.
///
/// Missing numeric fields read as 0.0. `id` is the node id, or the store key
/// when the node never had one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryDocument {
	pub id: Option<String>,
	pub title: String,
	pub content: String,
	#[serde(default)]
	pub url: String,
	pub intrinsic_confidence: Option<f64>,
	pub external_confidence: Option<f64>,
	pub final_score: Option<f64>,
	pub status: Option<MemoryStatus>,
	#[serde(default)]
	pub path_weight: f64,
	#[serde(default)]
	pub context_nodes: Vec<ContextNode>,
}

impl MemoryDocument {
	pub fn intrinsic(&self) -> f64 { self.intrinsic_confidence.unwrap_or(0.0) }

	pub fn score(&self) -> f64 { self.final_score.unwrap_or(0.0) }

	/// Text handed to the completion service when judging this document.
	pub fn text(&self) -> &str {
		if !self.content.trim().is_empty() { &self.content } else { &self.title }
	}
}
