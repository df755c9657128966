//! The memory engine facade.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::completion::{bounded, CompletionService};
use crate::config::EngineSettings;
use crate::correction::SelfCorrectionEngine;
use crate::graph::GraphStore;
use crate::ingest::KnowledgeExtractor;
use crate::lifecycle::{LifecycleManager, MaintenanceReport};
use crate::model::MemoryDocument;
use crate::planner::{SearchPlan, SearchPlanner};
use crate::rerank::ConfidenceReranker;
use crate::search::QuantumSearch;

/// Documents handed to answer generation per recall.
pub const RECALL_LIMIT: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecallOutcome {
	pub plan: SearchPlan,
	pub documents: Vec<MemoryDocument>,
	pub low_confidence: bool,
}

pub struct MemoryEngine {
	planner: Arc<dyn SearchPlanner>,
	settings: EngineSettings,
	search: QuantumSearch,
	reranker: ConfidenceReranker,
	corrector: SelfCorrectionEngine,
	extractor: KnowledgeExtractor,
	lifecycle: LifecycleManager,
}

impl MemoryEngine {
	pub fn new(
		settings: EngineSettings,
		store: Arc<dyn GraphStore>,
		completion: Arc<dyn CompletionService>,
		planner: Arc<dyn SearchPlanner>,
	) -> Self {
		let (ct, st) = (settings.completion_timeout, settings.store_timeout);
		Self {
			planner,
			search: QuantumSearch::new(store.clone(), st),
			reranker: ConfidenceReranker::new(completion.clone(), store.clone(), ct, st),
			corrector: SelfCorrectionEngine::new(completion.clone(), store.clone(), ct, st),
			extractor: KnowledgeExtractor::new(completion, store.clone(), ct),
			lifecycle: LifecycleManager::with_thresholds(store, settings.thresholds),
			settings,
		}
	}

	pub fn lifecycle(&self) -> &LifecycleManager { &self.lifecycle }

	/// Plan, search and re-rank. Reinforces the returned memories.
	pub async fn recall(&self, query: &str) -> RecallOutcome {
		let plan = match bounded("plan_search", self.settings.completion_timeout, self.planner.plan(query)).await {
			Some(plan) => plan,
			None => {
				warn!("planner unavailable, searching the raw query");
				SearchPlan::fallback(query)
			}
		};
		let documents = self.search.search(plan.query_or(query), Some(&plan.usage_context), RECALL_LIMIT).await;
		let ranking = self.reranker.rerank(documents).await;
		info!(
			strategy = %plan.strategy,
			usage_context = %plan.usage_context,
			results = ranking.documents.len(),
			low_confidence = ranking.low_confidence,
			"recall finished"
		);
		RecallOutcome { plan, documents: ranking.documents, low_confidence: ranking.low_confidence }
	}

	/// Check a generated answer against the facts it was built from.
	pub async fn verify(&self, answer: &str, facts: &[MemoryDocument]) -> String {
		self.corrector.correct(answer, facts).await
	}

	/// Extract facts from `text` and merge them into the graph.
	pub async fn learn(&self, text: &str) -> anyhow::Result<usize> {
		self.extractor.learn(text).await
	}

	pub async fn maintain(&self) -> MaintenanceReport {
		self.lifecycle.run_cycle().await
	}
}
