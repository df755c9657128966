//! Confidence re-ranking.
//!
//! `final_score = 0.7 * intrinsic + 0.3 * external`. External confidence is
//! only estimated by the completion service when the document brings none
//! and has no intrinsic confidence of its own.
//!
//! Ranking and reinforcement are separate steps: [`ConfidenceReranker::rank`]
//! never writes, [`ConfidenceReranker::reinforce`] only writes.
//! [`ConfidenceReranker::rerank`] runs both.

use std::cmp::Ordering;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::completion::{bounded, parse_confidence, CompletionRequest, CompletionService};
use crate::graph::{GraphStore, Reinforcement};
use crate::model::{clamp_confidence, MemoryDocument};

pub const INTRINSIC_WEIGHT: f64 = 0.7;
pub const EXTERNAL_WEIGHT: f64 = 0.3;
pub const LOW_CONFIDENCE_SCORE: f64 = 0.5;
pub const TOP_REINFORCEMENT: f64 = 0.05;
pub const REINFORCEMENT: f64 = 0.01;

const ESTIMATE_PROMPT: &str = "You are the external evaluation module of the memory engine. \
Assign a confidence between 0.0 and 1.0 to the given document, considering coherence, source and verifiability. \
Reply ONLY with a decimal number in that range.";

pub fn blended_score(intrinsic: f64, external: f64) -> f64 {
    INTRINSIC_WEIGHT * clamp_confidence(intrinsic) + EXTERNAL_WEIGHT * clamp_confidence(external)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ranking {
    pub documents: Vec<MemoryDocument>,
    pub low_confidence: bool,
}

pub struct ConfidenceReranker {
    completion: Arc<dyn CompletionService>,
    store: Arc<dyn GraphStore>,
    completion_timeout: Duration,
    store_timeout: Duration,
    last_low_confidence: AtomicBool,
}

impl ConfidenceReranker {
    pub fn new(
        completion: Arc<dyn CompletionService>,
        store: Arc<dyn GraphStore>,
        completion_timeout: Duration,
        store_timeout: Duration,
    ) -> Self {
        Self { completion, store, completion_timeout, store_timeout, last_low_confidence: AtomicBool::new(true) }
    }

    /// Outcome flag of the most recent `rerank` call.
    pub fn last_low_confidence(&self) -> bool {
        self.last_low_confidence.load(AtomicOrdering::Relaxed)
    }

    pub async fn rerank(&self, documents: Vec<MemoryDocument>) -> Ranking {
        let ranking = self.rank(documents).await;
        self.last_low_confidence.store(ranking.low_confidence, AtomicOrdering::Relaxed);
        self.reinforce(&ranking.documents).await;
        ranking
    }

    /// Score and order documents without touching the store.
    pub async fn rank(&self, documents: Vec<MemoryDocument>) -> Ranking {
        let mut scored = Vec::with_capacity(documents.len());
        for mut doc in documents {
            let intrinsic = clamp_confidence(doc.intrinsic());
            let external = match doc.external_confidence.filter(|v| !v.is_nan()) {
                Some(v) => v,
                None if intrinsic <= 0.0 => self.estimate_external(&doc).await.unwrap_or(0.0),
                None => 0.0,
            };
            let external = clamp_confidence(external);
            doc.intrinsic_confidence = Some(intrinsic);
            doc.external_confidence = Some(external);
            doc.final_score = Some(blended_score(intrinsic, external));
            scored.push(doc);
        }
        // stable: equal scores keep retrieval order
        scored.sort_by(|a, b| b.score().partial_cmp(&a.score()).unwrap_or(Ordering::Equal));
        let low_confidence = scored.first().map(|d| d.score() < LOW_CONFIDENCE_SCORE).unwrap_or(true);
        Ranking { documents: scored, low_confidence }
    }

    /// Strengthen ranked nodes: the top document by 0.05, the others by 0.01.
    /// Failures are logged and skipped.
    pub async fn reinforce(&self, ranked: &[MemoryDocument]) -> usize {
        let top = ranked.first().and_then(|d| d.id.clone());
        let mut reinforced = 0usize;
        for doc in ranked {
            if doc.intrinsic() <= 0.0 {
                continue;
            }
            let Some(id) = doc.id.as_deref().filter(|id| !id.is_empty()) else { continue };
            let delta = if top.as_deref() == Some(id) { TOP_REINFORCEMENT } else { REINFORCEMENT };
            match bounded("reinforce", self.store_timeout, self.store.reinforce(id, Reinforcement::strength(delta))).await {
                Some(true) => reinforced += 1,
                Some(false) => debug!(node_id = %id, "reinforcement target no longer exists"),
                None => warn!(node_id = %id, "could not reinforce memory"),
            }
        }
        reinforced
    }

    async fn estimate_external(&self, doc: &MemoryDocument) -> Option<f64> {
        let source = if doc.url.is_empty() { "unknown" } else { doc.url.as_str() };
        let request = CompletionRequest::text(ESTIMATE_PROMPT, format!("DOCUMENT:\n{}\n\nSOURCE: {}", doc.text(), source), 0.2);
        let raw = bounded("estimate_confidence", self.completion_timeout, self.completion.complete(request)).await?;
        let parsed = parse_confidence(&raw);
        if parsed.is_none() {
            warn!(reply = %raw, "unparseable confidence estimate");
        }
        parsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::SledGraphStore;
    use crate::model::Concept;
    use crate::testing::{temp_store, FailingStore, Hanging, ScriptedCompletion};
    use rand::Rng;

    fn doc(id: &str, intrinsic: Option<f64>, external: Option<f64>) -> MemoryDocument {
        MemoryDocument {
            id: Some(id.to_string()),
            title: id.to_string(),
            content: format!("fact about {}", id),
            intrinsic_confidence: intrinsic,
            external_confidence: external,
            ..MemoryDocument::default()
        }
    }

    fn reranker(completion: Arc<dyn CompletionService>, store: Arc<dyn GraphStore>) -> ConfidenceReranker {
        ConfidenceReranker::new(completion, store, Duration::from_millis(200), Duration::from_secs(1))
    }

    fn seeded(store: &SledGraphStore, id: &str) {
        let mut c = Concept::new(id, 0);
        c.id = id.to_string();
        store.put_node(&c).unwrap();
    }

    #[tokio::test]
    async fn empty_input_is_low_confidence() {
        let (_dir, store) = temp_store();
        let r = reranker(ScriptedCompletion::replying("0.9"), Arc::new(store));
        let ranking = r.rerank(Vec::new()).await;
        assert!(ranking.documents.is_empty());
        assert!(ranking.low_confidence);
        assert!(r.last_low_confidence());
    }

    #[tokio::test]
    async fn estimates_only_for_documents_without_intrinsic_confidence() {
        let (_dir, store) = temp_store();
        let completion = ScriptedCompletion::replying("0.6");
        let r = reranker(completion.clone(), Arc::new(store));
        let ranking = r.rank(vec![doc("trusted", Some(0.9), None), doc("unknown", Some(0.0), None)]).await;

        let calls = completion.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].user_prompt.contains("fact about unknown"));
        assert!(!calls[0].expect_json);

        let trusted = &ranking.documents[0];
        assert_eq!(trusted.id.as_deref(), Some("trusted"));
        assert_eq!(trusted.external_confidence, Some(0.0));
        assert!((trusted.score() - 0.63).abs() < 1e-9);
        let unknown = &ranking.documents[1];
        assert_eq!(unknown.external_confidence, Some(0.6));
        assert!((unknown.score() - 0.18).abs() < 1e-9);
        assert!(!ranking.low_confidence);
    }

    #[tokio::test]
    async fn supplied_external_confidence_is_used_and_clamped() {
        let (_dir, store) = temp_store();
        let completion = ScriptedCompletion::replying("0.1");
        let r = reranker(completion.clone(), Arc::new(store));
        let ranking = r.rank(vec![doc("a", None, Some(1.8)), doc("b", Some(1.4), Some(-0.2))]).await;
        assert!(completion.calls().is_empty());
        let a = ranking.documents.iter().find(|d| d.id.as_deref() == Some("a")).unwrap();
        assert_eq!(a.external_confidence, Some(1.0));
        assert!((a.score() - 0.3).abs() < 1e-9);
        assert_eq!(ranking.documents[0].id.as_deref(), Some("b"));
        assert_eq!(ranking.documents[0].intrinsic_confidence, Some(1.0));
        assert!((ranking.documents[0].score() - 0.7).abs() < 1e-9);
    }

    #[tokio::test]
    async fn infinite_external_confidence_counts_as_supplied() {
        let (_dir, store) = temp_store();
        let completion = ScriptedCompletion::replying("0.4");
        let r = reranker(completion.clone(), Arc::new(store));
        let ranking = r
            .rank(vec![doc("high", None, Some(f64::INFINITY)), doc("low", None, Some(f64::NEG_INFINITY))])
            .await;
        assert!(completion.calls().is_empty());
        assert_eq!(ranking.documents[0].id.as_deref(), Some("high"));
        assert_eq!(ranking.documents[0].external_confidence, Some(1.0));
        assert_eq!(ranking.documents[1].external_confidence, Some(0.0));

        // NaN carries no value, so the model is asked
        let ranking = r.rank(vec![doc("nan", None, Some(f64::NAN))]).await;
        assert_eq!(completion.calls().len(), 1);
        assert_eq!(ranking.documents[0].external_confidence, Some(0.4));
    }

    #[tokio::test]
    async fn failed_or_garbled_estimates_default_to_zero() {
        let (_dir, store) = temp_store();
        let garbled = reranker(ScriptedCompletion::replying("quite reliable"), Arc::new(store.clone()));
        let ranking = garbled.rank(vec![doc("x", None, None)]).await;
        assert_eq!(ranking.documents[0].external_confidence, Some(0.0));
        assert!(ranking.low_confidence);

        let hanging = reranker(Arc::new(Hanging), Arc::new(store));
        let ranking = hanging.rank(vec![doc("x", None, None)]).await;
        assert_eq!(ranking.documents[0].score(), 0.0);
    }

    #[tokio::test]
    async fn blended_scores_stay_in_bounds() {
        let (_dir, store) = temp_store();
        let r = reranker(ScriptedCompletion::replying("0.5"), Arc::new(store));
        let mut rng = rand::thread_rng();
        let docs: Vec<_> = (0..40)
            .map(|i| doc(&format!("d{}", i), Some(rng.gen_range(-1.0..2.0)), Some(rng.gen_range(-1.0..2.0))))
            .collect();
        let ranking = r.rank(docs).await;
        for d in &ranking.documents {
            let (i, e) = (d.intrinsic_confidence.unwrap(), d.external_confidence.unwrap());
            assert!((0.0..=1.0).contains(&i) && (0.0..=1.0).contains(&e));
            assert!((d.score() - (0.7 * i + 0.3 * e)).abs() < 1e-9);
        }
        for pair in ranking.documents.windows(2) {
            assert!(pair[0].score() >= pair[1].score());
        }
    }

    #[tokio::test]
    async fn rerank_reinforces_top_more_than_the_rest() {
        let (_dir, store) = temp_store();
        for id in ["top", "second", "zero"] {
            seeded(&store, id);
        }
        let r = reranker(ScriptedCompletion::replying("0.0"), Arc::new(store.clone()));
        let ranking = r
            .rerank(vec![doc("second", Some(0.4), None), doc("top", Some(0.9), None), doc("zero", Some(0.0), None)])
            .await;
        assert_eq!(ranking.documents[0].id.as_deref(), Some("top"));
        assert!(!r.last_low_confidence());

        let strength = |id: &'static str| {
            let store = store.clone();
            async move { store.get_node(id).await.unwrap().unwrap().synaptic_strength }
        };
        assert!((strength("top").await - 1.05).abs() < 1e-9);
        assert!((strength("second").await - 1.01).abs() < 1e-9);
        assert!((strength("zero").await - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn reinforcement_failures_do_not_abort_ranking() {
        let r = reranker(ScriptedCompletion::replying("0.2"), Arc::new(FailingStore));
        let ranking = r.rerank(vec![doc("a", Some(0.8), None), doc("b", Some(0.6), None)]).await;
        assert_eq!(ranking.documents.len(), 2);
        assert_eq!(r.reinforce(&ranking.documents).await, 0);
    }
}
