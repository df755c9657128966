//! Answer self-correction against high-confidence facts.
//!
//! Every trusted fact first goes through a one-word contradiction check;
//! only facts that fail it pay for the structured diagnosis. The first
//! confirmed contradiction rewrites the answer, leaves a dissonance record
//! on the fact's node, penalises that node and logs the correction as
//! meta-knowledge.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::{info, warn};

use crate::completion::{bounded, strip_json_fence, CompletionRequest, CompletionService};
use crate::graph::{GraphStore, Reinforcement};
use crate::model::{now_ms, MemoryDocument, MetaKnowledge};

pub const HIGH_CONFIDENCE_THRESHOLD: f64 = 0.75;
pub const CONTRADICTION_PENALTY: f64 = 0.1;

const DEFAULT_DISSONANCE: &str = "Cognitive dissonance detected during self-correction.";

const QUICK_CHECK_PROMPT: &str = "You are the fast validation module of the memory engine.\n\
Compare the generated answer with the consolidated fact.\n\
Reply only with YES or NO, stating whether there is a direct contradiction.";

const DIAGNOSIS_PROMPT: &str = "You are the self-correction module of the memory engine. \
Your job is to protect the integrity of memory. Decide whether the given answer contradicts the \
HIGH-CONFIDENCE consolidated fact.\n\
Reply strictly with JSON in the form:\n\
{\n  \"contradiction\": true | false,\n  \"corrected_response\": \"text\",\n  \"dissonance\": \"short explanation\"\n}\n\
If there is no contradiction set \"contradiction\" to false and leave the other fields empty.";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Diagnosis {
    #[serde(default)]
    pub contradiction: bool,
    #[serde(default)]
    pub corrected_response: String,
    #[serde(default)]
    pub dissonance: String,
}

/// `None` for anything that is not a JSON object with the expected fields.
pub fn parse_diagnosis(raw: &str) -> Option<Diagnosis> {
    serde_json::from_str(strip_json_fence(raw)).ok()
}

/// A quick-check reply counts as a contradiction when its first word is yes.
pub fn is_affirmative(raw: &str) -> bool {
    raw.split_whitespace()
        .next()
        .map(|w| w.to_lowercase())
        .map(|w| w.starts_with("yes") || w.starts_with("sim"))
        .unwrap_or(false)
}

pub struct SelfCorrectionEngine {
    completion: Arc<dyn CompletionService>,
    store: Arc<dyn GraphStore>,
    completion_timeout: Duration,
    store_timeout: Duration,
}

impl SelfCorrectionEngine {
    pub fn new(
        completion: Arc<dyn CompletionService>,
        store: Arc<dyn GraphStore>,
        completion_timeout: Duration,
        store_timeout: Duration,
    ) -> Self {
        Self { completion, store, completion_timeout, store_timeout }
    }

    /// Return `answer`, or its corrected form when a trusted fact contradicts it.
    /// Facts are checked in the order given.
    pub async fn correct(&self, answer: &str, facts: &[MemoryDocument]) -> String {
        if answer.trim().is_empty() || facts.is_empty() {
            return answer.to_string();
        }
        let trusted = facts.iter().filter(|f| f.intrinsic() >= HIGH_CONFIDENCE_THRESHOLD);
        for fact in trusted {
            if !self.quick_check(answer, fact).await {
                continue;
            }
            let Some(diagnosis) = self.diagnose(answer, fact).await else { continue };
            if !diagnosis.contradiction {
                continue;
            }
            let corrected = if diagnosis.corrected_response.trim().is_empty() {
                answer.to_string()
            } else {
                diagnosis.corrected_response.clone()
            };
            self.record(answer, &corrected, fact, &diagnosis.dissonance).await;
            info!(fact = %fact.title, "answer corrected against trusted memory");
            return corrected;
        }
        answer.to_string()
    }

    async fn quick_check(&self, answer: &str, fact: &MemoryDocument) -> bool {
        let request = CompletionRequest::text(
            QUICK_CHECK_PROMPT,
            format!("Consolidated fact: {}\nGenerated answer: {}\nIs there a direct contradiction? (YES/NO)", fact.text(), answer),
            0.0,
        );
        bounded("contradiction_precheck", self.completion_timeout, self.completion.complete(request))
            .await
            .map(|raw| is_affirmative(&raw))
            .unwrap_or(false)
    }

    async fn diagnose(&self, answer: &str, fact: &MemoryDocument) -> Option<Diagnosis> {
        let source = if fact.url.is_empty() { "unknown" } else { fact.url.as_str() };
        let request = CompletionRequest::json(
            DIAGNOSIS_PROMPT,
            format!(
                "CURRENT ANSWER:\n{}\n\nCONSOLIDATED FACT (high confidence, source {}):\n{}\n\n\
                 If they conflict, correct the answer to follow the fact and briefly explain the dissonance.",
                answer,
                source,
                fact.text()
            ),
            0.1,
        );
        let raw = bounded("contradiction_diagnosis", self.completion_timeout, self.completion.complete(request)).await?;
        let parsed = parse_diagnosis(&raw);
        if parsed.is_none() {
            warn!("malformed contradiction diagnosis, treating as no contradiction");
        }
        parsed
    }

    async fn record(&self, original: &str, corrected: &str, fact: &MemoryDocument, dissonance: &str) {
        if let Some(node_id) = fact.id.as_deref().filter(|id| !id.is_empty()) {
            let explanation = if dissonance.trim().is_empty() { DEFAULT_DISSONANCE } else { dissonance };
            if bounded("record_dissonance", self.store_timeout, self.store.record_dissonance(node_id, explanation)).await.is_none() {
                warn!(%node_id, "could not record dissonance");
            }
            let penalty = Reinforcement {
                strength_delta: -CONTRADICTION_PENALTY,
                confidence_delta: -CONTRADICTION_PENALTY,
                validated: false,
            };
            if bounded("contradiction_penalty", self.store_timeout, self.store.reinforce(node_id, penalty)).await.is_none() {
                warn!(%node_id, "could not lower confidence of contradicted memory");
            }
        }
        let entry = MetaKnowledge {
            id: uuid::Uuid::new_v4().to_string(),
            original_answer: original.to_string(),
            corrected_answer: corrected.to_string(),
            dissonance: dissonance.to_string(),
            source_url: fact.url.clone(),
            source_title: fact.title.clone(),
            recorded_at: now_ms(),
        };
        if bounded("record_meta_knowledge", self.store_timeout, self.store.record_meta_knowledge(entry)).await.is_none() {
            warn!("could not persist meta-knowledge");
        }
    }
}
