//! Turning free text into graph facts.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::{info, warn};

use crate::completion::{bounded, strip_json_fence, CompletionRequest, CompletionService};
use crate::graph::{GraphStore, Triple};

const EXTRACTION_PROMPT: &str = "You are the knowledge extractor of the memory engine. Read the text carefully and identify relevant facts.\n\
Return the facts as triples: subject, predicate (relationship), object.\n\
Rules:\n\
1. Use short relationships in UPPER_SNAKE_CASE (e.g. CREATED_BY, LOCATED_IN, IS_A, HAS_NAME).\n\
2. First-person statements (\"I\", \"my\") belong to the CREATOR node \
(\"My fish is called Banguela\" -> {source: 'CREATOR', relationship: 'HAS_PET', target: 'Banguela'}).\n\
3. Prefer concise concepts as targets.\n\
4. Ignore opinions and sentences without factual content.\n\
Reply ONLY with JSON in the form:\n\
{ \"triples\": [{\"source\": \"Python\", \"relationship\": \"CREATED_BY\", \"target\": \"Guido van Rossum\"}] }";

#[derive(Debug, Default, Deserialize)]
struct Extraction {
    #[serde(default)]
    triples: Vec<Triple>,
}

pub struct KnowledgeExtractor {
    completion: Arc<dyn CompletionService>,
    store: Arc<dyn GraphStore>,
    timeout: Duration,
}

impl KnowledgeExtractor {
    pub fn new(completion: Arc<dyn CompletionService>, store: Arc<dyn GraphStore>, timeout: Duration) -> Self {
        Self { completion, store, timeout }
    }

    /// Empty on any failure.
    pub async fn extract(&self, text: &str) -> Vec<Triple> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        let request = CompletionRequest::json(EXTRACTION_PROMPT, format!("TEXT TO LEARN:\n{}", text), 0.1);
        let Some(raw) = bounded("extract_knowledge", self.timeout, self.completion.complete(request)).await else {
            return Vec::new();
        };
        match serde_json::from_str::<Extraction>(strip_json_fence(&raw)) {
            Ok(extraction) => extraction.triples,
            Err(err) => {
                warn!(error = %err, "knowledge extraction returned malformed JSON");
                Vec::new()
            }
        }
    }

    /// Extract facts from `text` and merge them into the graph.
    pub async fn learn(&self, text: &str) -> anyhow::Result<usize> {
        let triples = self.extract(text).await;
        if triples.is_empty() {
            return Ok(0);
        }
        let merged = self.store.upsert_triples(&triples).await?;
        info!(extracted = triples.len(), merged, "new facts stored");
        Ok(merged)
    }
}
