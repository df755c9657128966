//! Shared fixtures for unit tests.

use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::completion::{CompletionRequest, CompletionService};
use crate::graph::{GraphStore, PathQuery, PathRow, Reinforcement, SledGraphStore, Triple};
use crate::lifecycle::LifecycleThresholds;
use crate::model::{Concept, ContextSummary, DissonanceRecord, MetaKnowledge};

/// A store on a throwaway directory; keep the `TempDir` alive for the test.
pub fn temp_store() -> (tempfile::TempDir, SledGraphStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = SledGraphStore::open(dir.path().join("kv")).unwrap();
    (dir, store)
}

type Responder = Box<dyn Fn(&CompletionRequest) -> Result<String> + Send + Sync>;

/// Completion fake answering through a closure and recording every request.
pub struct ScriptedCompletion {
    responder: Responder,
    calls: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedCompletion {
    pub fn new(responder: impl Fn(&CompletionRequest) -> Result<String> + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self { responder: Box::new(responder), calls: Mutex::new(Vec::new()) })
    }

    pub fn replying(reply: &'static str) -> Arc<Self> {
        Self::new(move |_| Ok(reply.to_string()))
    }

    pub fn failing() -> Arc<Self> {
        Self::new(|_| Err(anyhow!("completion service unreachable")))
    }

    pub fn calls(&self) -> Vec<CompletionRequest> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionService for ScriptedCompletion {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        let reply = (self.responder)(&request);
        self.calls.lock().unwrap().push(request);
        reply
    }
}

/// Completion service that never answers.
pub struct Hanging;

#[async_trait]
impl CompletionService for Hanging {
    async fn complete(&self, _request: CompletionRequest) -> Result<String> {
        std::future::pending::<()>().await;
        Err(anyhow!("unreachable"))
    }
}

/// Graph store whose every call fails, as if the backend were down.
pub struct FailingStore;

fn down<T>() -> Result<T> {
    Err(anyhow!("graph store unavailable"))
}

#[async_trait]
impl GraphStore for FailingStore {
    async fn weighted_paths(&self, _query: &PathQuery) -> Result<Vec<PathRow>> { down() }
    async fn find_concepts(&self, _term: &str, _limit: usize) -> Result<Vec<Concept>> { down() }
    async fn get_node(&self, _id: &str) -> Result<Option<Concept>> { down() }
    async fn reinforce(&self, _id: &str, _change: Reinforcement) -> Result<bool> { down() }
    async fn upsert_triples(&self, _triples: &[Triple]) -> Result<usize> { down() }
    async fn seed_genesis(&self) -> Result<bool> { down() }
    async fn backfill_ids(&self) -> Result<usize> { down() }
    async fn repair_confidences(&self) -> Result<usize> { down() }
    async fn decay_strength(&self, _factor: f64) -> Result<usize> { down() }
    async fn promote_concepts(&self, _thresholds: &LifecycleThresholds, _now: i64) -> Result<usize> { down() }
    async fn prune_concepts(&self, _thresholds: &LifecycleThresholds) -> Result<usize> { down() }
    async fn record_dissonance(&self, _node_id: &str, _explanation: &str) -> Result<DissonanceRecord> { down() }
    async fn dissonances_for(&self, _node_id: &str) -> Result<Vec<DissonanceRecord>> { down() }
    async fn record_meta_knowledge(&self, _entry: MetaKnowledge) -> Result<()> { down() }
    async fn meta_knowledge(&self) -> Result<Vec<MetaKnowledge>> { down() }
    async fn save_context_summary(&self, _session_id: &str, _summary: &str) -> Result<ContextSummary> { down() }
    async fn context_summary(&self, _session_id: &str) -> Result<Option<ContextSummary>> { down() }
}
