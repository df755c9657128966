//! Confidence-weighted knowledge-graph memory.
//!
//! Concepts and typed relationships live in a sled-backed graph. Retrieval
//! walks trusted paths from the origin node, re-ranks the hits by blended
//! confidence and strengthens what was used. A periodic lifecycle pass
//! decays, promotes and prunes concepts, and answers are checked against
//! high-confidence facts before they leave the engine.

pub mod completion;
pub mod config;
pub mod conversation;
pub mod correction;
pub mod engine;
pub mod graph;
pub mod ingest;
pub mod lifecycle;
pub mod model;
pub mod planner;
pub mod rerank;
pub mod search;

#[cfg(test)]
pub(crate) mod testing;

pub use completion::{CompletionRequest, CompletionService, OpenAiCompatClient};
pub use config::{CompletionConfig, Config, EngineSettings};
pub use engine::{MemoryEngine, RecallOutcome};
pub use graph::{GraphStore, SledGraphStore};
pub use lifecycle::{LifecycleManager, LifecycleThresholds, MaintenanceReport};
pub use model::{Concept, MemoryDocument, MemoryStatus, Relationship};
pub use planner::{SearchPlan, SearchPlanner};
