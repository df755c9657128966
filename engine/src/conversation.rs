//! Recent conversation text and its compression into context summaries.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::completion::{bounded, CompletionRequest, CompletionService};
use crate::graph::GraphStore;
use crate::model::{now_ms, ContextSummary};

const MESSAGES: &str = "chat_messages";

/// Transcripts longer than this are summarized.
pub const COMPRESSION_THRESHOLD_CHARS: usize = 4_000;

const SUMMARY_PROMPT: &str = "You are the memory compressor. Summarize the conversation below in one dense paragraph, \
keeping names, facts, decisions and open questions. Reply only with the summary.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
	pub id: String,
	pub session_id: String,
	pub role: String,
	pub content: String,
	pub timestamp: i64,
}

impl ChatMessage {
	pub fn new(session_id: &str, role: &str, content: &str) -> Self {
		Self {
			id: uuid::Uuid::new_v4().to_string(),
			session_id: session_id.to_string(),
			role: role.to_string(),
			content: content.to_string(),
			timestamp: now_ms(),
		}
	}
}

#[async_trait]
pub trait ShortTermStore: Send + Sync {
	async fn append(&self, message: ChatMessage) -> Result<()>;
	/// Messages of one session, oldest first.
	async fn transcript(&self, session_id: &str) -> Result<Vec<ChatMessage>>;
}

#[derive(Clone)]
pub struct SledShortTermStore {
	tree: sled::Tree,
}

impl SledShortTermStore {
	pub fn new(db: &sled::Db) -> Result<Self> {
		Ok(Self { tree: db.open_tree(MESSAGES).context("open chat message tree")? })
	}

	pub fn open(path: impl AsRef<Path>) -> Result<Self> {
		let db = sled::open(path.as_ref()).with_context(|| format!("open sled db at {}", path.as_ref().display()))?;
		Self::new(&db)
	}
}

fn session_prefix(session_id: &str) -> String { format!("{}::", session_id) }

#[async_trait]
impl ShortTermStore for SledShortTermStore {
	async fn append(&self, message: ChatMessage) -> Result<()> {
		let key = format!("{}{:020}::{}", session_prefix(&message.session_id), message.timestamp, message.id);
		self.tree.insert(key.as_bytes(), serde_json::to_vec(&message)?)?;
		Ok(())
	}

	async fn transcript(&self, session_id: &str) -> Result<Vec<ChatMessage>> {
		let mut out = Vec::new();
		for kv in self.tree.scan_prefix(session_prefix(session_id).as_bytes()) {
			let (_, v) = kv?;
			match serde_json::from_slice::<ChatMessage>(&v) {
				Ok(msg) => out.push(msg),
				Err(err) => warn!(%session_id, error = %err, "skipping undecodable chat message"),
			}
		}
		Ok(out)
	}
}

/// `ROLE: content` per line.
pub fn render_transcript(messages: &[ChatMessage]) -> String {
	messages.iter().map(|m| format!("{}: {}", m.role.to_uppercase(), m.content)).collect::<Vec<_>>().join("\n")
}

pub struct ContextCompressor {
	messages: Arc<dyn ShortTermStore>,
	store: Arc<dyn GraphStore>,
	completion: Arc<dyn CompletionService>,
	completion_timeout: Duration,
	store_timeout: Duration,
}

impl ContextCompressor {
	pub fn new(
		messages: Arc<dyn ShortTermStore>,
		store: Arc<dyn GraphStore>,
		completion: Arc<dyn CompletionService>,
		completion_timeout: Duration,
		store_timeout: Duration,
	) -> Self {
		Self { messages, store, completion, completion_timeout, store_timeout }
	}

	/// Summarize an over-long session. Returns the stored summary, or `None`
	/// when the transcript is short enough or any step failed.
	pub async fn compress(&self, session_id: &str) -> Option<ContextSummary> {
		let messages = bounded("transcript", self.store_timeout, self.messages.transcript(session_id)).await?;
		let transcript = render_transcript(&messages);
		if transcript.chars().count() <= COMPRESSION_THRESHOLD_CHARS {
			debug!(%session_id, chars = transcript.len(), "transcript below compression threshold");
			return None;
		}

		let request = CompletionRequest::text(SUMMARY_PROMPT, transcript, 0.2);
		let summary = bounded("summarize", self.completion_timeout, self.completion.complete(request)).await?;
		let summary = summary.trim();
		if summary.is_empty() {
			warn!(%session_id, "completion returned an empty summary");
			return None;
		}

		let saved = bounded("save_context_summary", self.store_timeout, self.store.save_context_summary(session_id, summary)).await?;
		info!(%session_id, messages = messages.len(), "conversation compressed");
		Some(saved)
	}
}
