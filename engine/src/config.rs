use std::time::Duration;

use crate::lifecycle::LifecycleThresholds;

/// Settings the maintenance binary needs.
pub struct Config {
	pub data_dir: String,
	pub maintenance_interval: Duration,
	pub engine: EngineSettings,
}

/// Completion service endpoint. Only callers that build a
/// [`crate::completion::OpenAiCompatClient`] load it; the maintenance binary never talks to a model.
#[derive(Debug, Clone)]
pub struct CompletionConfig {
	pub base_url: String,
	pub api_key: Option<String>,
	pub model: String,
}

/// Per-call budgets and lifecycle thresholds shared by the engine components.
#[derive(Debug, Clone)]
pub struct EngineSettings {
	pub completion_timeout: Duration,
	pub store_timeout: Duration,
	pub thresholds: LifecycleThresholds,
}

impl Default for EngineSettings {
	fn default() -> Self {
		Self {
			completion_timeout: Duration::from_millis(30_000),
			store_timeout: Duration::from_millis(5_000),
			thresholds: LifecycleThresholds::default(),
		}
	}
}

fn env_ms(key: &str, default: u64) -> Duration {
	Duration::from_millis(std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default))
}

impl Config {
	pub fn load() -> anyhow::Result<Self> {
		let _ = dotenvy::dotenv();
		let data_dir = std::env::var("DATA_DIR").unwrap_or_else(|_| "./data".to_string());
		let maintenance_interval = env_ms("MAINTENANCE_INTERVAL_MS", 3_600_000);
		if maintenance_interval.is_zero() { anyhow::bail!("MAINTENANCE_INTERVAL_MS must be positive"); }
		let engine = EngineSettings {
			completion_timeout: env_ms("COMPLETION_TIMEOUT_MS", 30_000),
			store_timeout: env_ms("STORE_TIMEOUT_MS", 5_000),
			thresholds: LifecycleThresholds::default(),
		};
		Ok(Self { data_dir, maintenance_interval, engine })
	}
}

impl CompletionConfig {
	pub fn from_env() -> Self {
		let _ = dotenvy::dotenv();
		Self {
			base_url: std::env::var("COMPLETION_BASE_URL").unwrap_or_else(|_| "https://api.deepseek.com".to_string()),
			api_key: std::env::var("COMPLETION_API_KEY").ok().filter(|k| !k.trim().is_empty()),
			model: std::env::var("COMPLETION_MODEL").unwrap_or_else(|_| "deepseek-chat".to_string()),
		}
	}
}
