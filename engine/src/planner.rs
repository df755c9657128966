//! Search planner contract.
//!
//! The planner turns a raw user query into a search plan. It is an outside
//! collaborator; the engine only consumes its output and passes
//! `usage_context` to the search untouched.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub const DEFAULT_STRATEGY: &str = "quantum_search";
pub const DEFAULT_USAGE_CONTEXT: &str = "general research";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchPlan {
	#[serde(default = "default_strategy", alias = "tool")]
	pub strategy: String,
	#[serde(default)]
	pub optimized_query: String,
	#[serde(default = "default_usage_context")]
	pub usage_context: String,
}

fn default_strategy() -> String { DEFAULT_STRATEGY.to_string() }

fn default_usage_context() -> String { DEFAULT_USAGE_CONTEXT.to_string() }

impl SearchPlan {
	/// Plan used when the planner fails: search the raw query as general research.
	pub fn fallback(query: &str) -> Self {
		Self { strategy: default_strategy(), optimized_query: query.trim().to_string(), usage_context: default_usage_context() }
	}

	/// The query to search with, falling back to `original` when the planner left it blank.
	pub fn query_or<'a>(&'a self, original: &'a str) -> &'a str {
		if self.optimized_query.trim().is_empty() { original } else { &self.optimized_query }
	}
}

#[async_trait]
pub trait SearchPlanner: Send + Sync {
	async fn plan(&self, query: &str) -> Result<SearchPlan>;
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn fallback_plan_is_general_research() {
		let plan = SearchPlan::fallback("  qual o nome do meu peixe? ");
		assert_eq!(plan.strategy, "quantum_search");
		assert_eq!(plan.optimized_query, "qual o nome do meu peixe?");
		assert_eq!(plan.usage_context, "general research");
	}

	#[test]
	fn partial_planner_output_gets_defaults() {
		let plan: SearchPlan = serde_json::from_str(r#"{"tool": "quantum_search", "optimized_query": "peixe"}"#).unwrap();
		assert_eq!(plan.strategy, "quantum_search");
		assert_eq!(plan.usage_context, DEFAULT_USAGE_CONTEXT);
		assert_eq!(plan.query_or("raw"), "peixe");

		let blank: SearchPlan = serde_json::from_str(r#"{"usage_context": "auditoria"}"#).unwrap();
		assert_eq!(blank.query_or("raw"), "raw");
		assert_eq!(blank.usage_context, "auditoria");
	}
}
