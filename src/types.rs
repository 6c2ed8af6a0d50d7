//! Shared types and data structures for the query-orchestration pipeline.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An inbound user query. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct Query {
    pub user_id: String,
    pub text: String,
    pub received_at: chrono::DateTime<chrono::Utc>,
}

impl Query {
    pub fn new(user_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            text: text.into(),
            received_at: chrono::Utc::now(),
        }
    }
}

/// Sentiment annotation attached to a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

/// A single completed turn of conversation, owned by `ConversationMemory`.
/// Appended, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub query_text: String,
    pub response_text: String,
    pub topics: Vec<String>,
    pub sentiment: Sentiment,
    /// 1..=10 scale.
    pub complexity: u8,
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Query category decided by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryCategory {
    Casual,
    SocialMedia,
    Financial,
    News,
    GeneralWeb,
    Memory,
}

impl std::fmt::Display for QueryCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            QueryCategory::Casual => "CASUAL",
            QueryCategory::SocialMedia => "SOCIAL_MEDIA",
            QueryCategory::Financial => "FINANCIAL",
            QueryCategory::News => "NEWS",
            QueryCategory::GeneralWeb => "GENERAL_WEB",
            QueryCategory::Memory => "MEMORY",
        };
        f.write_str(label)
    }
}

/// A planned invocation of one registered tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool_name: String,
    pub parameters: serde_json::Value,
}

impl ToolCall {
    pub fn new(tool_name: impl Into<String>, parameters: serde_json::Value) -> Self {
        Self {
            tool_name: tool_name.into(),
            parameters,
        }
    }
}

/// The classifier's decision: a category and an ordered list of tool calls.
///
/// `tool_calls` is empty exactly when `category` is [`QueryCategory::Casual`]
/// or [`QueryCategory::Memory`].
#[derive(Debug, Clone)]
pub struct Plan {
    pub category: QueryCategory,
    pub tool_calls: Vec<ToolCall>,
    pub log: String,
}

/// Ordered tool outputs keyed by tool name, preserving execution order.
/// Failed calls appear as `{"error": message}` values; list outputs may carry
/// per-item error markers (partial success).
pub type ToolOutputs = Vec<(String, serde_json::Value)>;

/// Result of one specialist agent run after prose synthesis.
#[derive(Debug, Clone)]
pub struct SpecialistResult {
    pub agent_name: String,
    /// The agent's structured payload, echoed verbatim for source extraction.
    pub payload: serde_json::Value,
    pub content: String,
}

/// Classification of an attributed source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Research,
    ResearchSecondary,
    Financial,
    News,
    Social,
    Web,
}

/// One attributed source in the final payload. Ids are 1-based and dense.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub id: u32,
    pub title: String,
    pub url: String,
    #[serde(rename = "type")]
    pub kind: SourceType,
    pub platform: String,
}

/// A proactive suggestion derived from recent conversation patterns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProactiveSuggestion {
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub description: String,
    pub priority: String,
}

/// The final answer unit: cached, emitted on the progress channel, and stored
/// to durable memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponsePayload {
    pub response: String,
    /// 0..=100.
    pub confidence: u8,
    pub sources: Vec<Source>,
    pub processing_time_s: f64,
    pub method: String,
    pub tools_used: usize,
    pub sources_found: usize,
    pub personalization_applied: bool,
    pub proactive_suggestions: Vec<ProactiveSuggestion>,
    /// Stream snapshots folded into this request, keyed by stream kind.
    pub real_time_data: serde_json::Map<String, serde_json::Value>,
}

/// Read-only system health snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: String,
    pub active_data_streams: usize,
    pub cache: crate::cache::CacheStats,
    pub discovered_tools: usize,
    pub streams_initialized: bool,
    pub uptime_secs: u64,
}
