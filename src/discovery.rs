//! Tool-need analysis.
//!
//! Asks the fast model whether the current query exposes a capability gap and
//! records a descriptor when it does. Descriptors are telemetry for operators
//! deciding what to build next; nothing is generated or loaded at runtime.

use std::sync::Arc;
use std::sync::Mutex;

use serde_json::Value;
use tracing::{debug, warn};

use crate::completion::{ChatMessage, ChatRequest, CompletionBackend};
use crate::config::Config;

const ANALYSIS_SYSTEM_PROMPT: &str = "You decide whether an assistant needs a new tool to \
answer a query, given the tools it already has: web_search, news_search, \
social_media_search, get_stock_info. Reply with a JSON object only:\n\
{\"needs_new_tool\": true|false, \"tool_name\": \"snake_case_name\", \
\"description\": \"what it would do\", \"priority\": \"high\"|\"medium\"|\"low\"}";

/// A recorded capability gap.
#[derive(Debug, Clone)]
pub struct ToolDescriptor {
    pub tool_name: String,
    pub description: String,
    pub priority: String,
    pub triggering_query: String,
}

pub struct ToolNeedAnalyzer {
    completion: Arc<dyn CompletionBackend>,
    fast_model: String,
    descriptors: Mutex<Vec<ToolDescriptor>>,
}

impl ToolNeedAnalyzer {
    pub fn new(completion: Arc<dyn CompletionBackend>, config: &Config) -> Self {
        Self {
            completion,
            fast_model: config.fast_model.clone(),
            descriptors: Mutex::new(Vec::new()),
        }
    }

    /// Analyze one query for a capability gap. Failures and low-priority
    /// verdicts record nothing.
    pub async fn analyze(&self, query_text: &str) {
        let request = ChatRequest::new(
            &self.fast_model,
            vec![
                ChatMessage::system(ANALYSIS_SYSTEM_PROMPT),
                ChatMessage::user(query_text),
            ],
        )
        .temperature(0.0)
        .max_tokens(150);

        let reply = match self.completion.complete(request).await {
            Ok(reply) => reply,
            Err(error) => {
                warn!(%error, "tool-need analysis failed");
                return;
            }
        };

        let verdict = match extract_json_object(&reply) {
            Some(verdict) => verdict,
            None => {
                debug!("tool-need reply carried no JSON object");
                return;
            }
        };

        let needs_new_tool = verdict
            .get("needs_new_tool")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let priority = verdict
            .get("priority")
            .and_then(Value::as_str)
            .unwrap_or("low");

        if !needs_new_tool || !matches!(priority, "high" | "medium") {
            return;
        }

        let descriptor = ToolDescriptor {
            tool_name: verdict
                .get("tool_name")
                .and_then(Value::as_str)
                .unwrap_or("unnamed_tool")
                .to_string(),
            description: verdict
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            priority: priority.to_string(),
            triggering_query: query_text.to_string(),
        };
        debug!(tool = %descriptor.tool_name, priority = %descriptor.priority,
               "capability gap recorded");

        self.lock().push(descriptor);
    }

    pub fn descriptor_count(&self) -> usize {
        self.lock().len()
    }

    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<ToolDescriptor>> {
        self.descriptors.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Pull the JSON object out of a chatty reply by slicing between the first
/// `{` and the last `}`.
fn extract_json_object(reply: &str) -> Option<Value> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&reply[start..=end]).ok()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_extraction_tolerates_prose() {
        let reply = "Sure! Here is my verdict: {\"needs_new_tool\": true, \
                     \"priority\": \"high\"} hope that helps";
        let verdict = extract_json_object(reply).unwrap();
        assert_eq!(verdict["needs_new_tool"], true);
    }

    #[test]
    fn json_extraction_rejects_garbage() {
        assert!(extract_json_object("no json here").is_none());
        assert!(extract_json_object("} backwards {").is_none());
        assert!(extract_json_object("{not valid json}").is_none());
    }
}
