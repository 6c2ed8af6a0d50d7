//! Tool registry and plan execution.
//!
//! Each tool wraps one collaborator call behind a uniform JSON-in, JSON-out
//! interface. The execution engine runs a plan's calls strictly in order,
//! isolates per-tool failures as `{"error": …}` outputs, and reports
//! human-readable progress per call.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::warn;

use crate::backends::{FinanceBackend, SearchBackend};
use crate::progress::{emit_status, ProgressSender};
use crate::types::{Plan, ToolOutputs};

/// A registered capability the planner can invoke.
///
/// `execute` returns `Err(String)` rather than the crate error type: a failed
/// tool is recorded as data in the outputs, never propagated upward.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    async fn execute(&self, params: &Value) -> Result<Value, String>;
}

fn str_param<'a>(params: &'a Value, key: &str) -> Result<&'a str, String> {
    params
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("missing required parameter '{key}'"))
}

// ── Concrete tools ────────────────────────────────────────────────────────────

pub struct WebSearchTool {
    search: Arc<dyn SearchBackend>,
}

impl WebSearchTool {
    pub fn new(search: Arc<dyn SearchBackend>) -> Self {
        Self { search }
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "General web search returning titled, linked results"
    }

    async fn execute(&self, params: &Value) -> Result<Value, String> {
        let query = str_param(params, "query")?;
        let limit = params
            .get("limit")
            .and_then(Value::as_u64)
            .unwrap_or(5) as usize;
        let results = self
            .search
            .web_search(query, limit)
            .await
            .map_err(|e| e.to_string())?;
        Ok(Value::Array(results))
    }
}

pub struct NewsSearchTool {
    search: Arc<dyn SearchBackend>,
}

impl NewsSearchTool {
    pub fn new(search: Arc<dyn SearchBackend>) -> Self {
        Self { search }
    }
}

#[async_trait]
impl Tool for NewsSearchTool {
    fn name(&self) -> &str {
        "news_search"
    }

    fn description(&self) -> &str {
        "News search returning dated, attributed headlines"
    }

    async fn execute(&self, params: &Value) -> Result<Value, String> {
        let query = str_param(params, "query")?;
        let limit = params
            .get("limit")
            .and_then(Value::as_u64)
            .unwrap_or(5) as usize;
        let results = self
            .search
            .news_search(query, limit)
            .await
            .map_err(|e| e.to_string())?;
        Ok(Value::Array(results))
    }
}

pub struct SocialMediaSearchTool {
    search: Arc<dyn SearchBackend>,
}

impl SocialMediaSearchTool {
    pub fn new(search: Arc<dyn SearchBackend>) -> Self {
        Self { search }
    }
}

#[async_trait]
impl Tool for SocialMediaSearchTool {
    fn name(&self) -> &str {
        "social_media_search"
    }

    fn description(&self) -> &str {
        "Platform-scoped social media search"
    }

    async fn execute(&self, params: &Value) -> Result<Value, String> {
        let query = str_param(params, "query")?;
        let platform = params
            .get("platform")
            .and_then(Value::as_str)
            .unwrap_or("instagram");
        let results = self
            .search
            .social_media_search(query, platform)
            .await
            .map_err(|e| e.to_string())?;
        Ok(Value::Array(results))
    }
}

pub struct StockInfoTool {
    finance: Arc<dyn FinanceBackend>,
}

impl StockInfoTool {
    pub fn new(finance: Arc<dyn FinanceBackend>) -> Self {
        Self { finance }
    }
}

#[async_trait]
impl Tool for StockInfoTool {
    fn name(&self) -> &str {
        "get_stock_info"
    }

    fn description(&self) -> &str {
        "Current quote data for one ticker symbol"
    }

    async fn execute(&self, params: &Value) -> Result<Value, String> {
        let ticker = str_param(params, "ticker")?;
        self.finance
            .stock_info(ticker)
            .await
            .map_err(|e| e.to_string())
    }
}

// ── Registry and execution engine ─────────────────────────────────────────────

/// Name-keyed collection of registered tools.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the standard registry over the two backends.
    pub fn standard(search: Arc<dyn SearchBackend>, finance: Arc<dyn FinanceBackend>) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(WebSearchTool::new(search.clone())));
        registry.register(Arc::new(NewsSearchTool::new(search.clone())));
        registry.register(Arc::new(SocialMediaSearchTool::new(search)));
        registry.register(Arc::new(StockInfoTool::new(finance)));
        registry
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Executes a classified plan against the registry.
pub struct ToolExecutionEngine {
    registry: ToolRegistry,
}

impl ToolExecutionEngine {
    pub fn new(registry: ToolRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Run every call in `plan` in order. One failing tool never aborts the
    /// rest; its output slot records the error message instead.
    pub async fn execute_plan(&self, plan: &Plan, progress: &ProgressSender) -> ToolOutputs {
        let total = plan.tool_calls.len();
        let mut outputs: ToolOutputs = Vec::with_capacity(total);

        for (index, call) in plan.tool_calls.iter().enumerate() {
            let position = index + 1;
            emit_status(
                progress,
                format!("Running {} ({position}/{total})...", call.tool_name),
            );

            let tool = match self.registry.get(&call.tool_name) {
                Some(tool) => tool,
                None => {
                    warn!(tool = %call.tool_name, "planned tool is not registered, skipping");
                    continue;
                }
            };

            match tool.execute(&call.parameters).await {
                Ok(value) => {
                    emit_status(progress, describe_output(&call.tool_name, &value));
                    outputs.push((call.tool_name.clone(), value));
                }
                Err(message) => {
                    warn!(tool = %call.tool_name, error = %message, "tool execution failed");
                    emit_status(progress, format!("{} hit an error", call.tool_name));
                    outputs.push((call.tool_name.clone(), json!({"error": message})));
                }
            }
        }

        outputs
    }
}

fn describe_output(tool_name: &str, value: &Value) -> String {
    match value {
        Value::Array(items) if items.is_empty() => format!("{tool_name} found no results"),
        Value::Array(items) => format!("{tool_name} found {} results", items.len()),
        Value::Object(map) if map.contains_key("error") => format!("{tool_name} was limited"),
        _ => format!("{tool_name} completed"),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AgentError;
    use crate::progress::channel;
    use crate::types::ToolCall;

    struct FlakySearch;

    #[async_trait]
    impl SearchBackend for FlakySearch {
        async fn web_search(&self, _q: &str, _n: usize) -> Result<Vec<Value>, AgentError> {
            Ok(vec![json!({"title": "T", "snippet": "S", "url": "https://e.com"})])
        }

        async fn news_search(&self, _q: &str, _n: usize) -> Result<Vec<Value>, AgentError> {
            Err(AgentError::Search("gateway down".to_string()))
        }

        async fn social_media_search(
            &self,
            _q: &str,
            _p: &str,
        ) -> Result<Vec<Value>, AgentError> {
            Ok(vec![])
        }
    }

    struct NoFinance;

    #[async_trait]
    impl FinanceBackend for NoFinance {
        async fn stock_info(&self, _t: &str) -> Result<Value, AgentError> {
            Err(AgentError::Finance("unreachable".to_string()))
        }
    }

    fn engine() -> ToolExecutionEngine {
        ToolExecutionEngine::new(ToolRegistry::standard(
            Arc::new(FlakySearch),
            Arc::new(NoFinance),
        ))
    }

    #[tokio::test]
    async fn failing_tool_does_not_abort_plan() {
        let plan = Plan {
            category: crate::types::QueryCategory::News,
            tool_calls: vec![
                ToolCall::new("news_search", json!({"query": "ai"})),
                ToolCall::new("web_search", json!({"query": "ai"})),
            ],
            log: String::new(),
        };
        let (tx, _rx) = channel();
        let outputs = engine().execute_plan(&plan, &tx).await;

        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[0].0, "news_search");
        assert!(outputs[0].1.get("error").is_some());
        assert_eq!(outputs[1].0, "web_search");
        assert!(outputs[1].1.is_array());
    }

    #[tokio::test]
    async fn unknown_tool_is_skipped() {
        let plan = Plan {
            category: crate::types::QueryCategory::GeneralWeb,
            tool_calls: vec![
                ToolCall::new("does_not_exist", json!({})),
                ToolCall::new("web_search", json!({"query": "ai"})),
            ],
            log: String::new(),
        };
        let (tx, _rx) = channel();
        let outputs = engine().execute_plan(&plan, &tx).await;

        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].0, "web_search");
    }

    #[tokio::test]
    async fn missing_parameter_becomes_error_output() {
        let plan = Plan {
            category: crate::types::QueryCategory::GeneralWeb,
            tool_calls: vec![ToolCall::new("web_search", json!({}))],
            log: String::new(),
        };
        let (tx, _rx) = channel();
        let outputs = engine().execute_plan(&plan, &tx).await;

        assert_eq!(outputs.len(), 1);
        let message = outputs[0].1["error"].as_str().unwrap();
        assert!(message.contains("query"));
    }
}
