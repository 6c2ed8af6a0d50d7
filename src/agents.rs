//! Specialist agents and their orchestrator.
//!
//! Each agent declares the queries it can handle via keyword matching and
//! produces a structured JSON payload. The orchestrator tries agents in a
//! fixed priority order, hands the first match's payload to a smart-model
//! synthesis pass, and reports `Ok(None)` when nobody volunteers so the
//! caller can fall back to the tool pipeline.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::backends::{FinanceBackend, SearchBackend};
use crate::completion::{ChatMessage, ChatRequest, CompletionBackend};
use crate::config::Config;
use crate::error::AgentError;
use crate::types::{Query, SpecialistResult};

/// Shared collaborators handed to every agent.
pub struct AgentContext {
    pub completion: Arc<dyn CompletionBackend>,
    pub search: Arc<dyn SearchBackend>,
    pub finance: Arc<dyn FinanceBackend>,
    pub fast_model: String,
}

/// A domain specialist. `can_handle` must be cheap and deterministic;
/// `process` does the real work and may fail.
#[async_trait]
pub trait SpecialistAgent: Send + Sync {
    fn name(&self) -> &str;
    fn can_handle(&self, query_text: &str) -> bool;
    async fn process(&self, query: &Query, ctx: &AgentContext) -> Result<Value, AgentError>;
}

fn contains_any(text: &str, keywords: &[&str]) -> bool {
    let lower = text.to_lowercase();
    keywords.iter().any(|k| lower.contains(k))
}

// ── Research agent ────────────────────────────────────────────────────────────

pub struct ResearchAgent;

const RESEARCH_KEYWORDS: &[&str] = &[
    "research",
    "find information",
    "tell me about",
    "what is",
    "explain",
    "how does",
    "latest news",
    "recent developments",
];

#[async_trait]
impl SpecialistAgent for ResearchAgent {
    fn name(&self) -> &str {
        "research"
    }

    fn can_handle(&self, query_text: &str) -> bool {
        contains_any(query_text, RESEARCH_KEYWORDS)
    }

    async fn process(&self, query: &Query, ctx: &AgentContext) -> Result<Value, AgentError> {
        let lower = query.text.to_lowercase();
        let news_focused = lower.contains("news") || lower.contains("recent");

        let (primary, secondary, strategy) = if news_focused {
            let news = ctx.search.news_search(&query.text, 5).await?;
            let web = ctx.search.web_search(&query.text, 3).await?;
            (news, web, "news_focused")
        } else {
            let web = ctx.search.web_search(&query.text, 8).await?;
            (web, vec![], "comprehensive_web")
        };

        Ok(json!({
            "agent": self.name(),
            "primary_results": primary,
            "secondary_results": secondary,
            "research_strategy": strategy,
        }))
    }
}

// ── Analysis agent ────────────────────────────────────────────────────────────

pub struct AnalysisAgent;

const ANALYSIS_KEYWORDS: &[&str] = &[
    "analyze", "compare", "statistics", "data", "trends", "insights", "stock", "price",
    "financial", "market",
];

const FINANCE_HINTS: &[&str] = &["stock", "price", "financial", "market", "dividend", "earnings"];

const INSIGHT_SYSTEM_PROMPT: &str = "You are an analytical assistant. Give a short, structured \
set of insights on the user's question. Use plain prose, no markdown headers.";

impl AnalysisAgent {
    async fn extract_ticker(&self, query: &Query, ctx: &AgentContext) -> Option<String> {
        let request = ChatRequest::new(
            &ctx.fast_model,
            vec![
                ChatMessage::system(
                    "Extract the stock ticker symbol from the question. Return ONLY the \
                     uppercase ticker, or NONE.",
                ),
                ChatMessage::user(&query.text),
            ],
        )
        .temperature(0.0)
        .max_tokens(8);

        let reply = ctx.completion.complete(request).await.ok()?;
        let candidate = reply.trim().to_uppercase();
        let valid = candidate != "NONE"
            && (1..=5).contains(&candidate.len())
            && candidate.chars().all(|c| c.is_ascii_uppercase());
        valid.then_some(candidate)
    }
}

#[async_trait]
impl SpecialistAgent for AnalysisAgent {
    fn name(&self) -> &str {
        "analysis"
    }

    fn can_handle(&self, query_text: &str) -> bool {
        contains_any(query_text, ANALYSIS_KEYWORDS)
    }

    async fn process(&self, query: &Query, ctx: &AgentContext) -> Result<Value, AgentError> {
        let mut analysis_results = serde_json::Map::new();

        if contains_any(&query.text, FINANCE_HINTS) {
            if let Some(ticker) = self.extract_ticker(query, ctx).await {
                match ctx.finance.stock_info(&ticker).await {
                    Ok(quote) => {
                        analysis_results.insert("financial_analysis".to_string(), quote);
                    }
                    Err(error) => {
                        warn!(%error, %ticker, "quote lookup failed during analysis");
                    }
                }
            }
        }

        let insight_request = ChatRequest::new(
            &ctx.fast_model,
            vec![
                ChatMessage::system(INSIGHT_SYSTEM_PROMPT),
                ChatMessage::user(&query.text),
            ],
        )
        .max_tokens(400);

        let insights = match ctx.completion.complete(insight_request).await {
            Ok(text) => text,
            Err(error) => {
                warn!(%error, "insight generation failed, degrading");
                "Analysis temporarily unavailable.".to_string()
            }
        };
        analysis_results.insert("analytical_insights".to_string(), json!(insights));

        let analysis_type = if analysis_results.contains_key("financial_analysis") {
            "financial"
        } else {
            "general"
        };

        Ok(json!({
            "agent": self.name(),
            "analysis_results": analysis_results,
            "analysis_type": analysis_type,
        }))
    }
}

// ── Creative agent ────────────────────────────────────────────────────────────

pub struct CreativeAgent;

const CREATIVE_KEYWORDS: &[&str] = &[
    "write", "create", "generate", "compose", "draft", "brainstorm", "ideas", "creative",
    "story", "poem", "article",
];

fn content_type(query_text: &str) -> &'static str {
    let lower = query_text.to_lowercase();
    if lower.contains("story") {
        "story"
    } else if lower.contains("poem") {
        "poetry"
    } else if lower.contains("article") {
        "article"
    } else if lower.contains("ideas") || lower.contains("brainstorm") {
        "list"
    } else {
        "general_creative"
    }
}

#[async_trait]
impl SpecialistAgent for CreativeAgent {
    fn name(&self) -> &str {
        "creative"
    }

    fn can_handle(&self, query_text: &str) -> bool {
        contains_any(query_text, CREATIVE_KEYWORDS)
    }

    async fn process(&self, query: &Query, ctx: &AgentContext) -> Result<Value, AgentError> {
        let kind = content_type(&query.text);
        let request = ChatRequest::new(
            &ctx.fast_model,
            vec![
                ChatMessage::system(format!(
                    "You are a creative writing assistant. Produce {kind} content \
                     matching the user's request."
                )),
                ChatMessage::user(&query.text),
            ],
        )
        .temperature(0.9)
        .max_tokens(800);

        let content = ctx.completion.complete(request).await?;

        Ok(json!({
            "agent": self.name(),
            "content": content,
            "content_type": kind,
        }))
    }
}

// ── Orchestrator ──────────────────────────────────────────────────────────────

const SPECIALIST_SYNTHESIS_PROMPT: &str = "You are a helpful assistant. A specialist agent \
gathered the structured data below for the user's question. Write a clear, direct answer \
grounded in that data. Do not mention the agent or the data-gathering process.";

/// Routes queries to the first willing specialist, fixed priority order.
pub struct AgentOrchestrator {
    agents: Vec<Box<dyn SpecialistAgent>>,
    ctx: AgentContext,
    smart_model: String,
}

impl AgentOrchestrator {
    pub fn new(ctx: AgentContext, config: &Config) -> Self {
        Self {
            agents: vec![
                Box::new(ResearchAgent),
                Box::new(AnalysisAgent),
                Box::new(CreativeAgent),
            ],
            ctx,
            smart_model: config.smart_model.clone(),
        }
    }

    /// Try to answer with a specialist. `Ok(None)` means no agent volunteered
    /// and the caller should use the tool pipeline instead. `live_data_note`,
    /// when present, is folded into the synthesis prompt so current stream
    /// snapshots inform the answer.
    pub async fn attempt(
        &self,
        query: &Query,
        live_data_note: Option<&str>,
    ) -> Result<Option<SpecialistResult>, AgentError> {
        let agent = match self.agents.iter().find(|a| a.can_handle(&query.text)) {
            Some(agent) => agent,
            None => return Ok(None),
        };

        debug!(agent = agent.name(), "specialist selected");
        let payload = agent
            .process(query, &self.ctx)
            .await
            .map_err(|e| AgentError::Specialist(format!("{}: {e}", agent.name())))?;
        let content = self
            .synthesize(query, &payload, live_data_note)
            .await
            .map_err(|e| AgentError::Specialist(format!("{} synthesis: {e}", agent.name())))?;

        Ok(Some(SpecialistResult {
            agent_name: agent.name().to_string(),
            payload,
            content,
        }))
    }

    async fn synthesize(
        &self,
        query: &Query,
        payload: &Value,
        live_data_note: Option<&str>,
    ) -> Result<String, AgentError> {
        let data = serde_json::to_string(payload)?;
        let mut messages = vec![ChatMessage::system(SPECIALIST_SYNTHESIS_PROMPT)];
        if let Some(note) = live_data_note {
            messages.push(ChatMessage::system(format!("Live data snapshots: {note}")));
        }
        messages.push(ChatMessage::user(format!(
            "Question: {}\n\nGathered data: {data}",
            query.text
        )));

        let request = ChatRequest::new(&self.smart_model, messages).max_tokens(900);
        self.ctx.completion.complete(request).await
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    struct DownSearch;

    #[async_trait]
    impl SearchBackend for DownSearch {
        async fn web_search(&self, _q: &str, _n: usize) -> Result<Vec<Value>, AgentError> {
            Err(AgentError::Search("gateway down".to_string()))
        }

        async fn news_search(&self, _q: &str, _n: usize) -> Result<Vec<Value>, AgentError> {
            Err(AgentError::Search("gateway down".to_string()))
        }

        async fn social_media_search(
            &self,
            _q: &str,
            _p: &str,
        ) -> Result<Vec<Value>, AgentError> {
            Err(AgentError::Search("gateway down".to_string()))
        }
    }

    struct NoQuotes;

    #[async_trait]
    impl FinanceBackend for NoQuotes {
        async fn stock_info(&self, _t: &str) -> Result<Value, AgentError> {
            Err(AgentError::Finance("unreachable".to_string()))
        }
    }

    struct EchoCompletion;

    #[async_trait]
    impl CompletionBackend for EchoCompletion {
        async fn complete(&self, _request: ChatRequest) -> Result<String, AgentError> {
            Ok("ok".to_string())
        }
    }

    fn orchestrator_with_down_search() -> AgentOrchestrator {
        let config = crate::config::Config {
            api_key: "gsk-test".to_string(),
            completion_base_url: "http://localhost:1".to_string(),
            fast_model: "fast".to_string(),
            smart_model: "smart".to_string(),
            search_base_url: "http://localhost:2".to_string(),
            finance_base_url: "http://localhost:3".to_string(),
            memory_base_url: String::new(),
            http_timeout_secs: 1,
            cache_max_size: 10,
        };
        AgentOrchestrator::new(
            AgentContext {
                completion: Arc::new(EchoCompletion),
                search: Arc::new(DownSearch),
                finance: Arc::new(NoQuotes),
                fast_model: "fast".to_string(),
            },
            &config,
        )
    }

    #[tokio::test]
    async fn failed_agent_surfaces_as_specialist_error() {
        let orchestrator = orchestrator_with_down_search();
        let query = Query::new("u1", "tell me about rust");

        let error = orchestrator.attempt(&query, None).await.unwrap_err();
        assert!(matches!(error, AgentError::Specialist(_)));
        assert!(error.to_string().contains("research"));
    }

    #[tokio::test]
    async fn unmatched_query_is_a_negative_result_not_an_error() {
        let orchestrator = orchestrator_with_down_search();
        let query = Query::new("u1", "hi");

        assert!(orchestrator.attempt(&query, None).await.unwrap().is_none());
    }

    #[test]
    fn research_keywords_match() {
        let agent = ResearchAgent;
        assert!(agent.can_handle("Tell me about quantum computing"));
        assert!(agent.can_handle("what is a transformer model"));
        assert!(!agent.can_handle("hello there"));
    }

    #[test]
    fn analysis_keywords_match() {
        let agent = AnalysisAgent;
        assert!(agent.can_handle("analyze the housing market"));
        assert!(agent.can_handle("AAPL stock outlook"));
        assert!(!agent.can_handle("sing me a song"));
    }

    #[test]
    fn creative_keywords_match() {
        let agent = CreativeAgent;
        assert!(agent.can_handle("write a poem about rain"));
        assert!(agent.can_handle("brainstorm ideas for a blog"));
        assert!(!agent.can_handle("what time is it"));
    }

    #[test]
    fn content_type_selection() {
        assert_eq!(content_type("write a short story"), "story");
        assert_eq!(content_type("compose a poem"), "poetry");
        assert_eq!(content_type("draft an article on rust"), "article");
        assert_eq!(content_type("brainstorm ideas"), "list");
        assert_eq!(content_type("create something fun"), "general_creative");
    }
}
