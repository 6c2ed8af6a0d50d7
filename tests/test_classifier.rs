//! Tests for [`agentic_ai::classifier`] using a scripted completion backend.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use agentic_ai::classifier::QueryClassifier;
use agentic_ai::completion::{ChatRequest, CompletionBackend};
use agentic_ai::config::Config;
use agentic_ai::error::AgentError;
use agentic_ai::types::QueryCategory;
use async_trait::async_trait;

// ── Scripted backend ──────────────────────────────────────────────────────────

/// Returns queued replies in order; errors once the queue is empty.
struct ScriptedCompletion {
    replies: Mutex<VecDeque<Result<String, String>>>,
}

impl ScriptedCompletion {
    fn new(replies: Vec<Result<&str, &str>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(
                replies
                    .into_iter()
                    .map(|r| r.map(str::to_string).map_err(str::to_string))
                    .collect(),
            ),
        })
    }
}

#[async_trait]
impl CompletionBackend for ScriptedCompletion {
    async fn complete(&self, _request: ChatRequest) -> Result<String, AgentError> {
        let next = self.replies.lock().unwrap().pop_front();
        match next {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(message)) => Err(AgentError::Completion(message)),
            None => Err(AgentError::Completion("script exhausted".to_string())),
        }
    }
}

fn test_config() -> Config {
    Config {
        api_key: "gsk-test".to_string(),
        completion_base_url: "http://localhost:1".to_string(),
        fast_model: "fast".to_string(),
        smart_model: "smart".to_string(),
        search_base_url: "http://localhost:2".to_string(),
        finance_base_url: "http://localhost:3".to_string(),
        memory_base_url: String::new(),
        http_timeout_secs: 1,
        cache_max_size: 10,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn casual_query_plans_no_tools() {
    let completion = ScriptedCompletion::new(vec![Ok("CASUAL")]);
    let classifier = QueryClassifier::new(completion, &test_config());

    let plan = classifier.plan("hi").await;
    assert_eq!(plan.category, QueryCategory::Casual);
    assert!(plan.tool_calls.is_empty());
}

#[tokio::test]
async fn financial_query_with_ticker_plans_quote_lookup() {
    let completion = ScriptedCompletion::new(vec![Ok("FINANCIAL"), Ok("AAPL")]);
    let classifier = QueryClassifier::new(completion, &test_config());

    let plan = classifier.plan("Apple stock price").await;
    assert_eq!(plan.category, QueryCategory::Financial);
    assert_eq!(plan.tool_calls.len(), 1);
    assert_eq!(plan.tool_calls[0].tool_name, "get_stock_info");
    assert_eq!(plan.tool_calls[0].parameters["ticker"], "AAPL");
}

#[tokio::test]
async fn financial_query_without_ticker_degrades_to_web_search() {
    let completion = ScriptedCompletion::new(vec![Ok("FINANCIAL"), Ok("NONE")]);
    let classifier = QueryClassifier::new(completion, &test_config());

    let plan = classifier.plan("how do interest rates work").await;
    assert_eq!(plan.category, QueryCategory::Financial);
    assert_eq!(plan.tool_calls.len(), 1);
    assert_eq!(plan.tool_calls[0].tool_name, "web_search");
}

#[tokio::test]
async fn chatty_ticker_reply_is_rejected() {
    let completion =
        ScriptedCompletion::new(vec![Ok("FINANCIAL"), Ok("The ticker you want is AAPL.")]);
    let classifier = QueryClassifier::new(completion, &test_config());

    let plan = classifier.plan("big tech stock price").await;
    assert_eq!(plan.tool_calls[0].tool_name, "web_search");
}

#[tokio::test]
async fn news_query_plans_news_then_web() {
    let completion = ScriptedCompletion::new(vec![Ok("NEWS")]);
    let classifier = QueryClassifier::new(completion, &test_config());

    let plan = classifier.plan("latest news about AI").await;
    assert_eq!(plan.category, QueryCategory::News);
    let names: Vec<&str> = plan.tool_calls.iter().map(|c| c.tool_name.as_str()).collect();
    assert_eq!(names, vec!["news_search", "web_search"]);
}

#[tokio::test]
async fn social_query_carries_detected_platform() {
    let completion = ScriptedCompletion::new(vec![Ok("SOCIAL_MEDIA")]);
    let classifier = QueryClassifier::new(completion, &test_config());

    let plan = classifier.plan("what's trending on tiktok").await;
    assert_eq!(plan.category, QueryCategory::SocialMedia);
    assert_eq!(plan.tool_calls[0].tool_name, "social_media_search");
    assert_eq!(plan.tool_calls[0].parameters["platform"], "tiktok");
    assert_eq!(plan.tool_calls[1].tool_name, "web_search");
}

#[tokio::test]
async fn classification_failure_degrades_to_web_search() {
    let completion = ScriptedCompletion::new(vec![Err("backend down")]);
    let classifier = QueryClassifier::new(completion, &test_config());

    let plan = classifier.plan("anything at all").await;
    assert_eq!(plan.category, QueryCategory::GeneralWeb);
    assert_eq!(plan.tool_calls.len(), 1);
    assert_eq!(plan.tool_calls[0].tool_name, "web_search");
}

#[tokio::test]
async fn memory_query_plans_no_tools() {
    let completion = ScriptedCompletion::new(vec![Ok("MEMORY")]);
    let classifier = QueryClassifier::new(completion, &test_config());

    let plan = classifier.plan("what did I ask you earlier?").await;
    assert_eq!(plan.category, QueryCategory::Memory);
    assert!(plan.tool_calls.is_empty());
}
