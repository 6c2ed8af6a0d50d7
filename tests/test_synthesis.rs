//! Tests for [`agentic_ai::synthesis`] with a scripted completion backend.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use agentic_ai::completion::{ChatRequest, CompletionBackend};
use agentic_ai::config::Config;
use agentic_ai::error::AgentError;
use agentic_ai::synthesis::{ResponseSynthesizer, APOLOGY_RESPONSE};
use agentic_ai::types::ToolOutputs;
use async_trait::async_trait;
use serde_json::json;

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

fn web_outputs() -> ToolOutputs {
    vec![(
        "web_search".to_string(),
        json!([{"title": "Rust", "url": "https://rust-lang.org", "snippet": "A language"}]),
    )]
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn successful_synthesis_uses_model_confidence() {
    // First reply answers, second scores confidence.
    let completion = ScriptedCompletion::new(vec![Ok("Rust is a systems language."), Ok("91")]);
    let synthesizer = ResponseSynthesizer::new(completion, &test_config());

    let result = synthesizer.synthesize("what is rust", &web_outputs()).await;
    assert_eq!(result.text, "Rust is a systems language.");
    assert_eq!(result.confidence, 91);
    assert_eq!(result.sources.len(), 1);
    assert_eq!(result.sources[0].id, 1);
}

#[tokio::test]
async fn unusable_confidence_reply_falls_back_to_baseline() {
    let completion = ScriptedCompletion::new(vec![Ok("An answer."), Ok("very high")]);
    let synthesizer = ResponseSynthesizer::new(completion, &test_config());

    let result = synthesizer.synthesize("q", &web_outputs()).await;
    // All tools succeeded, so the healthy baseline applies.
    assert_eq!(result.confidence, 85);
}

#[tokio::test]
async fn degraded_outputs_lower_the_baseline() {
    let completion = ScriptedCompletion::new(vec![Ok("Partial answer."), Err("down")]);
    let synthesizer = ResponseSynthesizer::new(completion, &test_config());

    let outputs: ToolOutputs = vec![
        ("news_search".to_string(), json!({"error": "timed out"})),
        (
            "web_search".to_string(),
            json!([{"title": "T", "url": "https://a.example"}]),
        ),
    ];
    let result = synthesizer.synthesize("q", &outputs).await;
    assert_eq!(result.confidence, 60);
    // Failed tools contribute no sources.
    assert_eq!(result.sources.len(), 1);
}

#[tokio::test]
async fn total_failure_yields_apology() {
    let completion = ScriptedCompletion::new(vec![Err("backend down")]);
    let synthesizer = ResponseSynthesizer::new(completion, &test_config());

    let result = synthesizer.synthesize("q", &web_outputs()).await;
    assert_eq!(result.text, APOLOGY_RESPONSE);
    assert_eq!(result.confidence, 20);
    assert!(result.sources.is_empty());
}

#[tokio::test]
async fn casual_path_answers_without_sources() {
    let completion = ScriptedCompletion::new(vec![Ok("Hey! Doing great.")]);
    let synthesizer = ResponseSynthesizer::new(completion, &test_config());

    let history = vec![
        ("user".to_string(), "hi".to_string()),
        ("assistant".to_string(), "hello!".to_string()),
    ];
    let result = synthesizer.synthesize_casual("how are you", &history).await;
    assert_eq!(result.text, "Hey! Doing great.");
    assert_eq!(result.confidence, 95);
    assert!(result.sources.is_empty());
}

#[tokio::test]
async fn casual_failure_uses_canned_greeting() {
    let completion = ScriptedCompletion::new(vec![Err("down")]);
    let synthesizer = ResponseSynthesizer::new(completion, &test_config());

    let result = synthesizer.synthesize_casual("hello", &[]).await;
    assert_eq!(result.text, "Hello! How can I assist you today?");
    assert_eq!(result.confidence, 90);
}
