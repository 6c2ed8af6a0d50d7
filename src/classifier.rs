//! Query classification and tool planning.
//!
//! One fast-model completion decides the category; deterministic rules then
//! map the category to an ordered tool plan. Financial queries get a second
//! completion to extract a ticker symbol, guarded so a chatty model reply can
//! never become a quote lookup.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, warn};

use crate::completion::{ChatMessage, ChatRequest, CompletionBackend};
use crate::config::Config;
use crate::error::AgentError;
use crate::types::{Plan, QueryCategory, ToolCall};

const CLASSIFICATION_SYSTEM_PROMPT: &str = "You are a query classifier. Reply with exactly one \
of these labels and nothing else:\n\
CASUAL - greetings, small talk, chit-chat\n\
SOCIAL_MEDIA - questions about social platforms, posts, influencers, trends on a platform\n\
FINANCIAL - stocks, prices, markets, companies' financial performance\n\
NEWS - current events, headlines, breaking stories\n\
GENERAL_WEB - everything needing a general web lookup\n\
MEMORY - questions about this conversation or what was said before";

const TICKER_SYSTEM_PROMPT: &str = "Extract the stock ticker symbol from the user's question. \
Return ONLY the ticker symbol in uppercase (for example AAPL), or NONE if there is no ticker. \
No punctuation, no explanation.";

pub struct QueryClassifier {
    completion: Arc<dyn CompletionBackend>,
    fast_model: String,
}

impl QueryClassifier {
    pub fn new(completion: Arc<dyn CompletionBackend>, config: &Config) -> Self {
        Self {
            completion,
            fast_model: config.fast_model.clone(),
        }
    }

    /// Classify `query_text` and build its tool plan.
    ///
    /// A failed classification degrades to a general web search rather than
    /// failing the request.
    pub async fn plan(&self, query_text: &str) -> Plan {
        let category = match self.classify(query_text).await {
            Ok(category) => category,
            Err(error) => {
                warn!(%error, "classification failed, falling back to general web search");
                return Plan {
                    category: QueryCategory::GeneralWeb,
                    tool_calls: vec![ToolCall::new("web_search", json!({"query": query_text}))],
                    log: "classification unavailable, defaulted to web search".to_string(),
                };
            }
        };

        debug!(%category, "query classified");
        self.plan_for_category(category, query_text).await
    }

    async fn classify(&self, query_text: &str) -> Result<QueryCategory, AgentError> {
        let request = ChatRequest::new(
            &self.fast_model,
            vec![
                ChatMessage::system(CLASSIFICATION_SYSTEM_PROMPT),
                ChatMessage::user(query_text),
            ],
        )
        .temperature(0.0)
        .max_tokens(10);

        let reply = self.completion.complete(request).await?;
        Ok(parse_category(&reply))
    }

    async fn plan_for_category(&self, category: QueryCategory, query_text: &str) -> Plan {
        let tool_calls = match category {
            QueryCategory::Casual | QueryCategory::Memory => vec![],
            QueryCategory::Financial => self.financial_calls(query_text).await,
            QueryCategory::SocialMedia => {
                let platform = detect_platform(query_text);
                vec![
                    ToolCall::new(
                        "social_media_search",
                        json!({"query": query_text, "platform": platform}),
                    ),
                    ToolCall::new("web_search", json!({"query": query_text})),
                ]
            }
            QueryCategory::News => vec![
                ToolCall::new("news_search", json!({"query": query_text})),
                ToolCall::new("web_search", json!({"query": query_text})),
            ],
            QueryCategory::GeneralWeb => {
                vec![ToolCall::new("web_search", json!({"query": query_text}))]
            }
        };

        Plan {
            category,
            tool_calls,
            log: format!("classified as {category}"),
        }
    }

    /// Financial plans prefer a direct quote lookup; without a usable ticker
    /// they degrade to a web search.
    async fn financial_calls(&self, query_text: &str) -> Vec<ToolCall> {
        match self.extract_ticker(query_text).await {
            Some(ticker) => vec![ToolCall::new("get_stock_info", json!({"ticker": ticker}))],
            None => vec![ToolCall::new("web_search", json!({"query": query_text}))],
        }
    }

    async fn extract_ticker(&self, query_text: &str) -> Option<String> {
        let request = ChatRequest::new(
            &self.fast_model,
            vec![
                ChatMessage::system(TICKER_SYSTEM_PROMPT),
                ChatMessage::user(query_text),
            ],
        )
        .temperature(0.0)
        .max_tokens(8);

        match self.completion.complete(request).await {
            Ok(reply) => validate_ticker(&reply),
            Err(error) => {
                warn!(%error, "ticker extraction failed");
                None
            }
        }
    }
}

/// Map a model reply onto a category by substring, tolerating extra prose.
/// Checked in an order where no label is a substring of an earlier one.
fn parse_category(reply: &str) -> QueryCategory {
    let upper = reply.to_uppercase();
    if upper.contains("CASUAL") {
        QueryCategory::Casual
    } else if upper.contains("MEMORY") {
        QueryCategory::Memory
    } else if upper.contains("SOCIAL_MEDIA") {
        QueryCategory::SocialMedia
    } else if upper.contains("FINANCIAL") {
        QueryCategory::Financial
    } else if upper.contains("NEWS") {
        QueryCategory::News
    } else {
        QueryCategory::GeneralWeb
    }
}

/// A usable ticker is 1 to 5 ASCII uppercase letters and not the NONE sentinel.
fn validate_ticker(reply: &str) -> Option<String> {
    let candidate = reply.trim().to_uppercase();
    if candidate == "NONE" {
        return None;
    }
    let valid = (1..=5).contains(&candidate.len())
        && candidate.chars().all(|c| c.is_ascii_uppercase());
    valid.then_some(candidate)
}

/// Pick the platform a social query is about, defaulting to instagram.
fn detect_platform(query_text: &str) -> &'static str {
    let lower = query_text.to_lowercase();
    if lower.contains("twitter") || lower.contains("x.com") {
        "twitter"
    } else if lower.contains("tiktok") {
        "tiktok"
    } else if lower.contains("facebook") {
        "facebook"
    } else if lower.contains("youtube") {
        "youtube"
    } else {
        "instagram"
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_parses_with_surrounding_prose() {
        assert_eq!(
            parse_category("The category is FINANCIAL."),
            QueryCategory::Financial
        );
        assert_eq!(parse_category("casual"), QueryCategory::Casual);
        assert_eq!(parse_category("SOCIAL_MEDIA"), QueryCategory::SocialMedia);
        assert_eq!(parse_category("gibberish"), QueryCategory::GeneralWeb);
    }

    #[test]
    fn ticker_guard_rejects_sentinel_and_prose() {
        assert_eq!(validate_ticker("NONE"), None);
        assert_eq!(validate_ticker("none"), None);
        assert_eq!(validate_ticker("The ticker is AAPL"), None);
        assert_eq!(validate_ticker("TOOLONG"), None);
        assert_eq!(validate_ticker("AA PL"), None);
        assert_eq!(validate_ticker(""), None);
    }

    #[test]
    fn ticker_guard_accepts_plain_symbols() {
        assert_eq!(validate_ticker(" aapl \n"), Some("AAPL".to_string()));
        assert_eq!(validate_ticker("F"), Some("F".to_string()));
        assert_eq!(validate_ticker("GOOGL"), Some("GOOGL".to_string()));
    }

    #[test]
    fn platform_detection() {
        assert_eq!(detect_platform("trending on TikTok today"), "tiktok");
        assert_eq!(detect_platform("what's viral on twitter"), "twitter");
        assert_eq!(detect_platform("posts on x.com"), "twitter");
        assert_eq!(detect_platform("best reels right now"), "instagram");
    }
}
