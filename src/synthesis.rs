//! Response synthesis and source attribution.
//!
//! Turns raw tool outputs into a prose answer, a confidence score, and a
//! numbered source list. Degrades in steps: error-aware prompting when some
//! tools failed, a fixed apology when the synthesis completion itself fails.

use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use crate::completion::{ChatMessage, ChatRequest, CompletionBackend};
use crate::config::{
    Config, CASUAL_HISTORY_TURNS, CONFIDENCE_APOLOGY, CONFIDENCE_BASE_DEGRADED,
    CONFIDENCE_BASE_OK,
};
use crate::types::{Source, SourceType, ToolOutputs};

pub const APOLOGY_RESPONSE: &str = "I apologize, but I encountered an error while processing \
your request. Please try rephrasing your question or ask something else.";

const CASUAL_SYSTEM_PROMPT: &str = "You are a friendly, helpful assistant. Keep the \
conversation natural and concise.";

const SUCCESS_SYSTEM_PROMPT: &str = "You are a helpful assistant. Answer the user's question \
using the tool results below. Be direct and factual. Do not invent information that is not \
in the results.";

const DEGRADED_SYSTEM_PROMPT: &str = "You are a helpful assistant. Some tools failed while \
gathering data for this question. Answer with what succeeded, be transparent about gaps, \
and never fabricate the missing data.";

const CONFIDENCE_SYSTEM_PROMPT: &str = "Rate how well the answer below is supported by the \
tool results, as a number from 0 to 100. Reply with the number only.";

/// A synthesized answer ready for packaging.
pub struct SynthesizedResponse {
    pub text: String,
    pub confidence: u8,
    pub sources: Vec<Source>,
}

pub struct ResponseSynthesizer {
    completion: Arc<dyn CompletionBackend>,
    fast_model: String,
}

impl ResponseSynthesizer {
    pub fn new(completion: Arc<dyn CompletionBackend>, config: &Config) -> Self {
        Self {
            completion,
            fast_model: config.fast_model.clone(),
        }
    }

    /// Conversational path for plans with no tool calls. `history` is
    /// (role, content) pairs, oldest first.
    pub async fn synthesize_casual(
        &self,
        query_text: &str,
        history: &[(String, String)],
    ) -> SynthesizedResponse {
        let mut messages = vec![ChatMessage::system(CASUAL_SYSTEM_PROMPT)];
        let skip = history.len().saturating_sub(CASUAL_HISTORY_TURNS);
        for (role, content) in history.iter().skip(skip) {
            messages.push(ChatMessage {
                role: role.clone(),
                content: content.clone(),
            });
        }
        messages.push(ChatMessage::user(query_text));

        let request = ChatRequest::new(&self.fast_model, messages).max_tokens(500);
        match self.completion.complete(request).await {
            Ok(text) => SynthesizedResponse {
                text,
                confidence: 95,
                sources: vec![],
            },
            Err(error) => {
                warn!(%error, "casual synthesis failed, using canned greeting");
                SynthesizedResponse {
                    text: "Hello! How can I assist you today?".to_string(),
                    confidence: 90,
                    sources: vec![],
                }
            }
        }
    }

    /// Tool-grounded path. Produces the apology payload if the main
    /// completion fails.
    pub async fn synthesize(&self, query_text: &str, outputs: &ToolOutputs) -> SynthesizedResponse {
        let degraded = has_errors(outputs);
        let sources = extract_sources(outputs);

        let system = if degraded {
            DEGRADED_SYSTEM_PROMPT
        } else {
            SUCCESS_SYSTEM_PROMPT
        };

        let cleaned = clean_outputs(outputs);
        let data = serde_json::to_string(&cleaned).unwrap_or_else(|_| "[]".to_string());

        let request = ChatRequest::new(
            &self.fast_model,
            vec![
                ChatMessage::system(system),
                ChatMessage::user(format!(
                    "Question: {query_text}\n\nTool results: {data}"
                )),
            ],
        )
        .max_tokens(800);

        let text = match self.completion.complete(request).await {
            Ok(text) => text,
            Err(error) => {
                warn!(%error, "response synthesis failed");
                return SynthesizedResponse {
                    text: APOLOGY_RESPONSE.to_string(),
                    confidence: CONFIDENCE_APOLOGY,
                    sources: vec![],
                };
            }
        };

        let base = if degraded {
            CONFIDENCE_BASE_DEGRADED
        } else {
            CONFIDENCE_BASE_OK
        };
        let confidence = self.score_confidence(&text, &data, base).await;

        SynthesizedResponse {
            text,
            confidence,
            sources,
        }
    }

    /// Second completion asking the model to rate its own grounding.
    /// Falls back to `base` when the reply is unusable.
    async fn score_confidence(&self, answer: &str, data: &str, base: u8) -> u8 {
        let request = ChatRequest::new(
            &self.fast_model,
            vec![
                ChatMessage::system(CONFIDENCE_SYSTEM_PROMPT),
                ChatMessage::user(format!("Answer: {answer}\n\nTool results: {data}")),
            ],
        )
        .temperature(0.0)
        .max_tokens(5);

        match self.completion.complete(request).await {
            Ok(reply) => parse_confidence(&reply).unwrap_or(base),
            Err(error) => {
                warn!(%error, "confidence scoring failed, using baseline");
                base
            }
        }
    }
}

/// Pull the leading digits out of a model reply and clamp to 0..=100.
fn parse_confidence(reply: &str) -> Option<u8> {
    let digits: String = reply
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse::<u32>().ok().map(|n| n.min(100) as u8)
}

/// True if any tool produced an error object, or a result list whose first
/// item is an error object.
fn has_errors(outputs: &ToolOutputs) -> bool {
    outputs.iter().any(|(_, value)| match value {
        Value::Object(map) => map.contains_key("error"),
        Value::Array(items) => items
            .first()
            .and_then(Value::as_object)
            .map(|m| m.contains_key("error"))
            .unwrap_or(false),
        _ => false,
    })
}

/// Strip bookkeeping fields the model has no use for before prompting.
fn clean_outputs(outputs: &ToolOutputs) -> Vec<Value> {
    outputs
        .iter()
        .map(|(name, value)| {
            let mut cleaned = value.clone();
            strip_keys(&mut cleaned, &["url", "query_used", "search_query"]);
            serde_json::json!({"tool": name, "result": cleaned})
        })
        .collect()
}

fn strip_keys(value: &mut Value, keys: &[&str]) {
    match value {
        Value::Object(map) => {
            for key in keys {
                map.remove(*key);
            }
            for v in map.values_mut() {
                strip_keys(v, keys);
            }
        }
        Value::Array(items) => {
            for item in items {
                strip_keys(item, keys);
            }
        }
        _ => {}
    }
}

// ── Source extraction ─────────────────────────────────────────────────────────

/// Collect attributed sources from tool outputs, in encounter order, with
/// dense 1-based ids. Error items never become sources.
pub fn extract_sources(outputs: &ToolOutputs) -> Vec<Source> {
    let mut sources = Vec::new();

    for (tool_name, value) in outputs {
        match value {
            Value::Array(items) => {
                for item in items {
                    if let Some(mut source) = list_item_source(tool_name, item) {
                        source.id = sources.len() as u32 + 1;
                        sources.push(source);
                    }
                }
            }
            Value::Object(map) => {
                if map.contains_key("error") {
                    continue;
                }
                if let Some(symbol) = map.get("symbol").and_then(Value::as_str) {
                    let id = sources.len() as u32 + 1;
                    sources.push(Source {
                        id,
                        title: format!("Yahoo Finance - {symbol}"),
                        url: format!("https://finance.yahoo.com/quote/{symbol}"),
                        kind: SourceType::Financial,
                        platform: "yahoo_finance".to_string(),
                    });
                }
            }
            _ => {}
        }
    }

    sources
}

fn list_item_source(tool_name: &str, item: &Value) -> Option<Source> {
    let map = item.as_object()?;
    if map.contains_key("error") {
        return None;
    }
    let url = map.get("url").and_then(Value::as_str)?;
    if url.is_empty() {
        return None;
    }

    let raw_title = map.get("title").and_then(Value::as_str).unwrap_or(url);
    let title = tidy_title(raw_title);
    let platform = map
        .get("platform")
        .and_then(Value::as_str)
        .unwrap_or("web")
        .to_string();

    Some(Source {
        id: 0, // assigned by the caller
        title,
        url: url.to_string(),
        kind: source_type_for(tool_name, url),
        platform,
    })
}

/// Collapse whitespace and cap titles at 100 characters.
fn tidy_title(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() > 100 {
        let head: String = collapsed.chars().take(97).collect();
        format!("{head}...")
    } else {
        collapsed
    }
}

const SOCIAL_DOMAINS: &[&str] = &[
    "instagram.com",
    "twitter.com",
    "facebook.com",
    "tiktok.com",
];

/// Source type from the producing tool's name first, then the URL domain.
fn source_type_for(tool_name: &str, url: &str) -> SourceType {
    if tool_name.contains("financial") || tool_name.contains("stock") {
        return SourceType::Financial;
    }
    if tool_name.contains("news") {
        return SourceType::News;
    }
    if tool_name.contains("social_media") {
        return SourceType::Social;
    }
    if SOCIAL_DOMAINS.iter().any(|d| url.contains(d)) {
        return SourceType::Social;
    }
    SourceType::Web
}

/// Sources for the specialist path, drawn from the agent's structured payload.
pub fn extract_specialist_sources(payload: &Value) -> Vec<Source> {
    let mut sources = Vec::new();

    let mut collect_list = |key: &str, kind: SourceType, sources: &mut Vec<Source>| {
        if let Some(items) = payload.get(key).and_then(Value::as_array) {
            for item in items {
                if let Some(mut source) = list_item_source("specialist", item) {
                    source.kind = kind;
                    source.id = sources.len() as u32 + 1;
                    sources.push(source);
                }
            }
        }
    };

    collect_list("primary_results", SourceType::Research, &mut sources);
    collect_list("secondary_results", SourceType::ResearchSecondary, &mut sources);

    if let Some(quote) = payload
        .pointer("/analysis_results/financial_analysis")
        .and_then(Value::as_object)
    {
        if !quote.contains_key("error") {
            if let Some(symbol) = quote.get("symbol").and_then(Value::as_str) {
                let id = sources.len() as u32 + 1;
                sources.push(Source {
                    id,
                    title: format!("Yahoo Finance - {symbol}"),
                    url: format!("https://finance.yahoo.com/quote/{symbol}"),
                    kind: SourceType::Financial,
                    platform: "yahoo_finance".to_string(),
                });
            }
        }
    }

    sources
}

// ── Tests ─────────────────────────────────────────────────────────────────────
