//! Short-term conversation memory and per-user profiles.
//!
//! Keeps a bounded in-process history per user, annotates every turn with
//! topics, sentiment and a 1..=10 complexity score, and maintains a rolling
//! profile used for personalization. Durable rehydration goes through the
//! vector-memory service.

use std::collections::HashMap;

use tokio::sync::RwLock;
use tracing::debug;

use crate::config::{CONTEXT_RECENT_TURNS, MAX_TURNS_PER_USER, REHYDRATE_HISTORY_LIMIT};
use crate::types::{ConversationTurn, Sentiment};
use crate::vector_memory::MemoryService;

/// Rolling interest profile for one user.
#[derive(Debug, Clone, Default)]
pub struct UserProfile {
    /// Topic label to occurrence count.
    pub topic_counts: HashMap<String, u32>,
    pub average_complexity: f64,
    pub total_turns: u64,
}

impl UserProfile {
    /// Topics sorted by frequency, most common first.
    pub fn preferred_topics(&self) -> Vec<String> {
        let mut pairs: Vec<(&String, &u32)> = self.topic_counts.iter().collect();
        pairs.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        pairs.into_iter().map(|(topic, _)| topic.clone()).collect()
    }
}

/// Context snapshot handed to personalization and the specialist prompt.
#[derive(Debug, Clone)]
pub struct UserContext {
    pub recent_turns: Vec<ConversationTurn>,
    pub preferred_topics: Vec<String>,
    pub average_complexity: f64,
    pub suggested_approach: String,
}

impl Default for UserContext {
    fn default() -> Self {
        Self {
            recent_turns: vec![],
            preferred_topics: vec![],
            average_complexity: 0.0,
            suggested_approach: "standard".to_string(),
        }
    }
}

#[derive(Default)]
struct MemoryInner {
    turns: HashMap<String, Vec<ConversationTurn>>,
    profiles: HashMap<String, UserProfile>,
}

/// Process-wide conversation store.
#[derive(Default)]
pub struct ConversationMemory {
    inner: RwLock<MemoryInner>,
}

impl ConversationMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed turn, annotating and trimming history, and fold the
    /// turn into the user's profile.
    pub async fn add_turn(
        &self,
        user_id: &str,
        query_text: &str,
        response_text: &str,
        metadata: HashMap<String, serde_json::Value>,
    ) -> ConversationTurn {
        let turn = ConversationTurn {
            timestamp: chrono::Utc::now(),
            query_text: query_text.to_string(),
            response_text: response_text.to_string(),
            topics: extract_topics(query_text),
            sentiment: analyze_sentiment(query_text),
            complexity: assess_complexity(query_text),
            metadata,
        };

        let mut inner = self.inner.write().await;

        let history = inner.turns.entry(user_id.to_string()).or_default();
        history.push(turn.clone());
        if history.len() > MAX_TURNS_PER_USER {
            let overflow = history.len() - MAX_TURNS_PER_USER;
            history.drain(..overflow);
        }

        let profile = inner.profiles.entry(user_id.to_string()).or_default();
        for topic in &turn.topics {
            *profile.topic_counts.entry(topic.clone()).or_insert(0) += 1;
        }
        profile.total_turns += 1;
        let n = profile.total_turns as f64;
        profile.average_complexity =
            profile.average_complexity * (n - 1.0) / n + turn.complexity as f64 / n;

        turn
    }

    /// True if the user has no in-process history yet.
    pub async fn is_cold(&self, user_id: &str) -> bool {
        let inner = self.inner.read().await;
        inner.turns.get(user_id).map_or(true, Vec::is_empty)
    }

    /// Pull recent turns from durable memory into the in-process store.
    /// Degrades to a no-op on any backend failure.
    pub async fn rehydrate(&self, user_id: &str, durable: &MemoryService) {
        let pairs = durable
            .recent_history(user_id, REHYDRATE_HISTORY_LIMIT)
            .await;
        if pairs.is_empty() {
            return;
        }
        debug!(user = user_id, turns = pairs.len(), "rehydrated history");

        for (query_text, response_text) in pairs {
            self.add_turn(user_id, &query_text, &response_text, HashMap::new())
                .await;
        }
    }

    /// Context snapshot for personalization. The approach is personalized
    /// exactly when the current query's topics overlap the user's profile.
    pub async fn context_for(&self, user_id: &str, query_text: &str) -> UserContext {
        let inner = self.inner.read().await;

        let recent_turns = inner
            .turns
            .get(user_id)
            .map(|turns| {
                let skip = turns.len().saturating_sub(CONTEXT_RECENT_TURNS);
                turns[skip..].to_vec()
            })
            .unwrap_or_default();

        let profile = inner.profiles.get(user_id).cloned().unwrap_or_default();
        let query_topics = extract_topics(query_text);
        let suggested_approach = if query_topics
            .iter()
            .any(|topic| profile.topic_counts.contains_key(topic))
        {
            "personalized"
        } else {
            "standard"
        };

        UserContext {
            recent_turns,
            preferred_topics: profile.preferred_topics(),
            average_complexity: profile.average_complexity,
            suggested_approach: suggested_approach.to_string(),
        }
    }

    /// History as (role, content) pairs for chat prompts, oldest first.
    pub async fn chat_history(&self, user_id: &str) -> Vec<(String, String)> {
        let inner = self.inner.read().await;
        let mut pairs = Vec::new();
        if let Some(turns) = inner.turns.get(user_id) {
            for turn in turns {
                pairs.push(("user".to_string(), turn.query_text.clone()));
                pairs.push(("assistant".to_string(), turn.response_text.clone()));
            }
        }
        pairs
    }

    /// The user's recent query texts, oldest first.
    pub async fn recent_query_texts(&self, user_id: &str, limit: usize) -> Vec<String> {
        let inner = self.inner.read().await;
        inner
            .turns
            .get(user_id)
            .map(|turns| {
                let skip = turns.len().saturating_sub(limit);
                turns[skip..].iter().map(|t| t.query_text.clone()).collect()
            })
            .unwrap_or_default()
    }
}

// ── Turn annotation ───────────────────────────────────────────────────────────

const TECH_TERMS: &[&str] = &[
    "ai",
    "machine learning",
    "python",
    "data",
    "programming",
    "technology",
];
const BUSINESS_TERMS: &[&str] = &[
    "market",
    "stock",
    "finance",
    "business",
    "economy",
    "investment",
];
const CREATIVE_TERMS: &[&str] = &["story", "creative", "write", "art", "design", "poem"];

/// Coarse topic labels for a query. Defaults to `general` when nothing hits.
pub fn extract_topics(query_text: &str) -> Vec<String> {
    let lower = query_text.to_lowercase();
    let mut topics = Vec::new();

    if TECH_TERMS.iter().any(|t| lower.contains(t)) {
        topics.push("technology".to_string());
    }
    if BUSINESS_TERMS.iter().any(|t| lower.contains(t)) {
        topics.push("business".to_string());
    }
    if CREATIVE_TERMS.iter().any(|t| lower.contains(t)) {
        topics.push("creative".to_string());
    }
    if topics.is_empty() {
        topics.push("general".to_string());
    }
    topics
}

const POSITIVE_WORDS: &[&str] = &["good", "great", "excellent", "amazing", "love", "like", "awesome"];
const NEGATIVE_WORDS: &[&str] = &["bad", "terrible", "hate", "awful", "worst", "horrible"];

/// Word-count sentiment. Ties are neutral.
pub fn analyze_sentiment(query_text: &str) -> Sentiment {
    let lower = query_text.to_lowercase();
    let positive = POSITIVE_WORDS.iter().filter(|w| lower.contains(*w)).count();
    let negative = NEGATIVE_WORDS.iter().filter(|w| lower.contains(*w)).count();

    if positive > negative {
        Sentiment::Positive
    } else if negative > positive {
        Sentiment::Negative
    } else {
        Sentiment::Neutral
    }
}

const COMPLEXITY_TERMS: &[&str] = &[
    "analyze", "compare", "explain", "implement", "algorithm", "optimize",
];

/// Complexity score on a 1..=10 scale: length, technical vocabulary, and
/// question density all add weight.
pub fn assess_complexity(query_text: &str) -> u8 {
    let mut score: u32 = 1;

    let len = query_text.len();
    if len > 100 {
        score += 2;
    } else if len > 50 {
        score += 1;
    }

    let lower = query_text.to_lowercase();
    score += COMPLEXITY_TERMS.iter().filter(|t| lower.contains(*t)).count() as u32;

    let questions = query_text.matches('?').count() as u32;
    score += questions.min(3);

    score.min(10) as u8
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topics_default_to_general() {
        assert_eq!(extract_topics("hello there"), vec!["general"]);
        assert_eq!(
            extract_topics("python machine learning"),
            vec!["technology"]
        );
        assert_eq!(
            extract_topics("write a story about the stock market"),
            vec!["business", "creative"]
        );
    }

    #[test]
    fn sentiment_tie_is_neutral() {
        assert_eq!(analyze_sentiment("I love this"), Sentiment::Positive);
        assert_eq!(analyze_sentiment("this is terrible"), Sentiment::Negative);
        assert_eq!(
            analyze_sentiment("I love it but it is terrible"),
            Sentiment::Neutral
        );
        assert_eq!(analyze_sentiment("what time is it"), Sentiment::Neutral);
    }

    #[test]
    fn complexity_floor_and_weighting() {
        // Short, no terms, no questions.
        assert_eq!(assess_complexity("tell me a joke pretty please ok"), 1);

        // >100 chars (+2), two terms (+2), one question (+1).
        let long = format!(
            "Can you analyze and then explain {} in depth?",
            "x".repeat(80)
        );
        assert_eq!(assess_complexity(&long), 6);
    }

    #[test]
    fn complexity_is_capped() {
        let heavy = format!(
            "analyze compare explain implement algorithm optimize {}????",
            "y".repeat(120)
        );
        assert_eq!(assess_complexity(&heavy), 10);
    }

    #[tokio::test]
    async fn history_is_bounded() {
        let memory = ConversationMemory::new();
        for i in 0..(MAX_TURNS_PER_USER + 5) {
            memory
                .add_turn("u1", &format!("query {i}"), "answer", HashMap::new())
                .await;
        }
        let history = memory.chat_history("u1").await;
        assert_eq!(history.len(), MAX_TURNS_PER_USER * 2);
        // Oldest turns were dropped.
        assert_eq!(history[0].1, "query 5");
    }

    #[tokio::test]
    async fn approach_follows_query_topic_overlap() {
        let memory = ConversationMemory::new();
        // A single business turn is enough to personalize a business query.
        memory
            .add_turn("u1", "stock market outlook", "answer", HashMap::new())
            .await;

        let ctx = memory.context_for("u1", "how is the market today").await;
        assert_eq!(ctx.preferred_topics[0], "business");
        assert_eq!(ctx.suggested_approach, "personalized");

        // A query outside the profile's topics stays standard.
        let off_topic = memory.context_for("u1", "hello there").await;
        assert_eq!(off_topic.suggested_approach, "standard");

        let fresh = memory.context_for("nobody", "stock market outlook").await;
        assert_eq!(fresh.suggested_approach, "standard");
    }

    #[tokio::test]
    async fn long_history_without_overlap_is_still_standard() {
        let memory = ConversationMemory::new();
        for _ in 0..3 {
            memory
                .add_turn("u1", "hello there friend", "answer", HashMap::new())
                .await;
        }
        // Turn count alone never flips the approach.
        let ctx = memory.context_for("u1", "stock market outlook").await;
        assert_eq!(ctx.suggested_approach, "standard");
    }
}
