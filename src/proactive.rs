//! Proactive suggestions from recent query patterns.
//!
//! Pure functions over the user's last few query texts. Three patterns are
//! recognized: repetition, research-heavy usage, and time-sensitive topics.
//! Fewer than two prior turns yields no suggestions.

use std::collections::HashSet;

use crate::config::REPEAT_SIMILARITY_THRESHOLD;
use crate::types::ProactiveSuggestion;

const RESEARCH_MARKERS: &[&str] = &["research", "find", "tell me about", "what is"];
const TIME_MARKERS: &[&str] = &["today", "latest", "recent", "current"];

/// Derive suggestions from up to the last three query texts, oldest first.
pub fn suggestions_for(recent_queries: &[String]) -> Vec<ProactiveSuggestion> {
    if recent_queries.len() < 2 {
        return vec![];
    }
    let window: Vec<&String> = recent_queries
        .iter()
        .rev()
        .take(3)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();

    let mut suggestions = Vec::new();

    if has_repetition(&window) {
        suggestions.push(ProactiveSuggestion {
            kind: "automation".to_string(),
            title: "Create Automated Workflow".to_string(),
            description: "You have asked similar questions in a row. I can set up an automated \
                          workflow to track this for you."
                .to_string(),
            priority: "medium".to_string(),
        });
    }

    if is_research_heavy(&window) {
        suggestions.push(ProactiveSuggestion {
            kind: "knowledge_base".to_string(),
            title: "Personal Knowledge Base".to_string(),
            description: "You have been researching a lot. A personal knowledge base could keep \
                          these findings organized."
                .to_string(),
            priority: "low".to_string(),
        });
    }

    if is_time_sensitive(&window) {
        suggestions.push(ProactiveSuggestion {
            kind: "monitoring".to_string(),
            title: "Set Up Monitoring".to_string(),
            description: "You are following a developing topic. I can monitor it and surface \
                          updates as they land."
                .to_string(),
            priority: "high".to_string(),
        });
    }

    suggestions
}

/// Any consecutive pair with word overlap above the threshold.
fn has_repetition(window: &[&String]) -> bool {
    window
        .windows(2)
        .any(|pair| jaccard(pair[0], pair[1]) > REPEAT_SIMILARITY_THRESHOLD)
}

fn jaccard(a: &str, b: &str) -> f64 {
    let set_a: HashSet<String> = a.to_lowercase().split_whitespace().map(str::to_string).collect();
    let set_b: HashSet<String> = b.to_lowercase().split_whitespace().map(str::to_string).collect();
    if set_a.is_empty() || set_b.is_empty() {
        return 0.0;
    }
    let intersection = set_a.intersection(&set_b).count() as f64;
    let union = set_a.union(&set_b).count() as f64;
    intersection / union
}

/// At least two of the recent queries carry a research marker.
fn is_research_heavy(window: &[&String]) -> bool {
    let count = window
        .iter()
        .filter(|q| {
            let lower = q.to_lowercase();
            RESEARCH_MARKERS.iter().any(|m| lower.contains(m))
        })
        .count();
    count >= 2
}

fn is_time_sensitive(window: &[&String]) -> bool {
    window.iter().any(|q| {
        let lower = q.to_lowercase();
        TIME_MARKERS.iter().any(|m| lower.contains(m))
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
