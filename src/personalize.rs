//! Personalization of specialist-path drafts.
//!
//! One smart-model pass rewrites a draft answer in light of the user's
//! conversation context. Failure keeps the draft untouched and reports that
//! no personalization was applied.

use std::sync::Arc;

use tracing::warn;

use crate::completion::{ChatMessage, ChatRequest, CompletionBackend};
use crate::config::Config;
use crate::memory::UserContext;
use crate::types::ProactiveSuggestion;

const PERSONALIZATION_SYSTEM_PROMPT: &str = "You adapt an assistant's draft answer to one \
specific user. Keep every fact intact. Adjust tone and emphasis to the user's interests and \
the way they have been interacting. If suggestions are provided, weave at most one in \
naturally at the end. Return only the adapted answer.";

pub struct PersonalizationLayer {
    completion: Arc<dyn CompletionBackend>,
    smart_model: String,
}

impl PersonalizationLayer {
    pub fn new(completion: Arc<dyn CompletionBackend>, config: &Config) -> Self {
        Self {
            completion,
            smart_model: config.smart_model.clone(),
        }
    }

    /// Adapt `draft` for the user. Returns the text to use and whether the
    /// adaptation actually happened.
    pub async fn adapt(
        &self,
        draft: &str,
        context: &UserContext,
        suggestions: &[ProactiveSuggestion],
    ) -> (String, bool) {
        let mut brief = format!(
            "Preferred topics: {}. Average query complexity: {:.1}. Approach: {}.",
            if context.preferred_topics.is_empty() {
                "none yet".to_string()
            } else {
                context.preferred_topics.join(", ")
            },
            context.average_complexity,
            context.suggested_approach,
        );
        if !suggestions.is_empty() {
            let titles: Vec<&str> = suggestions.iter().map(|s| s.title.as_str()).collect();
            brief.push_str(&format!(" Pending suggestions: {}.", titles.join(", ")));
        }

        let request = ChatRequest::new(
            &self.smart_model,
            vec![
                ChatMessage::system(PERSONALIZATION_SYSTEM_PROMPT),
                ChatMessage::user(format!("User profile: {brief}\n\nDraft answer:\n{draft}")),
            ],
        )
        .max_tokens(900);

        match self.completion.complete(request).await {
            Ok(adapted) => (adapted, true),
            Err(error) => {
                warn!(%error, "personalization failed, keeping draft");
                (draft.to_string(), false)
            }
        }
    }
}
