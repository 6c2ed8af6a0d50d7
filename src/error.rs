//! Custom error types for the query-orchestration pipeline.

use thiserror::Error;

/// Unified error type propagated through every pipeline component.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Completion backend error: {0}")]
    Completion(String),

    #[error("Search backend error: {0}")]
    Search(String),

    #[error("Finance backend error: {0}")]
    Finance(String),

    #[error("Memory backend error: {0}")]
    Memory(String),

    #[error("Specialist agent error: {0}")]
    Specialist(String),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Input validation error: {0}")]
    InputValidation(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
