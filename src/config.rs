//! Configuration loading from environment variables via dotenvy.
//! No values are ever hardcoded here.

use crate::error::AgentError;

/// Runtime configuration loaded from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Generation-backend API key — sourced from `GROQ_API_KEY`
    pub api_key: String,
    /// Base URL for the OpenAI-compatible completions API — `GROQ_BASE_URL`
    pub completion_base_url: String,
    /// Small, fast model for classification / extraction / scoring — `FAST_MODEL`
    pub fast_model: String,
    /// Large model for specialist synthesis and personalization — `SMART_MODEL`
    pub smart_model: String,
    /// Base URL of the SearxNG-compatible search gateway — `SEARCH_BASE_URL`
    pub search_base_url: String,
    /// Base URL of the finance quote service — `FINANCE_BASE_URL`
    pub finance_base_url: String,
    /// Base URL of the vector-memory service — `MEMORY_BASE_URL`.
    /// Empty means durable memory is disabled (every read degrades to empty).
    pub memory_base_url: String,
    /// Per-request HTTP timeout in seconds — `HTTP_TIMEOUT_SECS`
    pub http_timeout_secs: u64,
    /// Response cache capacity — `CACHE_MAX_SIZE`
    pub cache_max_size: usize,
}

/// Load configuration purely from already-set environment variables.
///
/// Does **not** call `dotenvy::dotenv()` — useful in tests that need to
/// control the env precisely via [`std::env::set_var`] / [`std::env::remove_var`].
///
/// # Errors
/// Returns [`AgentError::Config`] if required variables are missing or invalid.
pub fn load_config_from_env() -> Result<Config, AgentError> {
    let api_key = std::env::var("GROQ_API_KEY")
        .map_err(|_| AgentError::Config("GROQ_API_KEY not set".to_string()))?;

    if api_key.is_empty() {
        return Err(AgentError::Config("GROQ_API_KEY is empty".to_string()));
    }

    let completion_base_url = std::env::var("GROQ_BASE_URL")
        .unwrap_or_else(|_| "https://api.groq.com/openai".to_string());

    if !completion_base_url.starts_with("http://") && !completion_base_url.starts_with("https://") {
        return Err(AgentError::Config(
            "GROQ_BASE_URL must start with http:// or https://".to_string(),
        ));
    }

    let fast_model = std::env::var("FAST_MODEL")
        .unwrap_or_else(|_| "llama-3.1-8b-instant".to_string());

    let smart_model = std::env::var("SMART_MODEL")
        .unwrap_or_else(|_| "llama-3.3-70b-versatile".to_string());

    let search_base_url = std::env::var("SEARCH_BASE_URL")
        .unwrap_or_else(|_| "http://localhost:8888".to_string());

    let finance_base_url = std::env::var("FINANCE_BASE_URL")
        .unwrap_or_else(|_| "https://query1.finance.yahoo.com".to_string());

    let memory_base_url = std::env::var("MEMORY_BASE_URL").unwrap_or_default();

    let http_timeout_secs = std::env::var("HTTP_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(30);

    let cache_max_size = std::env::var("CACHE_MAX_SIZE")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(500);

    Ok(Config {
        api_key,
        completion_base_url,
        fast_model,
        smart_model,
        search_base_url,
        finance_base_url,
        memory_base_url,
        http_timeout_secs,
        cache_max_size,
    })
}

/// Load configuration from the environment (`.env` + system env vars).
///
/// Loads `.env` via `dotenvy` first (ignoring errors if the file is absent),
/// then delegates to [`load_config_from_env`].
///
/// # Errors
/// Returns [`AgentError::Config`] if required variables are missing or invalid.
pub fn load_config() -> Result<Config, AgentError> {
    // Load .env if present; ignore the error — variables may already be set externally.
    let _ = dotenvy::dotenv();
    load_config_from_env()
}

// ── Pipeline constants ─────────────────────────────────────────────────────

/// Cache TTL for responses produced by the specialist path.
pub const SPECIALIST_CACHE_TTL_SECS: u64 = 1800;

/// Cache TTL for responses produced by the fallback path.
pub const FALLBACK_CACHE_TTL_SECS: u64 = 900;

/// Maximum conversation turns retained per user in short-term memory.
pub const MAX_TURNS_PER_USER: usize = 50;

/// Turns of history included in the casual-synthesis prompt.
pub const CASUAL_HISTORY_TURNS: usize = 20;

/// Turns of recent context returned by `context_for`.
pub const CONTEXT_RECENT_TURNS: usize = 5;

/// Interaction records retained per user by the analytics recorder.
pub const MAX_ANALYTICS_RECORDS: usize = 100;

/// Turns rehydrated from durable memory on a cold start.
pub const REHYDRATE_HISTORY_LIMIT: usize = 10;

/// Financial poller interval.
pub const FINANCIAL_POLL_SECS: u64 = 30;

/// News poller interval.
pub const NEWS_POLL_SECS: u64 = 300;

/// Web-monitor poller interval.
pub const WEB_MONITOR_POLL_SECS: u64 = 600;

/// Word-overlap threshold above which consecutive queries count as repetition.
pub const REPEAT_SIMILARITY_THRESHOLD: f64 = 0.5;

/// Confidence baseline when any tool reported an error.
pub const CONFIDENCE_BASE_DEGRADED: u8 = 60;

/// Confidence baseline when every tool succeeded.
pub const CONFIDENCE_BASE_OK: u8 = 85;

/// Confidence reported with the fixed apology on total synthesis failure.
pub const CONFIDENCE_APOLOGY: u8 = 20;

/// Confidence reported for specialist-path responses.
pub const CONFIDENCE_SPECIALIST: u8 = 95;
