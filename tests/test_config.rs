//! Tests for [`agentic_ai::config`]
//!
//! Env-var tests use a process-wide `Mutex` to run serially even under the
//! default multi-threaded test harness (`cargo test`).

use agentic_ai::config::{
    load_config_from_env, CASUAL_HISTORY_TURNS, CONTEXT_RECENT_TURNS, FALLBACK_CACHE_TTL_SECS,
    MAX_ANALYTICS_RECORDS, MAX_TURNS_PER_USER, SPECIALIST_CACHE_TTL_SECS,
};
use std::sync::{Mutex, MutexGuard};

// ── Serialiser ────────────────────────────────────────────────────────────────

static ENV_MUTEX: Mutex<()> = Mutex::new(());

fn lock_env() -> MutexGuard<'static, ()> {
    ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner())
}

// ── Helper: guard that restores env vars on drop ──────────────────────────────

struct EnvGuard {
    key: &'static str,
    original: Option<String>,
}

impl EnvGuard {
    fn set(key: &'static str, value: &str) -> Self {
        let original = std::env::var(key).ok();
        std::env::set_var(key, value);
        Self { key, original }
    }

    fn remove(key: &'static str) -> Self {
        let original = std::env::var(key).ok();
        std::env::remove_var(key);
        Self { key, original }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        match &self.original {
            Some(v) => std::env::set_var(self.key, v),
            None => std::env::remove_var(self.key),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[test]
fn test_load_config_fails_missing_api_key() {
    let _lock = lock_env();
    let _g = EnvGuard::remove("GROQ_API_KEY");

    let result = load_config_from_env();
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("GROQ_API_KEY"));
}

#[test]
fn test_load_config_fails_empty_api_key() {
    let _lock = lock_env();
    let _g = EnvGuard::set("GROQ_API_KEY", "");

    assert!(load_config_from_env().is_err());
}

#[test]
fn test_load_config_defaults() {
    let _lock = lock_env();
    let _g = EnvGuard::set("GROQ_API_KEY", "gsk-test");
    let _g2 = EnvGuard::remove("GROQ_BASE_URL");
    let _g3 = EnvGuard::remove("FAST_MODEL");
    let _g4 = EnvGuard::remove("MEMORY_BASE_URL");
    let _g5 = EnvGuard::remove("HTTP_TIMEOUT_SECS");
    let _g6 = EnvGuard::remove("CACHE_MAX_SIZE");

    let config = load_config_from_env().unwrap();
    assert_eq!(config.completion_base_url, "https://api.groq.com/openai");
    assert_eq!(config.fast_model, "llama-3.1-8b-instant");
    assert_eq!(config.smart_model, "llama-3.3-70b-versatile");
    assert!(config.memory_base_url.is_empty());
    assert_eq!(config.http_timeout_secs, 30);
    assert_eq!(config.cache_max_size, 500);
}

#[test]
fn test_load_config_rejects_bad_base_url() {
    let _lock = lock_env();
    let _g = EnvGuard::set("GROQ_API_KEY", "gsk-test");
    let _g2 = EnvGuard::set("GROQ_BASE_URL", "ftp://example.com");

    assert!(load_config_from_env().is_err());
}

#[test]
fn test_load_config_overrides() {
    let _lock = lock_env();
    let _g = EnvGuard::set("GROQ_API_KEY", "gsk-test");
    let _g2 = EnvGuard::set("GROQ_BASE_URL", "http://localhost:9999");
    let _g3 = EnvGuard::set("FAST_MODEL", "test-model");
    let _g4 = EnvGuard::set("HTTP_TIMEOUT_SECS", "5");
    let _g5 = EnvGuard::set("CACHE_MAX_SIZE", "25");

    let config = load_config_from_env().unwrap();
    assert_eq!(config.completion_base_url, "http://localhost:9999");
    assert_eq!(config.fast_model, "test-model");
    assert_eq!(config.http_timeout_secs, 5);
    assert_eq!(config.cache_max_size, 25);
}

#[test]
fn test_invalid_numeric_overrides_fall_back_to_defaults() {
    let _lock = lock_env();
    let _g = EnvGuard::set("GROQ_API_KEY", "gsk-test");
    let _g2 = EnvGuard::set("HTTP_TIMEOUT_SECS", "not-a-number");
    let _g3 = EnvGuard::set("CACHE_MAX_SIZE", "-1");

    let config = load_config_from_env().unwrap();
    assert_eq!(config.http_timeout_secs, 30);
    assert_eq!(config.cache_max_size, 500);
}

#[test]
fn test_pipeline_constants_are_sane() {
    assert!(SPECIALIST_CACHE_TTL_SECS > FALLBACK_CACHE_TTL_SECS);
    assert!(MAX_TURNS_PER_USER >= CASUAL_HISTORY_TURNS);
    assert!(CASUAL_HISTORY_TURNS >= CONTEXT_RECENT_TURNS);
    assert!(MAX_ANALYTICS_RECORDS > 0);
}
