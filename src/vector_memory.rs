//! Durable conversation memory behind a vector store.
//!
//! Documents pair the user query and the assistant response in one text blob
//! so semantic search matches either side. Every failure here degrades to an
//! empty result with a warning; durable memory being down never fails a query.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::warn;

use crate::config::Config;
use crate::error::AgentError;

/// One stored document with its metadata.
#[derive(Debug, Clone)]
pub struct MemoryRecord {
    pub id: String,
    pub document: String,
    pub user_id: String,
    pub timestamp: String,
}

/// The durable-memory collaborator.
#[async_trait]
pub trait MemoryBackend: Send + Sync {
    async fn add(&self, record: MemoryRecord) -> Result<(), AgentError>;

    /// Semantic search over one user's documents.
    async fn query(
        &self,
        text: &str,
        limit: usize,
        user_id: &str,
    ) -> Result<Vec<MemoryRecord>, AgentError>;

    /// Every document for one user, unordered.
    async fn fetch_all(&self, user_id: &str) -> Result<Vec<MemoryRecord>, AgentError>;
}

/// HTTP client for the vector-memory service. `None` when the service is not
/// configured.
pub struct HttpMemoryClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpMemoryClient {
    /// Returns `Ok(None)` when `MEMORY_BASE_URL` is unset.
    pub fn from_config(config: &Config) -> Result<Option<Self>, AgentError> {
        if config.memory_base_url.is_empty() {
            return Ok(None);
        }
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.http_timeout_secs))
            .build()?;
        Ok(Some(Self {
            client,
            base_url: config.memory_base_url.clone(),
        }))
    }

    fn parse_records(body: &Value) -> Vec<MemoryRecord> {
        body.get("records")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| {
                        Some(MemoryRecord {
                            id: item.get("id")?.as_str()?.to_string(),
                            document: item.get("document")?.as_str()?.to_string(),
                            user_id: item
                                .pointer("/metadata/user_id")
                                .and_then(Value::as_str)
                                .unwrap_or_default()
                                .to_string(),
                            timestamp: item
                                .pointer("/metadata/timestamp")
                                .and_then(Value::as_str)
                                .unwrap_or_default()
                                .to_string(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value, AgentError> {
        let response = self
            .client
            .post(format!("{}{path}", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(AgentError::Http)?;

        if !response.status().is_success() {
            return Err(AgentError::Memory(format!(
                "memory service returned HTTP {}",
                response.status().as_u16()
            )));
        }
        response.json().await.map_err(AgentError::Http)
    }
}

#[async_trait]
impl MemoryBackend for HttpMemoryClient {
    async fn add(&self, record: MemoryRecord) -> Result<(), AgentError> {
        self.post(
            "/documents",
            json!({
                "id": record.id,
                "document": record.document,
                "metadata": {"user_id": record.user_id, "timestamp": record.timestamp},
            }),
        )
        .await?;
        Ok(())
    }

    async fn query(
        &self,
        text: &str,
        limit: usize,
        user_id: &str,
    ) -> Result<Vec<MemoryRecord>, AgentError> {
        let body = self
            .post(
                "/query",
                json!({"text": text, "limit": limit, "where": {"user_id": user_id}}),
            )
            .await?;
        Ok(Self::parse_records(&body))
    }

    async fn fetch_all(&self, user_id: &str) -> Result<Vec<MemoryRecord>, AgentError> {
        let body = self
            .post("/get", json!({"where": {"user_id": user_id}}))
            .await?;
        Ok(Self::parse_records(&body))
    }
}

// ── Service bridge ────────────────────────────────────────────────────────────

const RESPONSE_MARKER: &str = "\nAI response: ";

/// High-level durable-memory operations over an optional backend.
pub struct MemoryService {
    backend: Option<Box<dyn MemoryBackend>>,
}

impl MemoryService {
    pub fn new(backend: Option<Box<dyn MemoryBackend>>) -> Self {
        Self { backend }
    }

    pub fn disabled() -> Self {
        Self { backend: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    /// Persist one completed exchange. Best effort.
    pub async fn store_exchange(&self, user_id: &str, query_text: &str, response_text: &str) {
        let backend = match &self.backend {
            Some(backend) => backend,
            None => return,
        };

        let timestamp = chrono::Utc::now().to_rfc3339();
        let record = MemoryRecord {
            id: format!("{user_id}-{timestamp}"),
            document: format!("User query: {query_text}{RESPONSE_MARKER}{response_text}"),
            user_id: user_id.to_string(),
            timestamp,
        };

        if let Err(error) = backend.add(record).await {
            warn!(%error, user = user_id, "failed to persist exchange");
        }
    }

    /// The user's most recent exchanges as (query, response) pairs, oldest
    /// first. Empty on any failure.
    pub async fn recent_history(&self, user_id: &str, limit: usize) -> Vec<(String, String)> {
        let backend = match &self.backend {
            Some(backend) => backend,
            None => return vec![],
        };

        let mut records = match backend.fetch_all(user_id).await {
            Ok(records) => records,
            Err(error) => {
                warn!(%error, user = user_id, "failed to fetch durable history");
                return vec![];
            }
        };

        records.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        let skip = records.len().saturating_sub(limit);

        records[skip..]
            .iter()
            .filter_map(|record| split_document(&record.document))
            .collect()
    }

    /// Semantically similar past exchanges for context injection.
    pub async fn related_exchanges(
        &self,
        user_id: &str,
        query_text: &str,
        limit: usize,
    ) -> Vec<(String, String)> {
        let backend = match &self.backend {
            Some(backend) => backend,
            None => return vec![],
        };

        match backend.query(query_text, limit, user_id).await {
            Ok(records) => records
                .iter()
                .filter_map(|record| split_document(&record.document))
                .collect(),
            Err(error) => {
                warn!(%error, user = user_id, "failed to query durable memory");
                vec![]
            }
        }
    }
}

/// Split a stored document back into (query, response). Documents missing the
/// response marker are skipped.
fn split_document(document: &str) -> Option<(String, String)> {
    let rest = document.strip_prefix("User query: ")?;
    let (query, response) = rest.split_once(RESPONSE_MARKER)?;
    Some((query.to_string(), response.to_string()))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_round_trip() {
        let doc = "User query: what is rust\nAI response: A systems language.";
        assert_eq!(
            split_document(doc),
            Some(("what is rust".to_string(), "A systems language.".to_string()))
        );
    }

    #[test]
    fn malformed_documents_are_skipped() {
        assert_eq!(split_document("garbage"), None);
        assert_eq!(split_document("User query: no response part"), None);
    }

    #[test]
    fn parse_records_tolerates_partial_items() {
        let body = json!({
            "records": [
                {"id": "a", "document": "User query: q\nAI response: r",
                 "metadata": {"user_id": "u1", "timestamp": "2026-08-01T00:00:00Z"}},
                {"id": "b"},
            ]
        });
        let records = HttpMemoryClient::parse_records(&body);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].user_id, "u1");
    }

    #[tokio::test]
    async fn disabled_service_degrades_to_empty() {
        let service = MemoryService::disabled();
        assert!(!service.is_enabled());
        assert!(service.recent_history("u1", 10).await.is_empty());
        service.store_exchange("u1", "q", "r").await;
    }
}
