//! HTTP collaborators for web search, news search, social-media search and
//! stock quotes.
//!
//! The search client speaks the SearxNG JSON protocol (`/search?q=…&format=json`)
//! and normalizes results into the `{title, snippet, url}` shape consumed by
//! synthesis. The finance client queries a Yahoo-style quote endpoint and
//! reduces it to a flat quote object.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::{config::Config, error::AgentError};

/// Search collaborator: web, news, and platform-scoped social lookups.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// General web search, at most `limit` results.
    async fn web_search(&self, query: &str, limit: usize) -> Result<Vec<Value>, AgentError>;

    /// News-focused search, at most `limit` results.
    async fn news_search(&self, query: &str, limit: usize) -> Result<Vec<Value>, AgentError>;

    /// Social-media search scoped to one platform.
    async fn social_media_search(&self, query: &str, platform: &str)
        -> Result<Vec<Value>, AgentError>;
}

/// Finance collaborator: a single quote lookup per ticker.
#[async_trait]
pub trait FinanceBackend: Send + Sync {
    /// Fetch a flat quote object for `ticker`, or `{"error": …}` if the
    /// symbol is unknown.
    async fn stock_info(&self, ticker: &str) -> Result<Value, AgentError>;
}

// ── SearxNG-compatible search client ─────────────────────────────────────────

pub struct SearxClient {
    client: reqwest::Client,
    base_url: String,
}

impl SearxClient {
    pub fn new(config: &Config) -> Result<Self, AgentError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.http_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.search_base_url.clone(),
        })
    }

    async fn search(&self, query: &str, categories: Option<&str>) -> Result<Vec<Value>, AgentError> {
        let url = format!("{}/search", self.base_url);
        let mut params = vec![("q", query.to_string()), ("format", "json".to_string())];
        if let Some(cats) = categories {
            params.push(("categories", cats.to_string()));
        }

        let response = self
            .client
            .get(&url)
            .query(&params)
            .send()
            .await
            .map_err(AgentError::Http)?;

        if !response.status().is_success() {
            return Err(AgentError::Search(format!(
                "search gateway returned HTTP {}",
                response.status().as_u16()
            )));
        }

        let body: Value = response.json().await.map_err(AgentError::Http)?;
        let results = body
            .get("results")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        Ok(results)
    }

    fn normalize(raw: &Value) -> Value {
        json!({
            "title":   raw.get("title").and_then(Value::as_str).unwrap_or(""),
            "snippet": raw.get("content").and_then(Value::as_str).unwrap_or(""),
            "url":     raw.get("url").and_then(Value::as_str).unwrap_or(""),
        })
    }

    fn normalize_news(raw: &Value) -> Value {
        let mut item = Self::normalize(raw);
        item["source"] = json!(raw
            .get("engine")
            .and_then(Value::as_str)
            .unwrap_or("unknown"));
        item["date"] = json!(raw
            .get("publishedDate")
            .and_then(Value::as_str)
            .unwrap_or(""));
        item
    }
}

#[async_trait]
impl SearchBackend for SearxClient {
    async fn web_search(&self, query: &str, limit: usize) -> Result<Vec<Value>, AgentError> {
        let raw = self.search(query, None).await?;
        Ok(raw.iter().take(limit).map(Self::normalize).collect())
    }

    async fn news_search(&self, query: &str, limit: usize) -> Result<Vec<Value>, AgentError> {
        let raw = self.search(query, Some("news")).await?;
        Ok(raw.iter().take(limit).map(Self::normalize_news).collect())
    }

    async fn social_media_search(
        &self,
        query: &str,
        platform: &str,
    ) -> Result<Vec<Value>, AgentError> {
        let scoped = format!("site:{platform}.com {query}");
        let raw = self.search(&scoped, None).await?;

        // Keep only hits actually on the requested platform's domain.
        let domain = format!("{platform}.com");
        let items = raw
            .iter()
            .filter(|r| {
                r.get("url")
                    .and_then(Value::as_str)
                    .map(|u| u.contains(&domain))
                    .unwrap_or(false)
            })
            .take(5)
            .map(|r| {
                let mut item = Self::normalize(r);
                item["platform"] = json!(platform);
                item
            })
            .collect();
        Ok(items)
    }
}

// ── Yahoo-style quote client ─────────────────────────────────────────────────

pub struct QuoteClient {
    client: reqwest::Client,
    base_url: String,
}

impl QuoteClient {
    pub fn new(config: &Config) -> Result<Self, AgentError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.http_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.finance_base_url.clone(),
        })
    }

    /// Reduce the chart-endpoint response to the flat quote shape synthesis
    /// and source extraction expect.
    fn flatten_quote(ticker: &str, body: &Value) -> Value {
        let meta = match body.pointer("/chart/result/0/meta") {
            Some(m) => m,
            None => return json!({"error": format!("no quote data for {ticker}")}),
        };

        let price = meta
            .get("regularMarketPrice")
            .and_then(Value::as_f64)
            .unwrap_or(0.0);
        let prev_close = meta
            .get("chartPreviousClose")
            .and_then(Value::as_f64)
            .unwrap_or(price);

        let change = price - prev_close;
        let change_pct = if prev_close != 0.0 {
            change / prev_close * 100.0
        } else {
            0.0
        };

        json!({
            "symbol":             meta.get("symbol").and_then(Value::as_str).unwrap_or(ticker),
            "currentPrice":       price,
            "previousClose":      prev_close,
            "priceChange":        change,
            "priceChangePercent": change_pct,
            "currency":           meta.get("currency").and_then(Value::as_str).unwrap_or("USD"),
            "exchangeName":       meta.get("exchangeName").and_then(Value::as_str).unwrap_or(""),
            "dayHigh":            meta.get("regularMarketDayHigh").and_then(Value::as_f64),
            "dayLow":             meta.get("regularMarketDayLow").and_then(Value::as_f64),
            "volume":             meta.get("regularMarketVolume").and_then(Value::as_u64),
        })
    }
}

#[async_trait]
impl FinanceBackend for QuoteClient {
    async fn stock_info(&self, ticker: &str) -> Result<Value, AgentError> {
        let url = format!("{}/v8/finance/chart/{ticker}", self.base_url);

        let response = self
            .client
            .get(&url)
            .header("user-agent", "Mozilla/5.0")
            .send()
            .await
            .map_err(AgentError::Http)?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            // Unknown symbol is data, not a transport failure.
            return Ok(json!({"error": format!("symbol {ticker} not found")}));
        }
        if !status.is_success() {
            return Err(AgentError::Finance(format!(
                "quote service returned HTTP {}",
                status.as_u16()
            )));
        }

        let body: Value = response.json().await.map_err(AgentError::Http)?;
        Ok(Self::flatten_quote(ticker, &body))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_maps_content_to_snippet() {
        let raw = json!({"title": "T", "content": "C", "url": "https://example.com", "engine": "ddg"});
        let item = SearxClient::normalize(&raw);
        assert_eq!(item["title"], "T");
        assert_eq!(item["snippet"], "C");
        assert_eq!(item["url"], "https://example.com");
    }

    #[test]
    fn normalize_news_carries_source_and_date() {
        let raw = json!({
            "title": "Headline", "content": "Body", "url": "https://n.example",
            "engine": "bing news", "publishedDate": "2026-08-20"
        });
        let item = SearxClient::normalize_news(&raw);
        assert_eq!(item["source"], "bing news");
        assert_eq!(item["date"], "2026-08-20");
    }

    #[test]
    fn flatten_quote_derives_change_fields() {
        let body = json!({
            "chart": {"result": [{"meta": {
                "symbol": "AAPL",
                "regularMarketPrice": 210.0,
                "chartPreviousClose": 200.0,
                "currency": "USD",
                "exchangeName": "NMS"
            }}]}
        });
        let quote = QuoteClient::flatten_quote("AAPL", &body);
        assert_eq!(quote["symbol"], "AAPL");
        assert_eq!(quote["priceChange"], 10.0);
        assert_eq!(quote["priceChangePercent"], 5.0);
    }

    #[test]
    fn flatten_quote_missing_meta_is_error_value() {
        let quote = QuoteClient::flatten_quote("ZZZZ", &json!({"chart": {"result": null}}));
        assert!(quote.get("error").is_some());
    }
}
