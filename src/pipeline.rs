//! The query-orchestration pipeline.
//!
//! One entry point, [`Pipeline::handle_query`], runs the full lifecycle:
//! cache check, lazy stream bootstrap, tool-need analysis, context assembly,
//! a specialist attempt, the tool-execution fallback, persistence, and
//! progress emission. Exactly one `Final` event is emitted per query, however
//! the query resolves.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::json;
use tracing::{info, warn};

use crate::agents::{AgentContext, AgentOrchestrator};
use crate::analytics::AnalyticsRecorder;
use crate::backends::{FinanceBackend, SearchBackend};
use crate::cache::{fingerprint, RequestCache};
use crate::classifier::QueryClassifier;
use crate::completion::CompletionBackend;
use crate::config::{
    Config, CONFIDENCE_SPECIALIST, FALLBACK_CACHE_TTL_SECS, SPECIALIST_CACHE_TTL_SECS,
};
use crate::discovery::ToolNeedAnalyzer;
use crate::error::AgentError;
use crate::memory::ConversationMemory;
use crate::progress::{emit_final, emit_status, ProgressSender};
use crate::streams::{DataStreamRegistry, StreamKind};
use crate::synthesis::{extract_specialist_sources, ResponseSynthesizer, SynthesizedResponse};
use crate::tools::{ToolExecutionEngine, ToolRegistry};
use crate::types::{HealthReport, Query, ResponsePayload};
use crate::vector_memory::{MemoryBackend, MemoryService};

const DEFAULT_FINANCIAL_STREAM: &str = "default_financial";
const DEFAULT_NEWS_STREAM: &str = "tech_news";

const DEFAULT_SYMBOLS: &[&str] = &["AAPL", "GOOGL", "MSFT", "TSLA", "NVDA"];
const DEFAULT_NEWS_KEYWORDS: &[&str] = &["AI", "technology", "innovation", "startup"];

const FINANCIAL_HINTS: &[&str] = &["stock", "price", "market", "financial"];
const NEWS_HINTS: &[&str] = &["news", "latest", "recent", "current"];

pub struct Pipeline {
    config: Config,
    classifier: QueryClassifier,
    engine: ToolExecutionEngine,
    orchestrator: AgentOrchestrator,
    synthesizer: ResponseSynthesizer,
    personalizer: crate::personalize::PersonalizationLayer,
    memory: ConversationMemory,
    durable: Arc<MemoryService>,
    analytics: AnalyticsRecorder,
    cache: RequestCache,
    streams: DataStreamRegistry,
    discovery: ToolNeedAnalyzer,
    started_at: Instant,
    streams_initialized: AtomicBool,
}

impl Pipeline {
    pub fn new(
        config: Config,
        completion: Arc<dyn CompletionBackend>,
        search: Arc<dyn SearchBackend>,
        finance: Arc<dyn FinanceBackend>,
        memory_backend: Option<Box<dyn MemoryBackend>>,
    ) -> Self {
        let classifier = QueryClassifier::new(completion.clone(), &config);
        let engine = ToolExecutionEngine::new(ToolRegistry::standard(
            search.clone(),
            finance.clone(),
        ));
        let orchestrator = AgentOrchestrator::new(
            AgentContext {
                completion: completion.clone(),
                search: search.clone(),
                finance,
                fast_model: config.fast_model.clone(),
            },
            &config,
        );
        let synthesizer = ResponseSynthesizer::new(completion.clone(), &config);
        let personalizer = crate::personalize::PersonalizationLayer::new(completion.clone(), &config);
        let discovery = ToolNeedAnalyzer::new(completion, &config);
        let streams = DataStreamRegistry::new(search);
        let cache = RequestCache::new(config.cache_max_size);

        Self {
            config,
            classifier,
            engine,
            orchestrator,
            synthesizer,
            personalizer,
            memory: ConversationMemory::new(),
            durable: Arc::new(MemoryService::new(memory_backend)),
            analytics: AnalyticsRecorder::new(),
            cache,
            streams,
            discovery,
            started_at: Instant::now(),
            streams_initialized: AtomicBool::new(false),
        }
    }

    /// Handle one query end to end, streaming progress along the way.
    pub async fn handle_query(
        &self,
        user_id: &str,
        text: &str,
        progress: &ProgressSender,
    ) -> Result<ResponsePayload, AgentError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(AgentError::InputValidation("query is empty".to_string()));
        }
        let query = Query::new(user_id, trimmed);
        let started = Instant::now();

        // Cached answers short-circuit everything else.
        let cache_key = fingerprint(user_id, trimmed);
        if let Some(mut cached) = self.cache.get(&cache_key) {
            emit_status(progress, "Found a recent answer for this question.");
            cached.processing_time_s = started.elapsed().as_secs_f64();
            emit_final(progress, cached.clone());
            return Ok(cached);
        }

        self.ensure_default_streams().await;
        self.discovery.analyze(trimmed).await;

        if self.memory.is_cold(user_id).await {
            self.memory.rehydrate(user_id, &self.durable).await;
        }

        let context = self.memory.context_for(user_id, trimmed).await;
        let recent_queries = self.memory.recent_query_texts(user_id, 3).await;
        let suggestions = crate::proactive::suggestions_for(&recent_queries);
        let real_time_data = self.relevant_stream_data(trimmed).await;

        emit_status(progress, "Checking specialist agents...");
        let live_note = if real_time_data.is_empty() {
            None
        } else {
            serde_json::to_string(&real_time_data).ok()
        };

        let specialist = self
            .orchestrator
            .attempt(&query, live_note.as_deref())
            .await;

        let (payload, agent_label, ttl) = match specialist {
            Ok(Some(result)) => {
                emit_status(
                    progress,
                    format!("The {} specialist is handling this.", result.agent_name),
                );
                emit_status(progress, "Personalizing the answer...");
                let (adapted, applied) = self
                    .personalizer
                    .adapt(&result.content, &context, &suggestions)
                    .await;
                let sources = extract_specialist_sources(&result.payload);

                let payload = ResponsePayload {
                    response: adapted,
                    confidence: CONFIDENCE_SPECIALIST,
                    sources_found: sources.len(),
                    sources,
                    processing_time_s: started.elapsed().as_secs_f64(),
                    method: format!("Specialist: {}", result.agent_name),
                    // One logical tool: the specialist's own bundled lookup.
                    tools_used: 1,
                    personalization_applied: applied,
                    proactive_suggestions: suggestions.clone(),
                    real_time_data: real_time_data.clone(),
                };
                (
                    payload,
                    result.agent_name,
                    Duration::from_secs(SPECIALIST_CACHE_TTL_SECS),
                )
            }
            other => {
                if let Err(error) = other {
                    warn!(%error, "specialist path failed, using tool fallback");
                    emit_status(progress, "Switching to the standard pipeline...");
                }
                let payload = self
                    .fallback(&query, progress, &suggestions, &real_time_data, started)
                    .await;
                (
                    payload,
                    "fallback".to_string(),
                    Duration::from_secs(FALLBACK_CACHE_TTL_SECS),
                )
            }
        };

        self.persist(&query, &payload, &agent_label, ttl, cache_key)
            .await;

        emit_final(progress, payload.clone());
        info!(
            user = user_id,
            method = %payload.method,
            elapsed_s = payload.processing_time_s,
            "query handled"
        );
        Ok(payload)
    }

    /// Classify, execute tools, synthesize. Never fails; worst case is the
    /// fixed apology payload.
    async fn fallback(
        &self,
        query: &Query,
        progress: &ProgressSender,
        suggestions: &[crate::types::ProactiveSuggestion],
        real_time_data: &serde_json::Map<String, serde_json::Value>,
        started: Instant,
    ) -> ResponsePayload {
        emit_status(progress, "Working out what this question needs...");
        let plan = self.classifier.plan(&query.text).await;
        emit_status(
            progress,
            format!("Plan ready: {} ({} tool calls).", plan.log, plan.tool_calls.len()),
        );

        let (synthesized, method, tools_used): (SynthesizedResponse, String, usize) =
            if plan.tool_calls.is_empty() {
                let history = self.memory.chat_history(&query.user_id).await;
                let response = self
                    .synthesizer
                    .synthesize_casual(&query.text, &history)
                    .await;
                (response, "Casual Chat".to_string(), 0)
            } else {
                let mut outputs = self.engine.execute_plan(&plan, progress).await;
                emit_status(progress, "Putting the answer together...");
                let method = if outputs.is_empty() {
                    "Direct Answer".to_string()
                } else {
                    let mut names: Vec<&str> = Vec::new();
                    for (name, _) in &outputs {
                        if !names.contains(&name.as_str()) {
                            names.push(name);
                        }
                    }
                    format!("Search: {}", names.join(", "))
                };
                let count = outputs.len();
                // Live stream snapshots ride along as one more output so the
                // synthesized answer can draw on current data.
                if !real_time_data.is_empty() {
                    outputs.push((
                        "real_time_streams".to_string(),
                        serde_json::Value::Object(real_time_data.clone()),
                    ));
                }
                let response = self.synthesizer.synthesize(&query.text, &outputs).await;
                (response, method, count)
            };

        ResponsePayload {
            response: synthesized.text,
            confidence: synthesized.confidence,
            sources_found: synthesized.sources.len(),
            sources: synthesized.sources,
            processing_time_s: started.elapsed().as_secs_f64(),
            method,
            tools_used,
            personalization_applied: false,
            proactive_suggestions: suggestions.to_vec(),
            real_time_data: real_time_data.clone(),
        }
    }

    async fn persist(
        &self,
        query: &Query,
        payload: &ResponsePayload,
        agent_label: &str,
        ttl: Duration,
        cache_key: String,
    ) {
        self.cache.set(cache_key, payload.clone(), ttl);

        let metadata = HashMap::from([
            ("agent_used".to_string(), json!(agent_label)),
            (
                "processing_time".to_string(),
                json!(payload.processing_time_s),
            ),
            (
                "personalization_applied".to_string(),
                json!(payload.personalization_applied),
            ),
            (
                "proactive_suggestions_count".to_string(),
                json!(payload.proactive_suggestions.len()),
            ),
            (
                "real_time_data_used".to_string(),
                json!(!payload.real_time_data.is_empty()),
            ),
        ]);

        let turn = self
            .memory
            .add_turn(&query.user_id, &query.text, &payload.response, metadata)
            .await;

        self.analytics.track_interaction(
            &query.user_id,
            agent_label,
            turn.complexity,
            payload.processing_time_s,
            None,
        );

        // Durable persistence off the request path.
        let durable = Arc::clone(&self.durable);
        let user_id = query.user_id.clone();
        let query_text = query.text.clone();
        let response_text = payload.response.clone();
        tokio::spawn(async move {
            durable
                .store_exchange(&user_id, &query_text, &response_text)
                .await;
        });
    }

    /// Start the default streams exactly once per process.
    async fn ensure_default_streams(&self) {
        if self.streams_initialized.swap(true, Ordering::SeqCst) {
            return;
        }

        let financial = StreamKind::Financial {
            symbols: DEFAULT_SYMBOLS.iter().map(|s| s.to_string()).collect(),
        };
        if let Err(error) = self.streams.create_stream(DEFAULT_FINANCIAL_STREAM, financial).await {
            warn!(%error, "failed to start the default financial stream");
        }

        let news = StreamKind::News {
            keywords: DEFAULT_NEWS_KEYWORDS.iter().map(|s| s.to_string()).collect(),
        };
        if let Err(error) = self.streams.create_stream(DEFAULT_NEWS_STREAM, news).await {
            warn!(%error, "failed to start the default news stream");
        }
    }

    /// Fold in snapshots from streams the query's wording touches.
    async fn relevant_stream_data(
        &self,
        query_text: &str,
    ) -> serde_json::Map<String, serde_json::Value> {
        let lower = query_text.to_lowercase();
        let mut data = serde_json::Map::new();

        if FINANCIAL_HINTS.iter().any(|h| lower.contains(h)) {
            if let Some(snapshot) = self.streams.latest(DEFAULT_FINANCIAL_STREAM).await {
                data.insert("financial".to_string(), snapshot);
            }
        }
        if NEWS_HINTS.iter().any(|h| lower.contains(h)) {
            if let Some(snapshot) = self.streams.latest(DEFAULT_NEWS_STREAM).await {
                data.insert("news".to_string(), snapshot);
            }
        }
        data
    }

    /// Per-user usage analysis.
    pub fn usage_report(&self, user_id: &str) -> serde_json::Value {
        self.analytics.analyze(user_id)
    }

    /// Read-only system health snapshot.
    pub async fn health(&self) -> HealthReport {
        HealthReport {
            status: "healthy".to_string(),
            active_data_streams: self.streams.active_count().await,
            cache: self.cache.stats(),
            discovered_tools: self.discovery.descriptor_count(),
            streams_initialized: self.streams_initialized.load(Ordering::SeqCst),
            uptime_secs: self.started_at.elapsed().as_secs(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
