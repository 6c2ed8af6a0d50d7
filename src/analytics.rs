//! Interaction analytics: per-user usage tracking, trend detection, and
//! recommendations. Windows are bounded so a chatty user never grows memory
//! without limit.

use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::{json, Value};

use crate::config::MAX_ANALYTICS_RECORDS;

#[derive(Debug, Clone)]
struct InteractionRecord {
    timestamp: chrono::DateTime<chrono::Utc>,
    complexity: u8,
    response_time_s: f64,
    satisfaction: Option<f64>,
}

#[derive(Debug, Default)]
struct UserAnalytics {
    total_interactions: u64,
    preferred_agents: HashMap<String, u64>,
    query_patterns: Vec<InteractionRecord>,
}

/// Process-wide analytics store. Lock-per-call, no await inside.
#[derive(Default)]
pub struct AnalyticsRecorder {
    users: Mutex<HashMap<String, UserAnalytics>>,
}

impl AnalyticsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one handled query.
    pub fn track_interaction(
        &self,
        user_id: &str,
        agent_used: &str,
        complexity: u8,
        response_time_s: f64,
        satisfaction: Option<f64>,
    ) {
        let mut users = self.lock();
        let analytics = users.entry(user_id.to_string()).or_default();

        analytics.total_interactions += 1;
        *analytics
            .preferred_agents
            .entry(agent_used.to_string())
            .or_insert(0) += 1;

        analytics.query_patterns.push(InteractionRecord {
            timestamp: chrono::Utc::now(),
            complexity,
            response_time_s,
            satisfaction,
        });
        if analytics.query_patterns.len() > MAX_ANALYTICS_RECORDS {
            let overflow = analytics.query_patterns.len() - MAX_ANALYTICS_RECORDS;
            analytics.query_patterns.drain(..overflow);
        }
    }

    /// Usage analysis for one user.
    pub fn analyze(&self, user_id: &str) -> Value {
        let users = self.lock();

        let analytics = match users.get(user_id) {
            Some(analytics) => analytics,
            None => return json!({"status": "insufficient_data"}),
        };
        if analytics.query_patterns.is_empty() {
            return json!({"status": "insufficient_recent_data"});
        }

        let recent: Vec<&InteractionRecord> = analytics
            .query_patterns
            .iter()
            .rev()
            .take(10)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();

        let avg_complexity =
            recent.iter().map(|r| r.complexity as f64).sum::<f64>() / recent.len() as f64;
        let avg_response_time =
            recent.iter().map(|r| r.response_time_s).sum::<f64>() / recent.len() as f64;

        let rated: Vec<f64> = recent.iter().filter_map(|r| r.satisfaction).collect();
        let avg_satisfaction = if rated.is_empty() {
            None
        } else {
            Some(rated.iter().sum::<f64>() / rated.len() as f64)
        };

        let complexity_trend = if recent.len() >= 2 {
            let first = recent[0].complexity as f64;
            let last = recent[recent.len() - 1].complexity as f64;
            if last > first {
                "increasing"
            } else if last < first {
                "decreasing"
            } else {
                "stable"
            }
        } else {
            "stable"
        };

        let performance_trend = performance_trend(&recent);
        let dominant_agent = analytics
            .preferred_agents
            .iter()
            .max_by_key(|(_, count)| *count)
            .map(|(name, count)| (name.clone(), *count));

        let mut recommendations: Vec<String> = Vec::new();
        if let Some((ref name, count)) = dominant_agent {
            let share = count as f64 / analytics.total_interactions as f64;
            if share > 0.7 {
                recommendations.push(format!(
                    "Most of your questions route to the {name} path. Try asking about other \
                     areas to get broader answers."
                ));
            }
        }
        if avg_complexity < 3.0 {
            recommendations.push(
                "Your questions have been simple lately. More detailed questions tend to get \
                 richer answers."
                    .to_string(),
            );
        }

        json!({
            "status": "ok",
            "total_interactions": analytics.total_interactions,
            "avg_complexity": avg_complexity,
            "avg_response_time_s": avg_response_time,
            "avg_satisfaction": avg_satisfaction,
            "complexity_trend": complexity_trend,
            "performance_trend": performance_trend,
            "last_activity": recent.last().map(|r| r.timestamp.to_rfc3339()),
            "recommendations": recommendations,
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, UserAnalytics>> {
        self.users.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Compare the mean response time of the newest three records against the
/// three before them. Within 20 percent counts as stable.
fn performance_trend(recent: &[&InteractionRecord]) -> &'static str {
    if recent.len() < 6 {
        return "stable";
    }
    let newest: f64 = recent[recent.len() - 3..]
        .iter()
        .map(|r| r.response_time_s)
        .sum::<f64>()
        / 3.0;
    let older: f64 = recent[recent.len() - 6..recent.len() - 3]
        .iter()
        .map(|r| r.response_time_s)
        .sum::<f64>()
        / 3.0;

    if older == 0.0 {
        return "stable";
    }
    let ratio = newest / older;
    if ratio > 1.2 {
        "degrading"
    } else if ratio < 0.8 {
        "improving"
    } else {
        "stable"
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
