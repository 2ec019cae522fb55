use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::api::health::HealthState;
use crate::api::latency::LatencyStats;
use crate::error::AppError;
use crate::state::{AlertLog, MarketStore};

#[derive(Clone)]
pub struct ApiState {
    pub health: Arc<HealthState>,
    pub latency: Arc<LatencyStats>,
    pub alert_log: Arc<AlertLog>,
    pub store: Arc<MarketStore>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(get_health))
        .route("/stats/summary", get(get_stats_summary))
        .route("/stats/latency", get(get_stats_latency))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct HealthResponse {
    pub state: String,
    pub progress: Option<String>,
    pub last_scan_at_ms: Option<i64>,
}

#[derive(Serialize)]
pub struct SummaryResponse {
    pub markets: u64,
    pub markets_with_freshness: usize,
    pub scans_completed: u64,
    pub matches_found: u64,
    pub alerts_sent: u64,
    pub alerts_remembered: usize,
    pub notify_failures: u64,
}

#[derive(Serialize)]
pub struct LatencyResponse {
    pub samples: u64,
    pub p50_ms: Option<u64>,
    pub p95_ms: Option<u64>,
    pub p99_ms: Option<u64>,
    pub max_ms: Option<u64>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn get_health(State(state): State<ApiState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        state: state.health.state().to_string(),
        progress: state.health.last_progress(),
        last_scan_at_ms: state.health.last_scan_at_ms(),
    })
}

async fn get_stats_summary(
    State(state): State<ApiState>,
) -> Result<Json<SummaryResponse>, AppError> {
    let h = &state.health;
    if HealthState::load(&h.markets) == 0 && h.state().is_terminal() {
        return Err(AppError::Config("scanner stopped before loading markets".to_string()));
    }
    Ok(Json(SummaryResponse {
        markets: HealthState::load(&h.markets),
        markets_with_freshness: state.store.tracked_count(),
        scans_completed: HealthState::load(&h.scans_completed),
        matches_found: HealthState::load(&h.matches_found),
        alerts_sent: HealthState::load(&h.alerts_sent),
        alerts_remembered: state.alert_log.len(),
        notify_failures: HealthState::load(&h.notify_failures),
    }))
}

async fn get_stats_latency(State(state): State<ApiState>) -> Json<LatencyResponse> {
    let p = state.latency.percentiles();
    Json(LatencyResponse {
        samples: state.latency.len(),
        p50_ms: p.map(|v| v.0),
        p95_ms: p.map(|v| v.1),
        p99_ms: p.map(|v| v.2),
        max_ms: p.map(|v| v.3),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::SchedulerState;
    use std::time::Duration;

    fn state() -> ApiState {
        ApiState {
            health: Arc::new(HealthState::new()),
            latency: Arc::new(LatencyStats::new().unwrap()),
            alert_log: AlertLog::new(),
            store: MarketStore::new(),
        }
    }

    #[tokio::test]
    async fn health_reports_state_and_progress() {
        let s = state();
        s.health.set_state(SchedulerState::Waiting);
        s.health.set_progress("scanned 3 markets".into());
        let Json(body) = get_health(State(s)).await;
        assert_eq!(body.state, "waiting");
        assert_eq!(body.progress.as_deref(), Some("scanned 3 markets"));
        assert!(body.last_scan_at_ms.is_none());
    }

    #[tokio::test]
    async fn summary_reports_counters() {
        let s = state();
        s.health.set_markets(4);
        s.health.record_scan(1, 2);
        s.health.add_alerts_sent(2);
        let Json(body) = get_stats_summary(State(s)).await.unwrap();
        assert_eq!(body.markets, 4);
        assert_eq!(body.scans_completed, 1);
        assert_eq!(body.matches_found, 2);
        assert_eq!(body.alerts_sent, 2);
    }

    #[tokio::test]
    async fn summary_errors_after_failed_boot() {
        let s = state();
        s.health.set_state(SchedulerState::Stopped);
        assert!(get_stats_summary(State(s)).await.is_err());
    }

    #[tokio::test]
    async fn latency_reports_percentiles() {
        let s = state();
        let Json(empty) = get_stats_latency(State(s.clone())).await;
        assert_eq!(empty.samples, 0);
        assert!(empty.p50_ms.is_none());

        s.latency.record(Duration::from_millis(120));
        let Json(body) = get_stats_latency(State(s)).await;
        assert_eq!(body.samples, 1);
        assert!(body.p50_ms.is_some());
    }
}
