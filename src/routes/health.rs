use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::app_state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub checks: HealthChecks,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthChecks {
    pub queue: ComponentHealth,
    pub storage: ComponentHealth,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: String,
    pub latency_ms: Option<u64>,
}

impl ComponentHealth {
    fn from_probe(ok: bool, start: std::time::Instant) -> Self {
        if ok {
            Self {
                status: "ok".to_string(),
                latency_ms: Some(start.elapsed().as_millis() as u64),
            }
        } else {
            Self {
                status: "error".to_string(),
                latency_ms: None,
            }
        }
    }

    fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

/// GET /health — broker reachability and upload directory presence.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let queue_start = std::time::Instant::now();
    let queue_ok = match state.pipeline.announcer().health_check().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Queue health check failed");
            false
        }
    };
    let queue = ComponentHealth::from_probe(queue_ok, queue_start);

    let storage_start = std::time::Instant::now();
    let storage_ok = state.pipeline.store().health_check().await;
    let storage = ComponentHealth::from_probe(storage_ok, storage_start);

    let all_healthy = queue.is_ok() && storage.is_ok();
    let status_code = if all_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = HealthResponse {
        status: (if all_healthy { "ok" } else { "degraded" }).to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks: HealthChecks { queue, storage },
    };

    (status_code, Json(response))
}
