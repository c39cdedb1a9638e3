use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report whether the result store is reachable, logging connectivity issues.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let channels = state.channels().channel_count();

    match state.require_match_store().await {
        Ok(store) => {
            if let Err(err) = store.health_check().await {
                warn!(error = %err, "result store health check failed");
                return HealthResponse::degraded(channels);
            }
        }
        Err(_) => warn!("result store unavailable (degraded mode)"),
    }

    if state.is_degraded() {
        HealthResponse::degraded(channels)
    } else {
        HealthResponse::ok(channels)
    }
}
