use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Health response returned by the `/healthcheck` route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// "ok" when the result store answers, "degraded" otherwise.
    pub status: String,
    /// Match channels currently relayed.
    pub channels: usize,
}

impl HealthResponse {
    /// The result store is reachable.
    pub fn ok(channels: usize) -> Self {
        Self {
            status: "ok".to_string(),
            channels,
        }
    }

    /// The relay keeps working but match records cannot be stored.
    pub fn degraded(channels: usize) -> Self {
        Self {
            status: "degraded".to_string(),
            channels,
        }
    }
}
