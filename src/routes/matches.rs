use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use axum_valid::Valid;

use crate::{
    dto::record::{MatchRecord, SaveMatchResponse},
    error::AppError,
    services::result_service,
    state::SharedState,
};

/// Result store endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/api/saveMatch", post(save_match))
        .route("/api/matches/{match_id}", get(get_match))
}

/// Persist the final record of a finished match, merging with any record already stored.
#[utoipa::path(
    post,
    path = "/api/saveMatch",
    tag = "matches",
    request_body = MatchRecord,
    responses(
        (status = 200, description = "Match record created or merged", body = SaveMatchResponse),
        (status = 400, description = "Invalid match record"),
        (status = 409, description = "The match id is recorded with other questions"),
        (status = 503, description = "Result store unavailable")
    )
)]
pub async fn save_match(
    State(state): State<SharedState>,
    Valid(Json(record)): Valid<Json<MatchRecord>>,
) -> Result<Json<SaveMatchResponse>, AppError> {
    Ok(Json(result_service::save_match(&state, record).await?))
}

/// Fetch a stored match record.
#[utoipa::path(
    get,
    path = "/api/matches/{match_id}",
    tag = "matches",
    params(("match_id" = String, Path, description = "Match identifier")),
    responses(
        (status = 200, description = "Stored match record", body = MatchRecord),
        (status = 404, description = "No record for this match"),
        (status = 503, description = "Result store unavailable")
    )
)]
pub async fn get_match(
    State(state): State<SharedState>,
    Path(match_id): Path<String>,
) -> Result<Json<MatchRecord>, AppError> {
    Ok(Json(result_service::find_match(&state, match_id).await?))
}
