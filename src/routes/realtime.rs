use axum::{
    Router,
    extract::{Path, State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};

use crate::{
    dto::validation::validate_match_id, error::AppError, services::relay_service,
    state::SharedState,
};

#[utoipa::path(
    get,
    path = "/realtime/{match_id}",
    tag = "realtime",
    params(("match_id" = String, Path, description = "Channel named after the match")),
    responses(
        (status = 101, description = "Switching protocols to WebSocket"),
        (status = 400, description = "Invalid match id")
    )
)]
/// Upgrade the HTTP connection into a subscription on a match channel.
pub async fn realtime_handler(
    State(state): State<SharedState>,
    Path(match_id): Path<String>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, AppError> {
    validate_match_id(&match_id)
        .map_err(|err| AppError::BadRequest(format!("invalid match id: {err}")))?;
    Ok(ws.on_upgrade(move |socket| relay_service::handle_socket(state, match_id, socket)))
}

/// Configure the relay endpoint.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/realtime/{match_id}", get(realtime_handler))
}
