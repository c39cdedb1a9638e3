use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the Flashcard Frenzy server.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::matches::save_match,
        crate::routes::matches::get_match,
        crate::routes::realtime::realtime_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::record::MatchRecord,
            crate::dto::record::SaveMatchResponse,
            crate::dto::record::SaveOutcomeDto,
            crate::state::question::Question,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "matches", description = "Insert-only store of finished match records"),
        (name = "realtime", description = "WebSocket relay for match channels"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documents_the_result_store_routes() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/saveMatch"));
        assert!(doc.paths.paths.contains_key("/api/matches/{match_id}"));
        assert!(doc.paths.paths.contains_key("/realtime/{match_id}"));
    }
}
