use tracing::{info, warn};
use validator::Validate;

use crate::{
    dao::models::MatchEntity,
    dto::{
        format_system_time,
        record::{MatchRecord, SaveMatchResponse},
        validation::validate_match_id,
    },
    error::ServiceError,
    state::SharedState,
};

/// Validate and store the final record of a match.
///
/// A later submission for the same match is merged into the stored record,
/// keeping the highest score per player, so concurrent finishers end up with
/// one record. A submission with other questions under the same id fails
/// with [`ServiceError::Conflict`].
pub async fn save_match(
    state: &SharedState,
    record: MatchRecord,
) -> Result<SaveMatchResponse, ServiceError> {
    record.validate()?;
    let store = state.require_match_store().await?;

    let match_id = record.match_id.clone();
    let entity = MatchEntity::from_record(record);
    let saved_at = format_system_time(entity.saved_at);
    match store.save_match(entity).await {
        Ok(outcome) => {
            info!(match_id = %match_id, saved_at = %saved_at, ?outcome, "match record saved");
            Ok(SaveMatchResponse::saved(&match_id, outcome))
        }
        Err(err) => {
            warn!(match_id = %match_id, error = %err, "failed to save match record");
            Err(err.into())
        }
    }
}

/// Fetch a stored match record.
pub async fn find_match(state: &SharedState, match_id: String) -> Result<MatchRecord, ServiceError> {
    validate_match_id(&match_id)
        .map_err(|err| ServiceError::InvalidInput(format!("invalid match id: {err}")))?;
    let store = state.require_match_store().await?;

    match store.find_match(match_id.clone()).await? {
        Some(entity) => Ok(entity.into()),
        None => Err(ServiceError::NotFound(format!("match `{match_id}` not found"))),
    }
}
