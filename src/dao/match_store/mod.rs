#[cfg(feature = "couch-store")]
pub mod couchdb;
pub mod memory;

use crate::dao::models::MatchEntity;
use crate::dao::storage::StorageResult;
use futures::future::BoxFuture;

/// What a submission did to the stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// First record for this match.
    Created,
    /// Merged into the existing record; at least one score went up.
    Merged,
    /// The stored record already covered every submitted score.
    Unchanged,
}

/// Abstraction over the store of finished matches.
///
/// One record per match id. Later submissions for the same match are merged
/// into it keeping the highest score per player, so every finisher converges
/// on the same record whatever order their submissions arrive in.
pub trait MatchStore: Send + Sync {
    /// Create or merge the record of a finished match; fails with
    /// `StorageError::Conflict` when the id is stored with other questions.
    fn save_match(&self, entity: MatchEntity) -> BoxFuture<'static, StorageResult<SaveOutcome>>;
    /// Fetch the record stored for `match_id`, if any.
    fn find_match(&self, match_id: String) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>>;
    /// Cheap round trip proving the backend answers.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Re-establish whatever the backend needs after a failed health check.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
