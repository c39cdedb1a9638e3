//! Process-local result store used when no CouchDB is configured.

use std::sync::Arc;

use dashmap::{DashMap, mapref::entry::Entry};
use futures::future::BoxFuture;

use crate::dao::{
    match_store::{MatchStore, SaveOutcome},
    models::MatchEntity,
    storage::{StorageError, StorageResult},
};

/// Result store keeping matches in memory for the lifetime of the process.
#[derive(Clone, Default)]
pub struct MemoryMatchStore {
    matches: Arc<DashMap<String, MatchEntity>>,
}

impl MemoryMatchStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored matches.
    pub fn len(&self) -> usize {
        self.matches.len()
    }

    /// Whether no match has been stored yet.
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }
}

impl MatchStore for MemoryMatchStore {
    fn save_match(&self, entity: MatchEntity) -> BoxFuture<'static, StorageResult<SaveOutcome>> {
        let store = self.clone();
        Box::pin(async move {
            match store.matches.entry(entity.match_id.clone()) {
                Entry::Occupied(mut existing) => {
                    if !existing.get().same_match(&entity) {
                        return Err(StorageError::Conflict {
                            match_id: existing.key().clone(),
                        });
                    }
                    if existing.get_mut().merge_scores(&entity) {
                        Ok(SaveOutcome::Merged)
                    } else {
                        Ok(SaveOutcome::Unchanged)
                    }
                }
                Entry::Vacant(slot) => {
                    slot.insert(entity);
                    Ok(SaveOutcome::Created)
                }
            }
        })
    }

    fn find_match(&self, match_id: String) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.matches.get(&match_id).map(|entry| entry.clone())) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;
    use crate::dao::models::CardEntity;

    fn entity(match_id: &str, player: &str, score: u32) -> MatchEntity {
        MatchEntity {
            match_id: match_id.into(),
            scores: [(player.to_string(), score)].into_iter().collect(),
            cards: vec![CardEntity {
                q_id: 1,
                question: "Capital of France?".into(),
                answer: "Paris".into(),
            }],
            saved_at: SystemTime::now(),
        }
    }

    #[tokio::test]
    async fn concurrent_finishers_are_merged_into_one_record() {
        let store = MemoryMatchStore::new();
        let first = store.save_match(entity("match-1", "player-1", 1)).await.unwrap();
        let second = store.save_match(entity("match-1", "player-2", 1)).await.unwrap();
        let again = store.save_match(entity("match-1", "player-2", 1)).await.unwrap();

        assert_eq!(first, SaveOutcome::Created);
        assert_eq!(second, SaveOutcome::Merged);
        assert_eq!(again, SaveOutcome::Unchanged);

        let stored = store.find_match("match-1".into()).await.unwrap().unwrap();
        assert_eq!(stored.scores.get("player-1"), Some(&1));
        assert_eq!(stored.scores.get("player-2"), Some(&1));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn scores_never_go_down() {
        let store = MemoryMatchStore::new();
        store.save_match(entity("match-2", "player-1", 3)).await.unwrap();
        let outcome = store.save_match(entity("match-2", "player-1", 2)).await.unwrap();

        assert_eq!(outcome, SaveOutcome::Unchanged);
        let stored = store.find_match("match-2".into()).await.unwrap().unwrap();
        assert_eq!(stored.scores.get("player-1"), Some(&3));
    }

    #[tokio::test]
    async fn same_id_with_other_questions_is_a_conflict() {
        let store = MemoryMatchStore::new();
        store.save_match(entity("match-3", "player-1", 1)).await.unwrap();

        let mut other = entity("match-3", "player-2", 1);
        other.cards[0].answer = "Lyon".into();
        let err = store.save_match(other).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict { match_id } if match_id == "match-3"));

        let stored = store.find_match("match-3".into()).await.unwrap().unwrap();
        assert_eq!(stored.scores.get("player-2"), None);
    }

    #[tokio::test]
    async fn unknown_match_is_not_found() {
        let store = MemoryMatchStore::new();
        assert!(store.find_match("missing".into()).await.unwrap().is_none());
        assert!(store.is_empty());
    }
}
