use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::{
    dao::match_store::SaveOutcome,
    dto::validation::validate_match_id,
    state::{match_session::ScoreLedger, question::Question},
};

/// Final result of a match, as submitted to the result store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MatchRecord {
    /// Channel name the match was played on.
    pub match_id: String,
    /// Final score per player label.
    #[schema(value_type = Object)]
    pub scores: ScoreLedger,
    /// Question sequence that was played, in order.
    pub cards: Vec<Question>,
}

impl Validate for MatchRecord {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Err(e) = validate_match_id(&self.match_id) {
            errors.add("match_id", e);
        }

        if self.cards.is_empty() {
            let mut err = ValidationError::new("cards_empty");
            err.message = Some("A match record must contain at least one card".into());
            errors.add("cards", err);
        }

        let mut seen = HashSet::new();
        if let Some(duplicate) = self.cards.iter().find(|card| !seen.insert(card.id)) {
            let mut err = ValidationError::new("cards_duplicate_id");
            err.message = Some(format!("Duplicate card id {}", duplicate.id).into());
            errors.add("cards", err);
        }

        if self.scores.keys().any(|player| player.trim().is_empty()) {
            let mut err = ValidationError::new("scores_empty_player");
            err.message = Some("Player labels must not be empty".into());
            errors.add("scores", err);
        }

        // A player scores at most once per card.
        if self
            .scores
            .values()
            .any(|&score| score as usize > self.cards.len())
        {
            let mut err = ValidationError::new("scores_out_of_range");
            err.message = Some("Scores exceed the number of cards played".into());
            errors.add("scores", err);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Acknowledgement returned once a match record is stored.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SaveMatchResponse {
    /// Human-readable confirmation.
    pub message: String,
    /// Whether the submission created the record, raised scores in it or changed nothing.
    pub outcome: SaveOutcomeDto,
}

/// Wire form of what a submission did to the stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum SaveOutcomeDto {
    /// First record for the match.
    Created,
    /// Merged into the existing record.
    Merged,
    /// Already covered by the existing record.
    Unchanged,
}

impl From<SaveOutcome> for SaveOutcomeDto {
    fn from(value: SaveOutcome) -> Self {
        match value {
            SaveOutcome::Created => Self::Created,
            SaveOutcome::Merged => Self::Merged,
            SaveOutcome::Unchanged => Self::Unchanged,
        }
    }
}

impl SaveMatchResponse {
    /// Confirmation for `match_id`.
    pub fn saved(match_id: &str, outcome: SaveOutcome) -> Self {
        let message = match outcome {
            SaveOutcome::Created => format!("Match `{match_id}` saved"),
            SaveOutcome::Merged => format!("Match `{match_id}` updated with new scores"),
            SaveOutcome::Unchanged => format!("Match `{match_id}` already up to date"),
        };
        Self {
            message,
            outcome: outcome.into(),
        }
    }
}
