use serde::{Deserialize, Serialize};
use std::time::SystemTime;

use crate::{
    dto::record::MatchRecord,
    state::{match_session::ScoreLedger, question::Question},
};

/// Finished match as stored by the result store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatchEntity {
    /// Channel name the match was played on; unique across the store.
    pub match_id: String,
    /// Final score per player label.
    pub scores: ScoreLedger,
    /// Question sequence that was played, in order.
    pub cards: Vec<CardEntity>,
    /// When the record reached the store.
    pub saved_at: SystemTime,
}

/// Question snapshot stored with a match.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CardEntity {
    /// Identifier of the question in the bank.
    pub q_id: u32,
    /// Prompt shown to players.
    pub question: String,
    /// Accepted answer.
    pub answer: String,
}

impl From<Question> for CardEntity {
    fn from(value: Question) -> Self {
        Self {
            q_id: value.id,
            question: value.prompt,
            answer: value.expected_answer,
        }
    }
}

impl From<CardEntity> for Question {
    fn from(value: CardEntity) -> Self {
        Self {
            id: value.q_id,
            prompt: value.question,
            expected_answer: value.answer,
        }
    }
}

impl MatchEntity {
    /// Whether `other` describes the same match: same id and same question sequence.
    pub fn same_match(&self, other: &MatchEntity) -> bool {
        self.match_id == other.match_id && self.cards == other.cards
    }

    /// Merge another submission of this match, keeping the highest score per player.
    ///
    /// Returns whether any score changed; `saved_at` is refreshed only then.
    pub fn merge_scores(&mut self, other: &MatchEntity) -> bool {
        let mut changed = false;
        for (player, &score) in &other.scores {
            let entry = self.scores.entry(player.clone()).or_insert(0);
            if score > *entry {
                *entry = score;
                changed = true;
            }
        }
        if changed {
            self.saved_at = other.saved_at;
        }
        changed
    }

    /// Build the entity for a record received now.
    pub fn from_record(record: MatchRecord) -> Self {
        Self {
            match_id: record.match_id,
            scores: record.scores,
            cards: record.cards.into_iter().map(Into::into).collect(),
            saved_at: SystemTime::now(),
        }
    }
}

impl From<MatchEntity> for MatchRecord {
    fn from(value: MatchEntity) -> Self {
        Self {
            match_id: value.match_id,
            scores: value.scores,
            cards: value.cards.into_iter().map(Into::into).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(scores: &[(&str, u32)]) -> MatchEntity {
        MatchEntity {
            match_id: "match-5".into(),
            scores: scores
                .iter()
                .map(|(player, score)| (player.to_string(), *score))
                .collect(),
            cards: vec![CardEntity {
                q_id: 1,
                question: "Capital of France?".into(),
                answer: "Paris".into(),
            }],
            saved_at: SystemTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn merge_keeps_the_highest_score_per_player() {
        let mut stored = entity(&[("player-1", 1)]);
        let later = MatchEntity {
            saved_at: SystemTime::now(),
            ..entity(&[("player-1", 0), ("player-2", 1)])
        };

        assert!(stored.merge_scores(&later));
        assert_eq!(stored.scores.get("player-1"), Some(&1));
        assert_eq!(stored.scores.get("player-2"), Some(&1));
        assert_eq!(stored.saved_at, later.saved_at);

        assert!(!stored.merge_scores(&entity(&[("player-2", 1)])));
        assert_eq!(stored.saved_at, later.saved_at);
    }

    #[test]
    fn different_cards_are_a_different_match() {
        let stored = entity(&[]);
        let mut other = entity(&[]);
        other.cards[0].answer = "Lyon".into();
        assert!(!stored.same_match(&other));
        assert!(stored.same_match(&entity(&[("player-1", 1)])));
    }
}
