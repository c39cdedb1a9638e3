//! Messages exchanged by the participants of one match over its channel.
//!
//! Every frame is a JSON object `{ "event": <kind>, "payload": {...} }`.
//! Advance payloads carry the sequence number they produce and the target
//! state rather than a delta, so duplicates and echoes can be detected and
//! ignored.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state::{
    match_session::{MatchSnapshot, ScoreLedger},
    question::Question,
};

/// Events published on a match channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "camelCase")]
pub enum MatchEvent {
    /// Move every replica to the given question.
    NewCard(NewCardPayload),
    /// Propagate a ledger on its own.
    ScoreUpdate(ScoreUpdatePayload),
    /// First correct answer for a question: advance plus updated ledger.
    CorrectAnswer(CorrectAnswerPayload),
    /// A participant asks peers for the full match state.
    SyncRequest(SyncRequestPayload),
    /// Full match state answering a [`MatchEvent::SyncRequest`].
    SyncState(SyncStatePayload),
}

/// Payload of [`MatchEvent::NewCard`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCardPayload {
    /// Sequence number produced by this advance.
    pub seq: u64,
    /// Question now current; `null` once the match is finished.
    pub card: Option<Question>,
}

/// Payload of [`MatchEvent::ScoreUpdate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreUpdatePayload {
    /// Publisher's ledger.
    pub scores: ScoreLedger,
}

/// Payload of [`MatchEvent::CorrectAnswer`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrectAnswerPayload {
    /// Sequence number produced by this advance.
    pub seq: u64,
    /// Label of the player who answered.
    pub player_id: String,
    /// Ledger after crediting the player.
    pub new_scores: ScoreLedger,
    /// Question now current; `null` once the match is finished.
    pub next_card: Option<Question>,
}

/// Payload of [`MatchEvent::SyncRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequestPayload {
    /// Label of the requesting player.
    pub player_id: String,
    /// Per-join identifier of the requesting client, used to spot our own echo.
    pub instance: Uuid,
}

/// Payload of [`MatchEvent::SyncState`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatePayload {
    /// Number of advances applied by the responder.
    pub seq: u64,
    /// Responder's ledger.
    pub scores: ScoreLedger,
}

impl MatchEvent {
    /// Parse a frame received from the channel.
    pub fn from_json_str(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Encode the event as a channel frame.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Wire name of the event kind, for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::NewCard(_) => "newCard",
            Self::ScoreUpdate(_) => "scoreUpdate",
            Self::CorrectAnswer(_) => "correctAnswer",
            Self::SyncRequest(_) => "syncRequest",
            Self::SyncState(_) => "syncState",
        }
    }
}

impl From<SyncStatePayload> for MatchSnapshot {
    fn from(value: SyncStatePayload) -> Self {
        Self {
            sequence: value.seq,
            ledger: value.scores,
        }
    }
}

impl From<MatchSnapshot> for SyncStatePayload {
    fn from(value: MatchSnapshot) -> Self {
        Self {
            seq: value.sequence,
            scores: value.ledger,
        }
    }
}

/// Control frames sent by the relay itself, never by peers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "camelCase")]
pub enum RelayNotice {
    /// The socket is registered on the channel; frames published from now on
    /// will be delivered to it.
    Subscribed {
        /// Channel the socket joined.
        channel: String,
    },
}

impl RelayNotice {
    /// Parse a control frame.
    pub fn from_json_str(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Encode the control frame.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn correct_answer_uses_event_payload_envelope() {
        let event = MatchEvent::CorrectAnswer(CorrectAnswerPayload {
            seq: 2,
            player_id: "player-7".into(),
            new_scores: [("player-7".to_string(), 2)].into_iter().collect(),
            next_card: Some(Question::new(3, "Largest planet?", "Jupiter")),
        });

        let value: serde_json::Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "event": "correctAnswer",
                "payload": {
                    "seq": 2,
                    "playerId": "player-7",
                    "newScores": { "player-7": 2 },
                    "nextCard": { "qId": 3, "question": "Largest planet?", "answer": "Jupiter" }
                }
            })
        );
    }

    #[test]
    fn terminal_new_card_carries_null_card() {
        let event = MatchEvent::from_json_str(r#"{"event":"newCard","payload":{"seq":5,"card":null}}"#)
            .unwrap();
        assert_eq!(
            event,
            MatchEvent::NewCard(NewCardPayload { seq: 5, card: None })
        );
        assert_eq!(event.name(), "newCard");
    }

    #[test]
    fn unknown_events_are_rejected() {
        assert!(MatchEvent::from_json_str(r#"{"event":"presence","payload":{}}"#).is_err());
        assert!(MatchEvent::from_json_str("not json").is_err());
    }

    #[test]
    fn relay_notice_is_distinct_from_match_events() {
        let notice = RelayNotice::Subscribed {
            channel: "match-1".into(),
        }
        .to_json()
        .unwrap();
        assert!(MatchEvent::from_json_str(&notice).is_err());
        assert_eq!(
            RelayNotice::from_json_str(&notice).unwrap(),
            RelayNotice::Subscribed {
                channel: "match-1".into()
            }
        );
    }
}
