//! Player-side driver of a match: judges answers, keeps the replica in step
//! with its channel and submits the final record.

use std::sync::Arc;

use rand::Rng;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    client::{
        channel::{MatchChannel, PubSubTransport},
        error::{ClientError, PersistenceError, PublishError},
        persistence::ResultSink,
    },
    dto::wire::{CorrectAnswerPayload, MatchEvent, SyncRequestPayload, SyncStatePayload},
    state::{
        match_session::{ApplyOutcome, GameMode, MatchSession, ScoreLedger},
        question::Question,
    },
};

/// Label of the only player of a single-player match.
pub const LOCAL_PLAYER: &str = "local-player";

/// Ephemeral label for a multiplayer participant, one of 2^24 values.
pub fn generate_player_label() -> String {
    format!("player-{:06x}", rand::rng().random_range(0..0x100_0000u32))
}

/// Channel name for a new multiplayer match.
pub fn generate_match_id() -> String {
    format!("match-{:06}", rand::rng().random_range(0..1_000_000))
}

/// Identifier for a single-player match, which never touches a channel.
pub fn generate_solo_match_id() -> String {
    format!("solo-{}", Uuid::new_v4().simple())
}

/// How a submitted answer was judged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The answer matched and the match advanced.
    Correct,
    /// The answer did not match; nothing changed.
    Wrong,
    /// The match is over, there is nothing to answer.
    NoQuestion,
}

/// What the player-facing layer renders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchView {
    /// Match identifier.
    pub match_id: String,
    /// Single or multiplayer.
    pub mode: GameMode,
    /// Label of the local player.
    pub player: String,
    /// Question to display, `None` once the match is over.
    pub question: Option<Question>,
    /// One-based position of the current question.
    pub question_number: usize,
    /// Number of questions in the match.
    pub total_questions: usize,
    /// Score of the local player.
    pub score: u32,
    /// Every known score.
    pub scoreboard: ScoreLedger,
    /// Whether the game-over state is reached.
    pub finished: bool,
}

/// Result of [`MatchClient::submit_answer`].
#[derive(Debug)]
pub struct AnswerOutcome {
    /// How the answer was judged.
    pub verdict: Verdict,
    /// State after the answer.
    pub view: MatchView,
    /// Outcome of broadcasting the advance, multiplayer only.
    pub publish: Option<Result<(), PublishError>>,
    /// Outcome of submitting the final record, when this answer finished the match.
    pub persistence: Option<Result<(), PersistenceError>>,
}

/// Effect of one channel event on the local replica.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventEffect {
    /// The replica moved to the next question.
    Advanced {
        /// New sequence.
        sequence: u64,
        /// Whether the match is over.
        finished: bool,
    },
    /// Already applied (own echo or duplicate); only scores were merged.
    Stale {
        /// Local sequence.
        current: u64,
        /// Sequence carried by the event.
        received: u64,
    },
    /// Events were missed; a full state was requested from peers.
    ResyncRequested {
        /// Sequence the replica expected.
        expected: u64,
        /// Sequence carried by the event.
        received: u64,
    },
    /// The event pointed past the last question and was dropped.
    Rejected {
        /// Sequence carried by the event.
        received: u64,
        /// Number of questions.
        len: u64,
    },
    /// A score-only update was merged.
    ScoresMerged {
        /// Whether any score changed.
        changed: bool,
    },
    /// A peer's full state was adopted.
    SnapshotApplied {
        /// Whether anything changed.
        changed: bool,
    },
    /// A peer asked for the full state and got ours.
    SyncAnswered {
        /// Label of the peer.
        requester: String,
    },
    /// Our own request came back.
    Ignored,
}

/// Drives one match for one local player, in either mode.
pub struct MatchClient {
    session: MatchSession,
    player: String,
    /// Distinguishes our own sync requests from a peer that drew the same label.
    instance: Uuid,
    channel: Option<MatchChannel>,
    sink: Arc<dyn ResultSink>,
    submitted: bool,
}

impl MatchClient {
    /// Start a single-player match over `questions`.
    pub fn single(
        questions: impl Into<Arc<[Question]>>,
        sink: Arc<dyn ResultSink>,
    ) -> Result<Self, ClientError> {
        let session = MatchSession::new(generate_solo_match_id(), GameMode::Single, questions)?;
        info!(match_id = %session.match_id(), "single-player match started");

        Ok(Self {
            session,
            player: LOCAL_PLAYER.to_string(),
            instance: Uuid::new_v4(),
            channel: None,
            sink,
            submitted: false,
        })
    }

    /// Join the multiplayer match `match_id`.
    ///
    /// The subscription completes before the client is returned. Peers already
    /// playing are asked for their state right away.
    pub async fn join_multi(
        match_id: &str,
        questions: impl Into<Arc<[Question]>>,
        transport: Arc<dyn PubSubTransport>,
        sink: Arc<dyn ResultSink>,
    ) -> Result<Self, ClientError> {
        Self::join_multi_as(match_id, generate_player_label(), questions, transport, sink).await
    }

    /// Join the multiplayer match `match_id` under a chosen label.
    pub async fn join_multi_as(
        match_id: &str,
        player: impl Into<String>,
        questions: impl Into<Arc<[Question]>>,
        transport: Arc<dyn PubSubTransport>,
        sink: Arc<dyn ResultSink>,
    ) -> Result<Self, ClientError> {
        let session = MatchSession::new(match_id, GameMode::Multi, questions)?;
        let channel = MatchChannel::join(transport, match_id).await?;
        let player = player.into();
        let instance = Uuid::new_v4();

        let request = MatchEvent::SyncRequest(SyncRequestPayload {
            player_id: player.clone(),
            instance,
        });
        if let Err(err) = channel.publish(&request).await {
            warn!(match_id, player = %player, error = %err, "failed to request match state");
            channel.leave().await;
            return Err(err.into());
        }

        info!(match_id, player = %player, "joined multiplayer match");
        Ok(Self {
            session,
            player,
            instance,
            channel: Some(channel),
            sink,
            submitted: false,
        })
    }

    /// Label of the local player.
    pub fn player(&self) -> &str {
        &self.player
    }

    /// Local replica of the match.
    pub fn session(&self) -> &MatchSession {
        &self.session
    }

    /// Snapshot for rendering.
    pub fn view(&self) -> MatchView {
        let total_questions = self.session.questions().len();
        MatchView {
            match_id: self.session.match_id().to_string(),
            mode: self.session.mode(),
            player: self.player.clone(),
            question: self.session.current_question().cloned(),
            question_number: (self.session.pointer() + 1).min(total_questions),
            total_questions,
            score: self.session.score_of(&self.player),
            scoreboard: self.session.ledger().clone(),
            finished: self.session.is_finished(),
        }
    }

    /// Judge `answer` against the current question.
    ///
    /// A correct answer advances the local replica immediately. In multiplayer
    /// the advance is then broadcast; a failed publish is reported but the
    /// local advance stands. When this answer ends the match, the final record
    /// is submitted.
    pub async fn submit_answer(&mut self, answer: &str) -> AnswerOutcome {
        let accepted = match self.session.current_question() {
            Some(question) => question.accepts(answer),
            None => return self.outcome(Verdict::NoQuestion, None, None),
        };
        if !accepted {
            debug!(match_id = %self.session.match_id(), player = %self.player, "wrong answer");
            return self.outcome(Verdict::Wrong, None, None);
        }

        let advance = match self.session.record_correct_answer(&self.player) {
            Ok(advance) => advance,
            Err(err) => {
                warn!(error = %err, "correct answer on a finished match");
                return self.outcome(Verdict::NoQuestion, None, None);
            }
        };
        info!(
            match_id = %self.session.match_id(),
            player = %self.player,
            seq = advance.sequence,
            finished = advance.finished,
            "correct answer"
        );

        let publish = match &self.channel {
            Some(channel) => {
                let event = MatchEvent::CorrectAnswer(CorrectAnswerPayload {
                    seq: advance.sequence,
                    player_id: self.player.clone(),
                    new_scores: advance.ledger,
                    next_card: advance.next_question,
                });
                let result = channel.publish(&event).await;
                if let Err(err) = &result {
                    warn!(
                        match_id = %self.session.match_id(),
                        seq = advance.sequence,
                        error = %err,
                        "failed to broadcast advance; local state kept"
                    );
                }
                Some(result)
            }
            None => None,
        };

        let persistence = if advance.finished && !self.submitted {
            Some(self.submit_record().await)
        } else {
            None
        };

        self.outcome(Verdict::Correct, publish, persistence)
    }

    /// Wait for the next channel event and apply it.
    pub async fn process_next_event(&mut self) -> Result<EventEffect, ClientError> {
        let channel = self.channel.as_mut().ok_or(ClientError::NoChannel)?;
        let event = channel.next_event().await?;
        self.handle_event(event).await
    }

    /// Apply every event already queued on the channel without waiting.
    pub async fn drain_events(&mut self) -> Result<Vec<EventEffect>, ClientError> {
        let mut effects = Vec::new();
        loop {
            let channel = self.channel.as_mut().ok_or(ClientError::NoChannel)?;
            let Some(event) = channel.try_next_event()? else {
                break;
            };
            effects.push(self.handle_event(event).await?);
        }
        Ok(effects)
    }

    /// Leave the match, releasing the channel.
    pub async fn leave(self) {
        if let Some(channel) = self.channel {
            channel.leave().await;
        }
        info!(match_id = %self.session.match_id(), player = %self.player, "left match");
    }

    async fn handle_event(&mut self, event: MatchEvent) -> Result<EventEffect, ClientError> {
        let submitted_ledger = self.submitted.then(|| self.session.ledger().clone());
        let effect = self.apply_event(event).await?;

        // A concurrent answer credited after our record went out: send the
        // amended ledger, the store keeps the highest score per player.
        if let Some(submitted_ledger) = submitted_ledger {
            if &submitted_ledger != self.session.ledger() {
                let _ = self.submit_record().await;
            }
        }
        Ok(effect)
    }

    async fn apply_event(&mut self, event: MatchEvent) -> Result<EventEffect, ClientError> {
        debug!(match_id = %self.session.match_id(), event = event.name(), "channel event");
        match event {
            MatchEvent::CorrectAnswer(payload) => {
                self.handle_advance(payload.seq, &payload.new_scores).await
            }
            MatchEvent::NewCard(payload) => self.handle_advance(payload.seq, &ScoreLedger::new()).await,
            MatchEvent::ScoreUpdate(payload) => Ok(EventEffect::ScoresMerged {
                changed: self.session.merge_ledger(&payload.scores),
            }),
            MatchEvent::SyncRequest(payload) => {
                if payload.instance == self.instance {
                    return Ok(EventEffect::Ignored);
                }
                let reply = MatchEvent::SyncState(SyncStatePayload::from(self.session.snapshot()));
                self.publish(&reply).await?;
                Ok(EventEffect::SyncAnswered {
                    requester: payload.player_id,
                })
            }
            MatchEvent::SyncState(payload) => Ok(EventEffect::SnapshotApplied {
                changed: self.session.apply_snapshot(&payload.into()),
            }),
        }
    }

    async fn handle_advance(
        &mut self,
        sequence: u64,
        ledger: &ScoreLedger,
    ) -> Result<EventEffect, ClientError> {
        match self.session.apply_advance(sequence, ledger) {
            ApplyOutcome::Applied { sequence, finished } => {
                debug!(match_id = %self.session.match_id(), seq = sequence, finished, "advance applied");
                Ok(EventEffect::Advanced { sequence, finished })
            }
            ApplyOutcome::Stale { current, received } => Ok(EventEffect::Stale { current, received }),
            ApplyOutcome::Gap { expected, received } => {
                warn!(
                    match_id = %self.session.match_id(),
                    expected,
                    received,
                    "missed advances; requesting match state"
                );
                let request = MatchEvent::SyncRequest(SyncRequestPayload {
                    player_id: self.player.clone(),
                    instance: self.instance,
                });
                self.publish(&request).await?;
                Ok(EventEffect::ResyncRequested { expected, received })
            }
            ApplyOutcome::OutOfRange { received, len } => {
                warn!(match_id = %self.session.match_id(), received, len, "dropping advance past the end");
                Ok(EventEffect::Rejected { received, len })
            }
        }
    }

    async fn publish(&self, event: &MatchEvent) -> Result<(), ClientError> {
        let channel = self.channel.as_ref().ok_or(ClientError::NoChannel)?;
        channel.publish(event).await.map_err(Into::into)
    }

    /// Submit the final record. The first submission happens when our own
    /// answer ends the match; later ones only carry scores learnt since.
    async fn submit_record(&mut self) -> Result<(), PersistenceError> {
        let amendment = self.submitted;
        self.submitted = true;

        let record = self.session.record();
        let match_id = record.match_id.clone();
        let result = self.sink.persist(record).await;
        match &result {
            Ok(()) => info!(match_id = %match_id, amendment, "final scores persisted"),
            Err(err) => warn!(
                match_id = %match_id,
                amendment,
                error = %err,
                "failed to persist final scores; game over state kept"
            ),
        }
        result
    }

    fn outcome(
        &self,
        verdict: Verdict,
        publish: Option<Result<(), PublishError>>,
        persistence: Option<Result<(), PersistenceError>>,
    ) -> AnswerOutcome {
        AnswerOutcome {
            verdict,
            view: self.view(),
            publish,
            persistence,
        }
    }
}
