use std::sync::Arc;

use indexmap::IndexMap;
use thiserror::Error;

use crate::{dto::record::MatchRecord, state::question::Question};

/// Per-player count of correct answers, keyed by player label.
pub type ScoreLedger = IndexMap<String, u32>;

/// How a match is played.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameMode {
    /// One local player advancing at their own pace, no channel involved.
    Single,
    /// Several peers sharing one channel; first correct answer advances everyone.
    Multi,
}

/// Errors raised by local mutations of a [`MatchSession`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatchError {
    /// The question sequence is exhausted; nothing left to answer.
    #[error("match `{match_id}` is already finished")]
    Finished {
        /// Identifier of the finished match.
        match_id: String,
    },
    /// A match cannot be played without questions.
    #[error("a match requires at least one question")]
    EmptySequence,
}

/// Result of a local correct answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvanceOutcome {
    /// Sequence number produced by this advance.
    pub sequence: u64,
    /// Ledger after the increment.
    pub ledger: ScoreLedger,
    /// Question now current, `None` once the sequence is exhausted.
    pub next_question: Option<Question>,
    /// Whether this advance reached the end of the sequence.
    pub finished: bool,
}

/// Result of applying an advance that originated elsewhere (or an echo).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The replica moved to the advertised sequence.
    Applied {
        /// New current sequence.
        sequence: u64,
        /// Whether the match is now finished.
        finished: bool,
    },
    /// The replica is already at or past this sequence; only the ledger was merged.
    Stale {
        /// Current sequence of the replica.
        current: u64,
        /// Sequence carried by the event.
        received: u64,
    },
    /// The event skips one or more advances; rejected until a resync.
    Gap {
        /// Sequence the replica expected next.
        expected: u64,
        /// Sequence carried by the event.
        received: u64,
    },
    /// The event points past the end of the question sequence.
    OutOfRange {
        /// Sequence carried by the event.
        received: u64,
        /// Number of questions in the match.
        len: u64,
    },
}

/// Full replica state exchanged with late joiners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchSnapshot {
    /// Number of advances applied so far.
    pub sequence: u64,
    /// Ledger at that sequence.
    pub ledger: ScoreLedger,
}

/// Local replica of one match: question pointer, score ledger and mode.
///
/// The advance counter doubles as the question pointer because every advance
/// moves exactly one position; `sequence == len` means finished.
#[derive(Debug, Clone)]
pub struct MatchSession {
    match_id: String,
    mode: GameMode,
    questions: Arc<[Question]>,
    sequence: u64,
    ledger: ScoreLedger,
}

impl MatchSession {
    /// Start a match at the first question with an empty ledger.
    pub fn new(
        match_id: impl Into<String>,
        mode: GameMode,
        questions: impl Into<Arc<[Question]>>,
    ) -> Result<Self, MatchError> {
        let questions = questions.into();
        if questions.is_empty() {
            return Err(MatchError::EmptySequence);
        }

        Ok(Self {
            match_id: match_id.into(),
            mode,
            questions,
            sequence: 0,
            ledger: ScoreLedger::new(),
        })
    }

    /// Identifier of the match (channel name in multi mode).
    pub fn match_id(&self) -> &str {
        &self.match_id
    }

    /// Mode this session was created with.
    pub fn mode(&self) -> GameMode {
        self.mode
    }

    /// Ordered questions of this match.
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    /// Number of advances applied so far.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Index of the current question (equal to `len` once finished).
    pub fn pointer(&self) -> usize {
        self.sequence as usize
    }

    /// Current score ledger.
    pub fn ledger(&self) -> &ScoreLedger {
        &self.ledger
    }

    /// Score of `player`, zero when absent.
    pub fn score_of(&self, player: &str) -> u32 {
        self.ledger.get(player).copied().unwrap_or(0)
    }

    /// Question at the current pointer, `None` once finished.
    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.pointer())
    }

    /// Whether the pointer has passed the last question.
    pub fn is_finished(&self) -> bool {
        self.pointer() >= self.questions.len()
    }

    /// Credit `player` with a correct answer and advance by exactly one question.
    pub fn record_correct_answer(&mut self, player: &str) -> Result<AdvanceOutcome, MatchError> {
        if self.is_finished() {
            return Err(MatchError::Finished {
                match_id: self.match_id.clone(),
            });
        }

        *self.ledger.entry(player.to_string()).or_insert(0) += 1;
        self.sequence += 1;

        Ok(AdvanceOutcome {
            sequence: self.sequence,
            ledger: self.ledger.clone(),
            next_question: self.current_question().cloned(),
            finished: self.is_finished(),
        })
    }

    /// Apply an advance event carrying the sequence it produces and the
    /// publisher's ledger.
    ///
    /// Applying the same event twice has no additional effect, which makes
    /// the publisher's own echo harmless.
    pub fn apply_advance(&mut self, sequence: u64, ledger: &ScoreLedger) -> ApplyOutcome {
        let len = self.questions.len() as u64;
        if sequence > len {
            return ApplyOutcome::OutOfRange {
                received: sequence,
                len,
            };
        }

        if sequence <= self.sequence {
            // Two players answering the same question concurrently both keep
            // their point; the pointer still moved only once.
            self.merge_ledger(ledger);
            return ApplyOutcome::Stale {
                current: self.sequence,
                received: sequence,
            };
        }

        let expected = self.sequence + 1;
        if sequence != expected {
            return ApplyOutcome::Gap {
                expected,
                received: sequence,
            };
        }

        self.merge_ledger(ledger);
        self.sequence = sequence;
        ApplyOutcome::Applied {
            sequence,
            finished: self.is_finished(),
        }
    }

    /// Merge a remote ledger, keeping the highest count per player.
    ///
    /// Returns whether any entry changed.
    pub fn merge_ledger(&mut self, ledger: &ScoreLedger) -> bool {
        let mut changed = false;
        for (player, &score) in ledger {
            let entry = self.ledger.entry(player.clone()).or_insert(0);
            if score > *entry {
                *entry = score;
                changed = true;
            }
        }
        changed
    }

    /// Capture the full replica state.
    pub fn snapshot(&self) -> MatchSnapshot {
        MatchSnapshot {
            sequence: self.sequence,
            ledger: self.ledger.clone(),
        }
    }

    /// Adopt a full-state snapshot from a peer.
    ///
    /// The ledger is always merged; the pointer only moves forward. Snapshots
    /// pointing past the end are ignored. Returns whether anything changed.
    pub fn apply_snapshot(&mut self, snapshot: &MatchSnapshot) -> bool {
        if snapshot.sequence > self.questions.len() as u64 {
            return false;
        }

        let mut changed = self.merge_ledger(&snapshot.ledger);
        if snapshot.sequence > self.sequence {
            self.sequence = snapshot.sequence;
            changed = true;
        }
        changed
    }

    /// Record to persist once the match is over.
    pub fn record(&self) -> MatchRecord {
        MatchRecord {
            match_id: self.match_id.clone(),
            scores: self.ledger.clone(),
            cards: self.questions.to_vec(),
        }
    }
}
