//! Match synchronization scenarios played over the in-process broker.

use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use reqwest::StatusCode;

use flashcard_frenzy::{
    client::{
        ClientError, EventEffect, LocalBroker, MatchClient, PersistenceError, PubSubTransport,
        PublishError, ResultSink, SubscriptionError, Verdict, controller::LOCAL_PLAYER,
    },
    dao::{
        match_store::{MatchStore, memory::MemoryMatchStore},
        models::MatchEntity,
        storage::StorageError,
    },
    dto::{
        record::MatchRecord,
        wire::{CorrectAnswerPayload, MatchEvent},
    },
    state::question::Question,
};

#[derive(Default)]
struct RecordingSink {
    records: Mutex<Vec<MatchRecord>>,
}

impl RecordingSink {
    fn records(&self) -> Vec<MatchRecord> {
        self.records.lock().unwrap().clone()
    }
}

impl ResultSink for RecordingSink {
    fn persist(&self, record: MatchRecord) -> BoxFuture<'static, Result<(), PersistenceError>> {
        self.records.lock().unwrap().push(record);
        Box::pin(async { Ok(()) })
    }
}

/// Sink writing straight into the server's store, which merges per player.
#[derive(Clone, Default)]
struct StoreSink {
    store: MemoryMatchStore,
}

impl StoreSink {
    async fn stored(&self, match_id: &str) -> MatchRecord {
        self.store
            .find_match(match_id.into())
            .await
            .unwrap()
            .expect("match recorded")
            .into()
    }
}

impl ResultSink for StoreSink {
    fn persist(&self, record: MatchRecord) -> BoxFuture<'static, Result<(), PersistenceError>> {
        let store = self.store.clone();
        Box::pin(async move {
            match store.save_match(MatchEntity::from_record(record)).await {
                Ok(_) => Ok(()),
                Err(StorageError::Conflict { match_id }) => Err(PersistenceError::Conflict { match_id }),
                Err(err) => panic!("memory store failed: {err}"),
            }
        })
    }
}

struct FailingSink;

impl ResultSink for FailingSink {
    fn persist(&self, _record: MatchRecord) -> BoxFuture<'static, Result<(), PersistenceError>> {
        Box::pin(async {
            Err(PersistenceError::Status {
                status: StatusCode::SERVICE_UNAVAILABLE,
            })
        })
    }
}

fn bank() -> Vec<Question> {
    vec![
        Question::new(1, "Capital of France?", "Paris"),
        Question::new(2, "5 + 7 = ?", "12"),
        Question::new(3, "Largest planet?", "Jupiter"),
        Question::new(4, "OOP stands for?", "Object Oriented Programming"),
        Question::new(5, "SQL stands for?", "Structured Query Language"),
    ]
}

const ANSWERS: [&str; 5] = [
    "Paris",
    "12",
    "Jupiter",
    "object oriented programming",
    "Structured Query Language",
];

async fn join(
    broker: &LocalBroker,
    match_id: &str,
    player: &str,
    questions: Vec<Question>,
    sink: Arc<dyn ResultSink>,
) -> MatchClient {
    MatchClient::join_multi_as(match_id, player, questions, Arc::new(broker.clone()), sink)
        .await
        .unwrap()
}

#[tokio::test]
async fn single_player_five_of_five_persists_exactly_once() {
    let sink = Arc::new(RecordingSink::default());
    let mut client = MatchClient::single(bank(), sink.clone()).unwrap();

    for (index, answer) in ANSWERS.into_iter().enumerate() {
        let outcome = client.submit_answer(answer).await;
        assert_eq!(outcome.verdict, Verdict::Correct);
        assert_eq!(outcome.view.finished, index == 4);
    }

    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].scores.len(), 1);
    assert_eq!(records[0].scores.get(LOCAL_PLAYER), Some(&5));
    assert_eq!(records[0].cards, bank());
    assert!(records[0].match_id.starts_with("solo-"));
}

#[tokio::test]
async fn first_correct_answer_advances_every_participant() {
    let broker = LocalBroker::new();
    let sink = Arc::new(RecordingSink::default());
    let mut alice = join(&broker, "match-100", "player-1", bank(), sink.clone()).await;
    let mut bob = join(&broker, "match-100", "player-2", bank(), sink.clone()).await;
    alice.drain_events().await.unwrap();
    bob.drain_events().await.unwrap();

    let outcome = alice.submit_answer("paris").await;
    assert!(matches!(outcome.publish, Some(Ok(()))));

    let effects = bob.drain_events().await.unwrap();
    assert_eq!(
        effects,
        vec![EventEffect::Advanced {
            sequence: 1,
            finished: false
        }]
    );

    // The publisher's own echo must not advance it a second time.
    let echoes = alice.drain_events().await.unwrap();
    assert_eq!(
        echoes,
        vec![EventEffect::Stale {
            current: 1,
            received: 1
        }]
    );

    for client in [&alice, &bob] {
        let view = client.view();
        assert_eq!(view.question_number, 2);
        assert_eq!(view.scoreboard.get("player-1"), Some(&1));
        assert_eq!(view.scoreboard.get("player-2"), None);
    }
    assert_eq!(bob.view().score, 0);
}

#[tokio::test]
async fn simultaneous_correct_answers_converge() {
    let broker = LocalBroker::new();
    let sink = Arc::new(RecordingSink::default());
    let mut alice = join(&broker, "match-101", "player-1", bank(), sink.clone()).await;
    let mut bob = join(&broker, "match-101", "player-2", bank(), sink.clone()).await;
    alice.drain_events().await.unwrap();
    bob.drain_events().await.unwrap();

    alice.submit_answer("Paris").await;
    bob.submit_answer("Paris").await;
    alice.drain_events().await.unwrap();
    bob.drain_events().await.unwrap();

    assert_eq!(alice.session().sequence(), 1);
    assert_eq!(bob.session().sequence(), 1);
    assert_eq!(alice.session().ledger(), bob.session().ledger());
    assert_eq!(alice.view().scoreboard.get("player-1"), Some(&1));
    assert_eq!(alice.view().scoreboard.get("player-2"), Some(&1));
}

#[tokio::test]
async fn only_the_terminal_advance_originator_persists() {
    let broker = LocalBroker::new();
    let questions = bank()[..2].to_vec();
    let sink = Arc::new(RecordingSink::default());
    let mut alice = join(&broker, "match-102", "player-1", questions.clone(), sink.clone()).await;
    let mut bob = join(&broker, "match-102", "player-2", questions, sink.clone()).await;
    alice.drain_events().await.unwrap();
    bob.drain_events().await.unwrap();

    alice.submit_answer("Paris").await;
    alice.drain_events().await.unwrap();
    bob.drain_events().await.unwrap();

    let last = bob.submit_answer("12").await;
    assert!(last.view.finished);
    assert!(matches!(last.persistence, Some(Ok(()))));

    let effects = alice.drain_events().await.unwrap();
    assert_eq!(
        effects,
        vec![EventEffect::Advanced {
            sequence: 2,
            finished: true
        }]
    );
    assert!(alice.view().finished);

    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].match_id, "match-102");
    assert_eq!(records[0].scores.get("player-1"), Some(&1));
    assert_eq!(records[0].scores.get("player-2"), Some(&1));
}

#[tokio::test]
async fn concurrent_terminal_answers_store_the_converged_ledger() {
    let broker = LocalBroker::new();
    let questions = bank()[..1].to_vec();
    let sink = StoreSink::default();
    let mut alice = join(&broker, "match-110", "player-1", questions.clone(), Arc::new(sink.clone())).await;
    let mut bob = join(&broker, "match-110", "player-2", questions, Arc::new(sink.clone())).await;
    alice.drain_events().await.unwrap();
    bob.drain_events().await.unwrap();

    // Both answer before seeing the other's advance.
    let from_alice = alice.submit_answer("Paris").await;
    let from_bob = bob.submit_answer("Paris").await;
    assert!(matches!(from_alice.persistence, Some(Ok(()))));
    assert!(matches!(from_bob.persistence, Some(Ok(()))));

    alice.drain_events().await.unwrap();
    bob.drain_events().await.unwrap();

    let stored = sink.stored("match-110").await;
    assert_eq!(alice.view().scoreboard, bob.view().scoreboard);
    assert_eq!(stored.scores.get("player-1"), Some(&1));
    assert_eq!(stored.scores.get("player-2"), Some(&1));
    for client in [&alice, &bob] {
        assert!(client.view().finished);
        assert_eq!(
            client.view().scoreboard.get("player-1"),
            stored.scores.get("player-1")
        );
        assert_eq!(
            client.view().scoreboard.get("player-2"),
            stored.scores.get("player-2")
        );
    }
}

#[tokio::test]
async fn credit_learnt_after_finishing_amends_the_stored_record() {
    let broker = LocalBroker::new();
    let questions = bank()[..2].to_vec();
    let sink = StoreSink::default();
    let mut alice = join(&broker, "match-111", "player-1", questions.clone(), Arc::new(sink.clone())).await;
    let mut bob = join(&broker, "match-111", "player-2", questions, Arc::new(sink.clone())).await;
    alice.drain_events().await.unwrap();
    bob.drain_events().await.unwrap();

    // Both take the first question; alice finishes before hearing about bob.
    alice.submit_answer("Paris").await;
    bob.submit_answer("Paris").await;
    let last = alice.submit_answer("12").await;
    assert!(last.view.finished);
    assert_eq!(sink.stored("match-111").await.scores.get("player-2"), None);

    alice.drain_events().await.unwrap();
    bob.drain_events().await.unwrap();

    let stored = sink.stored("match-111").await;
    assert!(bob.view().finished);
    assert_eq!(alice.session().ledger(), bob.session().ledger());
    assert_eq!(stored.scores.get("player-1"), Some(&2));
    assert_eq!(stored.scores.get("player-2"), Some(&1));
    assert_eq!(stored.scores.len(), alice.session().ledger().len());
}

#[tokio::test]
async fn peers_sharing_a_label_still_answer_each_other() {
    let broker = LocalBroker::new();
    let sink = Arc::new(RecordingSink::default());
    let mut first = join(&broker, "match-112", "player-7", bank(), sink.clone()).await;
    first.drain_events().await.unwrap();
    first.submit_answer("Paris").await;
    first.drain_events().await.unwrap();

    let mut second = join(&broker, "match-112", "player-7", bank(), sink).await;
    let answered = first.drain_events().await.unwrap();
    assert!(answered.contains(&EventEffect::SyncAnswered {
        requester: "player-7".into()
    }));

    second.drain_events().await.unwrap();
    assert_eq!(second.view().question_number, 2);
}

#[tokio::test]
async fn late_joiner_is_backfilled_with_the_full_state() {
    let broker = LocalBroker::new();
    let sink = Arc::new(RecordingSink::default());
    let mut alice = join(&broker, "match-103", "player-1", bank(), sink.clone()).await;
    alice.drain_events().await.unwrap();
    alice.submit_answer("Paris").await;
    alice.submit_answer("12").await;
    alice.drain_events().await.unwrap();

    let mut carol = join(&broker, "match-103", "player-3", bank(), sink.clone()).await;
    let answered = alice.drain_events().await.unwrap();
    assert!(answered.contains(&EventEffect::SyncAnswered {
        requester: "player-3".into()
    }));

    let effects = carol.drain_events().await.unwrap();
    assert_eq!(
        effects,
        vec![
            EventEffect::Ignored,
            EventEffect::SnapshotApplied { changed: true }
        ]
    );
    assert_eq!(carol.view().question_number, 3);
    assert_eq!(carol.view().scoreboard.get("player-1"), Some(&2));
}

#[tokio::test]
async fn missed_advances_trigger_a_resync_request() {
    let broker = LocalBroker::new();
    let sink = Arc::new(RecordingSink::default());
    let mut alice = join(&broker, "match-104", "player-1", bank(), sink).await;
    alice.drain_events().await.unwrap();

    let skipped = MatchEvent::CorrectAnswer(CorrectAnswerPayload {
        seq: 3,
        player_id: "player-9".into(),
        new_scores: [("player-9".to_string(), 3)].into_iter().collect(),
        next_card: Some(Question::new(4, "OOP stands for?", "Object Oriented Programming")),
    });
    broker
        .publish("match-104", skipped.to_json().unwrap())
        .await
        .unwrap();

    let effects = alice.drain_events().await.unwrap();
    assert_eq!(
        effects,
        vec![
            EventEffect::ResyncRequested {
                expected: 1,
                received: 3
            },
            EventEffect::Ignored
        ]
    );
    assert_eq!(alice.session().sequence(), 0);
    assert!(alice.session().ledger().is_empty());
}

#[tokio::test]
async fn malformed_frames_are_skipped() {
    let broker = LocalBroker::new();
    let mut alice = join(&broker, "match-105", "player-1", bank(), Arc::new(RecordingSink::default())).await;
    alice.drain_events().await.unwrap();

    broker.publish("match-105", "not json".into()).await.unwrap();
    broker
        .publish(
            "match-105",
            r#"{"event":"newCard","payload":{"seq":1,"card":null}}"#.into(),
        )
        .await
        .unwrap();

    let effects = alice.drain_events().await.unwrap();
    assert_eq!(
        effects,
        vec![EventEffect::Advanced {
            sequence: 1,
            finished: false
        }]
    );
}

#[tokio::test]
async fn subscription_failure_blocks_joining() {
    let broker = LocalBroker::new();
    broker.set_online(false);

    let result = MatchClient::join_multi(
        "match-106",
        bank(),
        Arc::new(broker.clone()),
        Arc::new(RecordingSink::default()),
    )
    .await;

    assert!(matches!(
        result,
        Err(ClientError::Subscription(SubscriptionError::Unreachable { .. }))
    ));
}

#[tokio::test]
async fn losing_the_channel_leaves_state_unchanged() {
    let broker = LocalBroker::new();
    let mut alice = join(&broker, "match-107", "player-1", bank(), Arc::new(RecordingSink::default())).await;
    alice.drain_events().await.unwrap();
    alice.submit_answer("Paris").await;
    alice.drain_events().await.unwrap();
    let before = alice.view();

    broker.disconnect_all();

    assert!(matches!(
        alice.process_next_event().await,
        Err(ClientError::Subscription(SubscriptionError::Disconnected { .. }))
    ));
    assert_eq!(alice.view(), before);
}

#[tokio::test]
async fn failed_publish_is_reported_and_local_advance_kept() {
    let broker = LocalBroker::new();
    let mut alice = join(&broker, "match-108", "player-1", bank(), Arc::new(RecordingSink::default())).await;
    alice.drain_events().await.unwrap();

    broker.set_online(false);
    let outcome = alice.submit_answer("Paris").await;

    assert_eq!(outcome.verdict, Verdict::Correct);
    assert!(matches!(
        outcome.publish,
        Some(Err(PublishError::Unreachable { .. }))
    ));
    assert_eq!(outcome.view.question_number, 2);
    assert_eq!(outcome.view.score, 1);
}

#[tokio::test]
async fn persistence_failure_keeps_the_game_over_state() {
    let mut client = MatchClient::single(bank()[..1].to_vec(), Arc::new(FailingSink)).unwrap();

    let outcome = client.submit_answer("Paris").await;
    assert!(outcome.view.finished);
    assert!(matches!(
        outcome.persistence,
        Some(Err(PersistenceError::Status { .. }))
    ));

    let again = client.submit_answer("Paris").await;
    assert_eq!(again.verdict, Verdict::NoQuestion);
    assert!(again.view.finished);
    assert_eq!(again.view.score, 1);
}

#[tokio::test]
async fn leaving_releases_the_channel() {
    let broker = LocalBroker::new();
    let alice = join(&broker, "match-109", "player-1", bank(), Arc::new(RecordingSink::default())).await;
    assert_eq!(broker.subscriber_count("match-109"), 1);

    alice.leave().await;
    assert_eq!(broker.subscriber_count("match-109"), 0);
}

#[tokio::test]
async fn dropping_a_client_releases_its_subscription() {
    let broker = LocalBroker::new();
    let alice = join(&broker, "match-113", "player-1", bank(), Arc::new(RecordingSink::default())).await;
    assert_eq!(broker.subscriber_count("match-113"), 1);

    drop(alice);
    assert_eq!(broker.subscriber_count("match-113"), 0);
}
