//! Client side of a match: the pub/sub seam, its transports, result
//! submission and the controller tying them to a [`MatchSession`].
//!
//! [`MatchSession`]: crate::state::match_session::MatchSession

pub mod channel;
pub mod controller;
pub mod error;
pub mod local;
pub mod persistence;
pub mod ws;

pub use channel::{MatchChannel, PubSubTransport, Subscription};
pub use controller::{AnswerOutcome, EventEffect, MatchClient, MatchView, Verdict};
pub use error::{ClientError, PersistenceError, PublishError, SubscriptionError};
pub use local::LocalBroker;
pub use persistence::{HttpResultSink, ResultSink};
pub use ws::WsTransport;
