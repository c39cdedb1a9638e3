//! Errors surfaced by the client side of a match.

use reqwest::StatusCode;
use thiserror::Error;

use crate::state::match_session::MatchError;

/// Joining or listening on a match channel failed.
#[derive(Debug, Error)]
pub enum SubscriptionError {
    /// The pub/sub backend could not be reached.
    #[error("channel `{channel}` is unreachable: {reason}")]
    Unreachable {
        /// Channel the client tried to join.
        channel: String,
        /// Transport-level description of the failure.
        reason: String,
    },
    /// The backend answered but refused the subscription.
    #[error("channel `{channel}` refused the subscription: {reason}")]
    Rejected {
        /// Channel the client tried to join.
        channel: String,
        /// Reason given by the backend.
        reason: String,
    },
    /// The subscription ended; no further events will arrive.
    #[error("subscription to `{channel}` was closed")]
    Disconnected {
        /// Channel that was lost.
        channel: String,
    },
}

/// An event could not be handed to the pub/sub backend.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The event could not be encoded as a channel frame.
    #[error("failed to encode event")]
    Encode(#[from] serde_json::Error),
    /// The transport holds no subscription for this channel.
    #[error("not subscribed to `{channel}`")]
    NotSubscribed {
        /// Target channel.
        channel: String,
    },
    /// The backend could not be reached.
    #[error("channel `{channel}` is unreachable: {reason}")]
    Unreachable {
        /// Target channel.
        channel: String,
        /// Transport-level description of the failure.
        reason: String,
    },
    /// The connection carrying the channel is gone.
    #[error("connection to `{channel}` is closed")]
    ConnectionClosed {
        /// Target channel.
        channel: String,
    },
}

/// Submitting the final record of a match failed.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// The HTTP client could not be built.
    #[error("failed to build result store client")]
    Client(#[source] reqwest::Error),
    /// The request never got an answer.
    #[error("failed to reach the result store")]
    Request(#[source] reqwest::Error),
    /// The match id is already recorded with a different question sequence.
    #[error("match `{match_id}` is recorded with other questions")]
    Conflict {
        /// Identifier of the match.
        match_id: String,
    },
    /// The store answered with an unexpected status.
    #[error("result store answered with status {status}")]
    Status {
        /// Status code returned by the store.
        status: StatusCode,
    },
}

/// Failures of the match client controller.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The match could not be created.
    #[error(transparent)]
    Match(#[from] MatchError),
    /// The channel could not be joined or was lost.
    #[error(transparent)]
    Subscription(#[from] SubscriptionError),
    /// A protocol message could not be published.
    #[error(transparent)]
    Publish(#[from] PublishError),
    /// Channel operations were requested on a single-player match.
    #[error("single-player matches have no channel")]
    NoChannel,
}
