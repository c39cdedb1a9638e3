use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio_stream::wrappers::{BroadcastStream, errors::BroadcastStreamRecvError};
use tracing::{debug, info, warn};

use crate::{
    dto::wire::{MatchEvent, RelayNotice},
    state::SharedState,
};

/// Relay one WebSocket subscriber of `match_id`.
///
/// The socket is registered on the match hub before the `subscribed` notice
/// is sent, so every frame published after the peer sees the notice reaches
/// it. Valid match events are fanned out to every subscriber of the match,
/// the sender included.
pub async fn handle_socket(state: SharedState, match_id: String, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let hub_receiver = state.channels().subscribe(&match_id);

    let notice = RelayNotice::Subscribed {
        channel: match_id.clone(),
    };
    let ack = match notice.to_json() {
        Ok(ack) => ack,
        Err(err) => {
            warn!(match_id = %match_id, error = %err, "failed to encode subscription notice");
            drop(hub_receiver);
            state.channels().release(&match_id);
            return;
        }
    };

    if sender.send(Message::Text(ack.into())).await.is_err() {
        drop(hub_receiver);
        state.channels().release(&match_id);
        return;
    }

    info!(match_id = %match_id, "subscriber joined");

    // Dedicated writer task keeps fan-out flowing while we await inbound frames.
    let writer_match_id = match_id.clone();
    let writer_task = tokio::spawn(async move {
        let mut frames = BroadcastStream::new(hub_receiver);
        while let Some(frame) = frames.next().await {
            match frame {
                Ok(text) => {
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    // Skip lagged frames but keep the subscriber attached.
                    warn!(match_id = %writer_match_id, skipped, "subscriber lagging; frames dropped");
                }
            }
        }
    });

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => match MatchEvent::from_json_str(text.as_str()) {
                Ok(event) => {
                    let reached = state.channels().broadcast(&match_id, text.to_string());
                    debug!(match_id = %match_id, event = event.name(), reached, "relayed frame");
                }
                Err(err) => {
                    warn!(match_id = %match_id, error = %err, "dropping malformed frame");
                }
            },
            Ok(Message::Close(_)) => {
                info!(match_id = %match_id, "subscriber closed");
                break;
            }
            Ok(Message::Binary(_)) | Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(match_id = %match_id, error = %err, "websocket error");
                break;
            }
        }
    }

    // The writer owns the hub receiver; wait for it to go before pruning the hub.
    writer_task.abort();
    let _ = writer_task.await;
    state.channels().release(&match_id);
    info!(match_id = %match_id, "subscriber left");
}
