//! WebSocket client for the channel relay served at `/realtime/{match_id}`.

use std::{sync::Arc, time::Duration};

use dashmap::{DashMap, mapref::entry::Entry};
use futures::{SinkExt, StreamExt, future::BoxFuture};
use tokio::{
    net::TcpStream,
    sync::mpsc,
    task::JoinHandle,
    time::timeout,
};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{self, Message},
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    client::{
        channel::{PubSubTransport, Subscription},
        error::{PublishError, SubscriptionError},
    },
    dto::wire::RelayNotice,
};

const ACK_TIMEOUT: Duration = Duration::from_secs(5);
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

type WsSource = futures::stream::SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// One open relay socket, owned by the subscription it was opened for.
///
/// The writer task closes the socket once `outbound` is dropped, which
/// happens on `unsubscribe`, when the [`Subscription`] is dropped and when the
/// relay ends the connection.
struct RelayLink {
    subscription: Uuid,
    outbound: mpsc::UnboundedSender<Message>,
    writer: JoinHandle<()>,
}

impl RelayLink {
    /// Ask the relay to close and let the writer finish.
    fn close(self) -> JoinHandle<()> {
        let _ = self.outbound.send(Message::Close(None));
        self.writer
    }
}

/// Pub/sub transport backed by the relay server, one socket per channel.
#[derive(Clone)]
pub struct WsTransport {
    base_url: Arc<str>,
    links: Arc<DashMap<String, RelayLink>>,
}

impl WsTransport {
    /// Build a transport for the server at `server_url` (`http(s)://` or `ws(s)://`).
    pub fn new(server_url: &str) -> Self {
        Self {
            base_url: Arc::from(websocket_base(server_url)),
            links: Arc::new(DashMap::new()),
        }
    }

    fn channel_url(&self, channel: &str) -> String {
        format!("{}/realtime/{}", self.base_url, channel)
    }
}

impl PubSubTransport for WsTransport {
    fn subscribe(&self, channel: &str) -> BoxFuture<'static, Result<Subscription, SubscriptionError>> {
        let transport = self.clone();
        let channel = channel.to_string();
        Box::pin(async move {
            if transport.links.contains_key(&channel) {
                return Err(SubscriptionError::Rejected {
                    channel,
                    reason: "already subscribed on this transport".into(),
                });
            }

            let url = transport.channel_url(&channel);
            let (stream, _response) = connect_async(url.as_str())
                .await
                .map_err(|err| connect_error(&channel, err))?;
            let (mut sink, mut source) = stream.split();

            match timeout(ACK_TIMEOUT, wait_for_ack(&channel, &mut source)).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => return Err(err),
                Err(_) => {
                    return Err(SubscriptionError::Unreachable {
                        channel,
                        reason: "relay did not acknowledge the subscription".into(),
                    });
                }
            }

            let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<Message>();
            let writer = tokio::spawn(async move {
                while let Some(message) = outbound_rx.recv().await {
                    if sink.send(message).await.is_err() {
                        break;
                    }
                }
                let _ = sink.close().await;
            });

            let (frames_tx, frames_rx) = mpsc::unbounded_channel::<String>();
            let subscription = Subscription::new(
                channel.clone(),
                UnboundedReceiverStream::new(frames_rx).boxed(),
            );
            let id = subscription.id();

            // Registered before the reader starts so its cleanup always finds the link.
            match transport.links.entry(channel.clone()) {
                Entry::Occupied(_) => {
                    drop(outbound);
                    return Err(SubscriptionError::Rejected {
                        channel,
                        reason: "already subscribed on this transport".into(),
                    });
                }
                Entry::Vacant(slot) => {
                    slot.insert(RelayLink {
                        subscription: id,
                        outbound,
                        writer,
                    });
                }
            }

            let links = transport.links.clone();
            let reader_channel = channel.clone();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = frames_tx.closed() => {
                            debug!(channel = %reader_channel, "subscription dropped; closing relay socket");
                            break;
                        }
                        message = source.next() => match message {
                            Some(Ok(Message::Text(text))) => {
                                if frames_tx.send(text.to_string()).is_err() {
                                    break;
                                }
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                debug!(channel = %reader_channel, "relay socket closed");
                                break;
                            }
                            Some(Ok(_)) => {}
                            Some(Err(err)) => {
                                warn!(channel = %reader_channel, error = %err, "relay socket error");
                                break;
                            }
                        },
                    }
                }

                if let Some((_, link)) = links.remove_if(&reader_channel, |_, link| link.subscription == id) {
                    let _ = link.close();
                }
            });

            info!(channel = %channel, "subscribed through relay");
            Ok(subscription)
        })
    }

    fn publish(&self, channel: &str, frame: String) -> BoxFuture<'static, Result<(), PublishError>> {
        let result = match self.links.get(channel) {
            Some(link) => link
                .outbound
                .send(Message::Text(frame.into()))
                .map_err(|_| PublishError::ConnectionClosed {
                    channel: channel.to_string(),
                }),
            None => Err(PublishError::NotSubscribed {
                channel: channel.to_string(),
            }),
        };
        Box::pin(async move { result })
    }

    fn unsubscribe(&self, subscription: Subscription) -> BoxFuture<'static, ()> {
        let links = self.links.clone();
        Box::pin(async move {
            let channel = subscription.channel().to_string();
            let id = subscription.id();
            drop(subscription);

            let Some((_, link)) = links.remove_if(&channel, |_, link| link.subscription == id)
            else {
                return;
            };

            if timeout(CLOSE_TIMEOUT, link.close()).await.is_err() {
                warn!(channel = %channel, "relay writer did not finish in time");
            }
            info!(channel = %channel, "unsubscribed from relay");
        })
    }
}

/// Read frames until the relay confirms the subscription.
async fn wait_for_ack(channel: &str, source: &mut WsSource) -> Result<(), SubscriptionError> {
    while let Some(message) = source.next().await {
        match message {
            Ok(Message::Text(text)) => match RelayNotice::from_json_str(text.as_str()) {
                Ok(RelayNotice::Subscribed { channel: acked }) if acked == channel => {
                    return Ok(());
                }
                Ok(RelayNotice::Subscribed { channel: acked }) => {
                    return Err(SubscriptionError::Rejected {
                        channel: channel.to_string(),
                        reason: format!("relay acknowledged `{acked}` instead"),
                    });
                }
                Err(err) => {
                    debug!(channel, error = %err, "ignoring frame received before acknowledgement");
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(err) => {
                return Err(SubscriptionError::Unreachable {
                    channel: channel.to_string(),
                    reason: err.to_string(),
                });
            }
        }
    }

    Err(SubscriptionError::Disconnected {
        channel: channel.to_string(),
    })
}

fn connect_error(channel: &str, err: tungstenite::Error) -> SubscriptionError {
    match err {
        tungstenite::Error::Http(response) => SubscriptionError::Rejected {
            channel: channel.to_string(),
            reason: format!("relay answered with status {}", response.status()),
        },
        other => SubscriptionError::Unreachable {
            channel: channel.to_string(),
            reason: other.to_string(),
        },
    }
}

/// Map an HTTP base URL onto the matching WebSocket scheme.
fn websocket_base(server_url: &str) -> String {
    let trimmed = server_url.trim_end_matches('/');
    if let Some(rest) = trimmed.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = trimmed.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        trimmed.to_string()
    }
}
