//! Server side of one WebSocket connection.
//!
//! Each upgraded socket is registered with the hub and then served by two
//! tasks that never call each other:
//!
//! - the read pump decodes frames into envelopes and hands them to the hub,
//!   waiting while the hub's traffic queue is full;
//! - the write pump drains the connection's outbound queue and sends pings.
//!
//! The hub holds the only sender of the outbound queue. Unregistering (or
//! evicting) the connection closes the queue, which stops the write pump once
//! it has flushed what was already queued. The read pump unregisters on exit
//! whatever the cause.

use std::borrow::Cow;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{
    sink::SinkExt,
    stream::{SplitSink, SplitStream, StreamExt},
};
use tokio::{
    sync::mpsc,
    task::JoinError,
    time::{self, Duration, Instant, timeout},
};

use chatterbox_shared::message::Envelope;

use crate::{
    config::PumpConfig,
    error::ConnectionError,
    hub::{ConnectionId, HubHandle},
};

/// Identity of the peer as learned from its messages. Anonymous until the
/// first message with an author.
#[derive(Debug, Default)]
pub struct Presence {
    display_name: Option<String>,
}

impl Presence {
    /// Adopt the author of `envelope` if the connection has no name yet.
    /// Returns the name only for the message that introduced it.
    pub fn observe(&mut self, envelope: &Envelope) -> Option<&str> {
        if self.display_name.is_some() || !envelope.has_author() {
            return None;
        }
        self.display_name = Some(envelope.username.clone());
        self.display_name.as_deref()
    }
}

/// One decoded inbound frame, ready for the hub.
#[derive(Debug)]
pub struct Inbound {
    /// Set when this frame introduced the peer's name.
    pub joined: Option<String>,
    /// The envelope re-serialized for broadcast.
    pub payload: String,
}

/// Decode a frame, falling back to plain text, and note a first-time author.
pub fn ingest(presence: &mut Presence, raw: &str) -> Inbound {
    let envelope = Envelope::parse_or_plain(raw);
    let joined = presence.observe(&envelope).map(str::to_owned);
    let payload = match envelope.to_json() {
        Ok(json) => json,
        Err(e) => {
            tracing::warn!("Failed to re-serialize message, forwarding raw text: {}", e);
            raw.to_string()
        }
    };
    Inbound { joined, payload }
}

/// Serve an upgraded socket until either pump stops.
pub async fn serve(socket: WebSocket, hub: HubHandle, config: PumpConfig) {
    let id = ConnectionId::new();
    let (outbound, queue) = mpsc::channel(config.send_buffer);
    if let Err(e) = hub.register(id, outbound) {
        tracing::error!("Dropping connection {}: {}", id, e);
        return;
    }

    let (sink, stream) = socket.split();
    let mut write_task = tokio::spawn(write_pump(id, queue, sink, config));
    let mut read_task = tokio::spawn(read_pump(id, stream, hub.clone(), config));

    tokio::select! {
        result = &mut read_task => {
            log_outcome(id, "read", result);
            // unregistered by the read pump; the writer flushes and stops
            log_outcome(id, "write", write_task.await);
        }
        result = &mut write_task => {
            log_outcome(id, "write", result);
            read_task.abort();
            let _ = hub.unregister(id);
        }
    }
    tracing::debug!("Connection {} closed", id);
}

fn log_outcome(id: ConnectionId, pump: &str, result: Result<Result<(), ConnectionError>, JoinError>) {
    match result {
        Ok(Ok(())) => tracing::debug!("Connection {} {} pump finished", id, pump),
        Ok(Err(e)) => tracing::warn!("Connection {} {} pump failed: {}", id, pump, e),
        Err(e) if e.is_cancelled() => {}
        Err(e) => tracing::error!("Connection {} {} pump panicked: {}", id, pump, e),
    }
}

async fn read_pump(
    id: ConnectionId,
    mut stream: SplitStream<WebSocket>,
    hub: HubHandle,
    config: PumpConfig,
) -> Result<(), ConnectionError> {
    let mut presence = Presence::default();

    let result = loop {
        let frame = match timeout(config.pong_wait, stream.next()).await {
            Err(_) => break Err(ConnectionError::ReadTimeout(config.pong_wait)),
            Ok(None) => break Ok(()),
            Ok(Some(Err(e))) => break Err(e.into()),
            Ok(Some(Ok(frame))) => frame,
        };

        let raw: Cow<'_, str> = match &frame {
            Message::Text(text) => Cow::Borrowed(text.as_str()),
            Message::Binary(data) => String::from_utf8_lossy(data),
            Message::Ping(_) | Message::Pong(_) => {
                tracing::trace!("Keepalive from connection {}", id);
                continue;
            }
            Message::Close(_) => {
                tracing::info!("Connection {} requested close", id);
                break Ok(());
            }
        };
        if raw.len() > config.max_message_size {
            break Err(ConnectionError::FrameTooLarge {
                size: raw.len(),
                limit: config.max_message_size,
            });
        }
        tracing::debug!("Received from connection {}: {}", id, raw);

        let inbound = ingest(&mut presence, &raw);
        if let Some(name) = inbound.joined {
            match Envelope::system(format!("{} joined the chat", name)).to_json() {
                Ok(notice) => {
                    let _ = hub.broadcast(notice).await;
                }
                Err(e) => tracing::error!("Failed to serialize join notice: {}", e),
            }
            let _ = hub.identify(id, name).await;
        }
        if hub.broadcast(inbound.payload).await.is_err() {
            tracing::warn!("Hub stopped, closing connection {}", id);
            break Ok(());
        }
    };

    let _ = hub.unregister(id);
    result
}

async fn write_pump(
    id: ConnectionId,
    mut queue: mpsc::Receiver<String>,
    mut sink: SplitSink<WebSocket, Message>,
    config: PumpConfig,
) -> Result<(), ConnectionError> {
    let mut keepalive = time::interval_at(Instant::now() + config.ping_period, config.ping_period);

    loop {
        tokio::select! {
            next = queue.recv() => {
                let Some(first) = next else {
                    tracing::debug!("Outbound queue of connection {} closed", id);
                    let _ = timeout(config.write_wait, sink.send(Message::Close(None))).await;
                    return Ok(());
                };
                let frame = batch(first, &mut queue);
                send(&mut sink, Message::Text(frame.into()), config.write_wait).await?;
            }
            _ = keepalive.tick() => {
                send(&mut sink, Message::Ping(Default::default()), config.write_wait).await?;
            }
        }
    }
}

/// Join the messages already waiting behind `first` into one frame, one
/// envelope per line.
fn batch(first: String, queue: &mut mpsc::Receiver<String>) -> String {
    let mut frame = first;
    for _ in 0..queue.len() {
        match queue.try_recv() {
            Ok(next) => {
                frame.push('\n');
                frame.push_str(&next);
            }
            Err(_) => break,
        }
    }
    frame
}

async fn send(
    sink: &mut SplitSink<WebSocket, Message>,
    message: Message,
    write_wait: Duration,
) -> Result<(), ConnectionError> {
    match timeout(write_wait, sink.send(message)).await {
        Ok(result) => result.map_err(ConnectionError::from),
        Err(_) => Err(ConnectionError::WriteTimeout(write_wait)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatterbox_shared::message::{MessageKind, UNKNOWN_AUTHOR};

    #[test]
    fn test_first_named_message_announces_join() {
        // テスト項目: 名前付きの最初のメッセージで参加が検出される
        // given (前提条件):
        let mut presence = Presence::default();
        let raw = Envelope::chat("alice", "hi").to_json().unwrap();

        // when (操作):
        let inbound = ingest(&mut presence, &raw);

        // then (期待する結果):
        assert_eq!(inbound.joined.as_deref(), Some("alice"));
        assert_eq!(presence.display_name.as_deref(), Some("alice"));
    }

    #[test]
    fn test_join_is_announced_only_once() {
        // テスト項目: 2 回目以降のメッセージでは参加が再通知されない
        // given (前提条件):
        let mut presence = Presence::default();
        ingest(&mut presence, &Envelope::chat("alice", "hi").to_json().unwrap());

        // when (操作):
        let renamed = ingest(&mut presence, &Envelope::chat("mallory", "hi").to_json().unwrap());

        // then (期待する結果):
        assert!(renamed.joined.is_none());
        assert_eq!(presence.display_name.as_deref(), Some("alice"));
    }

    #[test]
    fn test_anonymous_messages_do_not_name_connection() {
        // テスト項目: 作者名の無いメッセージは接続を名付けない
        // given (前提条件):
        let mut presence = Presence::default();

        // when (操作):
        let inbound = ingest(&mut presence, r#"{"type":"chat","username":"  ","content":"x"}"#);

        // then (期待する結果):
        assert!(inbound.joined.is_none());
        assert_eq!(presence.display_name, None);
    }

    #[test]
    fn test_plain_text_is_wrapped_and_reserialized() {
        // テスト項目: プレーンテキストは Unknown の chat エンベロープとして転送される
        // given (前提条件):
        let mut presence = Presence::default();

        // when (操作):
        let inbound = ingest(&mut presence, "hello");

        // then (期待する結果):
        let forwarded: Envelope = serde_json::from_str(&inbound.payload).unwrap();
        assert_eq!(forwarded.kind, MessageKind::Chat);
        assert_eq!(forwarded.username, UNKNOWN_AUTHOR);
        assert_eq!(forwarded.content, "hello");
        // "Unknown" counts as an author
        assert_eq!(inbound.joined.as_deref(), Some(UNKNOWN_AUTHOR));
    }

    #[tokio::test]
    async fn test_batch_joins_queued_messages_with_newlines() {
        // テスト項目: キューに溜まったメッセージは改行区切りで 1 フレームにまとめられる
        // given (前提条件):
        let (tx, mut rx) = mpsc::channel(8);
        tx.send("b".to_string()).await.unwrap();
        tx.send("c".to_string()).await.unwrap();

        // when (操作):
        let frame = batch("a".to_string(), &mut rx);

        // then (期待する結果):
        assert_eq!(frame, "a\nb\nc");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_batch_without_backlog_is_single_message() {
        // テスト項目: キューが空ならフレームは 1 件のメッセージのみ
        // given (前提条件):
        let (_tx, mut rx) = mpsc::channel::<String>(8);

        // when (操作):
        let frame = batch("only".to_string(), &mut rx);

        // then (期待する結果):
        assert_eq!(frame, "only");
    }
}
