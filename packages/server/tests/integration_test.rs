//! Integration tests for the chat server using an in-process server and
//! real WebSocket clients.

use std::{net::SocketAddr, time::Duration};

use chatterbox_server::{config::PumpConfig, ui::Server};
use chatterbox_shared::message::{Envelope, MessageKind, UNKNOWN_AUTHOR};
use futures_util::{SinkExt, StreamExt};
use tokio::{net::TcpListener, net::TcpStream, sync::oneshot, time::timeout};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// Helper struct to manage an in-process server
struct TestServer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
}

impl TestServer {
    async fn start() -> Self {
        Self::start_with(PumpConfig::default()).await
    }

    async fn start_with(pump: PumpConfig) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (shutdown, signal) = oneshot::channel::<()>();
        tokio::spawn(Server::new(pump).serve(listener, async move {
            let _ = signal.await;
        }));
        TestServer {
            addr,
            shutdown: Some(shutdown),
        }
    }

    fn ws_url(&self, path: &str) -> String {
        format!("ws://{}{}", self.addr, path)
    }

    async fn connect(&self, path: &str) -> Client {
        let (client, _) = connect_async(self.ws_url(path)).await.unwrap();
        client
    }

    async fn connections(&self) -> u64 {
        let body: serde_json::Value = reqwest::get(format!("http://{}/health", self.addr))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        body["connections"].as_u64().unwrap()
    }

    /// Poll the health endpoint until the hub reports `expected` connections
    async fn wait_for_connections(&self, expected: u64) {
        for _ in 0..100 {
            if self.connections().await == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("hub never reached {} connections", expected);
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

async fn send_text(client: &mut Client, text: &str) {
    client.send(Message::Text(text.into())).await.unwrap();
}

/// Read frames until `count` envelopes have arrived, splitting batched frames
async fn recv_envelopes(client: &mut Client, count: usize) -> Vec<Envelope> {
    let mut received = Vec::new();
    while received.len() < count {
        let frame = timeout(RECV_TIMEOUT, client.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream ended")
            .expect("websocket error");
        if let Message::Text(text) = frame {
            received.extend(
                text.as_str()
                    .split('\n')
                    .filter(|line| !line.is_empty())
                    .map(Envelope::parse_or_plain),
            );
        }
    }
    received
}

#[tokio::test]
async fn test_health_reports_connection_count() {
    // テスト項目: ヘルスチェックが接続数を返す
    // given (前提条件):
    let server = TestServer::start().await;

    // when (操作):
    let before = server.connections().await;
    let _client = server.connect("/ws/chat").await;

    // then (期待する結果):
    assert_eq!(before, 0);
    server.wait_for_connections(1).await;
}

#[tokio::test]
async fn test_join_is_broadcast_to_every_connection() {
    // テスト項目: 最初の名前付きメッセージで参加通知とユーザー一覧が全員に届く
    // given (前提条件):
    let server = TestServer::start().await;
    let mut alice = server.connect("/ws/chat").await;
    let mut bob = server.connect("/ws/chat").await;
    server.wait_for_connections(2).await;

    // when (操作):
    let hello = Envelope::chat("alice", "hi everyone").to_json().unwrap();
    send_text(&mut alice, &hello).await;

    // then (期待する結果):
    for client in [&mut alice, &mut bob] {
        let received = recv_envelopes(client, 3).await;
        assert_eq!(received[0].kind, MessageKind::System);
        assert_eq!(received[0].content, "alice joined the chat");
        assert_eq!(received[1].kind, MessageKind::UserList);
        assert_eq!(received[1].users, Some(vec!["alice".to_string()]));
        assert_eq!(received[2].kind, MessageKind::Chat);
        assert_eq!(received[2].username, "alice");
        assert_eq!(received[2].content, "hi everyone");
    }
}

#[tokio::test]
async fn test_second_message_does_not_rejoin() {
    // テスト項目: 2 通目以降のメッセージでは参加通知が再送されない
    // given (前提条件):
    let server = TestServer::start().await;
    let mut alice = server.connect("/ws/chat").await;
    server.wait_for_connections(1).await;

    // when (操作):
    send_text(&mut alice, &Envelope::chat("alice", "one").to_json().unwrap()).await;
    send_text(&mut alice, &Envelope::chat("alice", "two").to_json().unwrap()).await;

    // then (期待する結果):
    let received = recv_envelopes(&mut alice, 4).await;
    let kinds: Vec<MessageKind> = received.iter().map(|envelope| envelope.kind).collect();
    assert_eq!(
        kinds,
        vec![
            MessageKind::System,
            MessageKind::UserList,
            MessageKind::Chat,
            MessageKind::Chat
        ]
    );
    assert_eq!(received[3].content, "two");
}

#[tokio::test]
async fn test_plain_text_is_broadcast_as_unknown_chat() {
    // テスト項目: JSON でないフレームは Unknown からの chat として配信される
    // given (前提条件):
    let server = TestServer::start().await;
    let mut client = server.connect("/ws/chat").await;
    server.wait_for_connections(1).await;

    // when (操作):
    send_text(&mut client, "hello").await;

    // then (期待する結果):
    let received = recv_envelopes(&mut client, 3).await;
    let chat = received
        .iter()
        .find(|envelope| envelope.kind == MessageKind::Chat)
        .unwrap();
    assert_eq!(chat.username, UNKNOWN_AUTHOR);
    assert_eq!(chat.content, "hello");
}

#[tokio::test]
async fn test_room_connections_share_broadcast_domain() {
    // テスト項目: ルーム接続も同じブロードキャスト対象に含まれる
    // given (前提条件):
    let server = TestServer::start().await;
    let mut in_room = server.connect("/ws/room/rust").await;
    let mut in_chat = server.connect("/ws/chat").await;
    server.wait_for_connections(2).await;

    // when (操作):
    send_text(&mut in_room, &Envelope::chat("ferris", "hello from #rust").to_json().unwrap()).await;

    // then (期待する結果):
    let received = recv_envelopes(&mut in_chat, 3).await;
    assert_eq!(received[2].content, "hello from #rust");
}

#[tokio::test]
async fn test_echo_endpoint_returns_frames() {
    // テスト項目: エコーエンドポイントは受け取ったフレームをそのまま返し、ハブには登録しない
    // given (前提条件):
    let server = TestServer::start().await;
    let mut client = server.connect("/ws/echo").await;

    // when (操作):
    send_text(&mut client, "ping me").await;

    // then (期待する結果):
    let frame = timeout(RECV_TIMEOUT, client.next()).await.unwrap().unwrap().unwrap();
    assert_eq!(frame, Message::Text("ping me".into()));
    assert_eq!(server.connections().await, 0);
}

#[tokio::test]
async fn test_oversize_frame_closes_connection() {
    // テスト項目: 上限を超えるフレームを送ると接続が切断される
    // given (前提条件):
    let server = TestServer::start_with(PumpConfig::default().with_max_message_size(64)).await;
    let mut client = server.connect("/ws/chat").await;
    server.wait_for_connections(1).await;

    // when (操作):
    send_text(&mut client, &"x".repeat(200)).await;

    // then (期待する結果):
    server.wait_for_connections(0).await;
    let ended = timeout(RECV_TIMEOUT, async {
        while let Some(Ok(frame)) = client.next().await {
            if frame.is_close() {
                break;
            }
        }
    })
    .await;
    assert!(ended.is_ok());
}

#[tokio::test]
async fn test_silent_client_is_dropped_after_read_deadline() {
    // テスト項目: 読み取り期限内にフレームが届かないクライアントは切断される
    // given (前提条件):
    let pump = PumpConfig::default().with_pong_wait(Duration::from_millis(300));
    let server = TestServer::start_with(pump).await;
    let client = server.connect("/ws/chat").await;
    server.wait_for_connections(1).await;

    // when (操作):
    // the client never polls, so it never answers the server's pings
    tokio::time::sleep(Duration::from_millis(600)).await;

    // then (期待する結果):
    server.wait_for_connections(0).await;
    drop(client);
}

#[tokio::test]
async fn test_client_answering_pings_outlives_read_deadline() {
    // テスト項目: ping に応答し続けるクライアントは読み取り期限を過ぎても切断されない
    // given (前提条件):
    let pump = PumpConfig::default().with_pong_wait(Duration::from_secs(2));
    let server = TestServer::start_with(pump).await;
    let mut client = server.connect("/ws/chat").await;
    server.wait_for_connections(1).await;

    // when (操作):
    // polling the stream makes the client answer each ping with a pong
    let mut pings = 0;
    let _ = timeout(Duration::from_millis(4500), async {
        while let Some(Ok(frame)) = client.next().await {
            if frame.is_ping() {
                pings += 1;
            }
        }
    })
    .await;

    // then (期待する結果):
    assert!(pings >= 2, "only {} pings before the deadline", pings);
    assert_eq!(server.connections().await, 1);
}

#[tokio::test]
async fn test_closing_client_is_unregistered() {
    // テスト項目: クライアントが切断するとレジストリから削除される
    // given (前提条件):
    let server = TestServer::start().await;
    let mut client = server.connect("/ws/chat").await;
    server.wait_for_connections(1).await;

    // when (操作):
    client.close(None).await.unwrap();

    // then (期待する結果):
    server.wait_for_connections(0).await;
}

#[tokio::test]
async fn test_named_departure_is_announced() {
    // テスト項目: 名前付きクライアントの切断は残りのクライアントに通知される
    // given (前提条件):
    let server = TestServer::start().await;
    let mut alice = server.connect("/ws/chat").await;
    let mut bob = server.connect("/ws/chat").await;
    server.wait_for_connections(2).await;
    send_text(&mut bob, &Envelope::chat("bob", "bye soon").to_json().unwrap()).await;
    recv_envelopes(&mut alice, 3).await;

    // when (操作):
    bob.close(None).await.unwrap();

    // then (期待する結果):
    let received = recv_envelopes(&mut alice, 2).await;
    assert_eq!(received[0].content, "bob left the chat");
    assert_eq!(received[1].users, Some(Vec::new()));
}
