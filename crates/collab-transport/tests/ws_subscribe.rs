//! Subscription sockets against a served router.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use collab_assist::DiagramService;
use collab_session::SessionRegistry;
use collab_transport::{AppState, create_router};
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::{net::TcpStream, time::timeout};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{Error as WsError, Message},
};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

struct TestServer {
    addr: SocketAddr,
    state: AppState,
    http: reqwest::Client,
}

impl TestServer {
    async fn start() -> Self {
        let state = AppState::new(
            Arc::new(SessionRegistry::default()),
            Arc::new(DiagramService::fallback_only()),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = create_router(state.clone());
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        Self {
            addr,
            state,
            http: reqwest::Client::new(),
        }
    }

    async fn post(&self, path: &str, body: Value) -> Value {
        self.http
            .post(format!("http://{}{path}", self.addr))
            .json(&body)
            .send()
            .await
            .unwrap()
            .error_for_status()
            .unwrap()
            .json()
            .await
            .unwrap()
    }

    async fn create_session(&self) -> String {
        let created = self.post("/create-session", json!({})).await;
        created["sessionId"].as_str().unwrap().to_string()
    }

    async fn join(&self, session_id: &str, nickname: &str) -> i64 {
        let joined = self
            .post("/join-session", json!({"sessionId": session_id, "nickname": nickname}))
            .await;
        joined["replicaId"].as_i64().unwrap()
    }

    async fn send_update(&self, session_id: &str, replica_id: i64, node: Value) -> String {
        let reply = self
            .post(
                "/send-local-update",
                json!({"sessionId": session_id, "replicaId": replica_id, "node": node}),
            )
            .await;
        reply["statusMessage"].as_str().unwrap().to_string()
    }

    async fn subscribe(&self, session_id: &str, replica_id: i64) -> Result<Socket, WsError> {
        let url = format!(
            "ws://{}/subscribe?sessionId={session_id}&replicaId={replica_id}",
            self.addr
        );
        connect_async(url).await.map(|(socket, _)| socket)
    }
}

async fn next_frame(socket: &mut Socket) -> Message {
    loop {
        let frame = timeout(RECV_TIMEOUT, socket.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("socket ended")
            .expect("socket error");
        if !matches!(frame, Message::Ping(_) | Message::Pong(_)) {
            return frame;
        }
    }
}

async fn next_json(socket: &mut Socket) -> Value {
    match next_frame(socket).await {
        Message::Text(text) => serde_json::from_str(&text).unwrap(),
        other => panic!("expected a text frame, got {other:?}"),
    }
}

fn http_status(err: &WsError) -> u16 {
    match err {
        WsError::Http(response) => response.status().as_u16(),
        other => panic!("expected an HTTP rejection, got {other:?}"),
    }
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..100 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test]
async fn test_alice_bob_insert_and_disconnect() {
    let server = TestServer::start().await;
    let session_id = server.create_session().await;
    let alice = server.join(&session_id, "Alice").await;
    let bob = server.join(&session_id, "Bob").await;
    assert_eq!((alice, bob), (0, 1));

    let mut alice_ws = server.subscribe(&session_id, alice).await.unwrap();
    let mut bob_ws = server.subscribe(&session_id, bob).await.unwrap();

    let status = server.send_update(&session_id, alice, json!({"op": "insert"})).await;
    assert_eq!(status, "Successfully received local update");

    assert_eq!(
        next_json(&mut bob_ws).await,
        json!({
            "type": "remote_update",
            "senderReplicaId": 0,
            "node": {"op": "insert"},
            "nickname": "Alice"
        })
    );

    // Bob goes away; Alice's next frame is his leave, not her own edit.
    bob_ws.close(None).await.unwrap();
    assert_eq!(
        next_json(&mut alice_ws).await,
        json!({"type": "remote_update", "senderReplicaId": 1, "nickname": "Bob"})
    );

    let sid = session_id.clone().into();
    let stats = server.state.registry.stats(&sid).unwrap();
    assert_eq!(stats.replicas, 1);
    assert_eq!(stats.history_len, 2);
}

#[tokio::test]
async fn test_late_subscriber_gets_replay_then_live() {
    let server = TestServer::start().await;
    let session_id = server.create_session().await;
    let alice = server.join(&session_id, "Alice").await;
    let bob = server.join(&session_id, "Bob").await;

    server.send_update(&session_id, alice, json!(1)).await;
    let mut bob_ws = server.subscribe(&session_id, bob).await.unwrap();
    server.send_update(&session_id, alice, json!(2)).await;

    assert_eq!(next_json(&mut bob_ws).await["node"], json!(1));
    assert_eq!(next_json(&mut bob_ws).await["node"], json!(2));
}

#[tokio::test]
async fn test_subscribe_rejections_before_upgrade() {
    let server = TestServer::start().await;
    let session_id = server.create_session().await;
    let alice = server.join(&session_id, "Alice").await;

    let missing = server.subscribe("MISSING123", 0).await.unwrap_err();
    assert_eq!(http_status(&missing), 404);

    let not_joined = server.subscribe(&session_id, 9).await.unwrap_err();
    assert_eq!(http_status(&not_joined), 404);

    let _alice_ws = server.subscribe(&session_id, alice).await.unwrap();
    let duplicate = server.subscribe(&session_id, alice).await.unwrap_err();
    assert_eq!(http_status(&duplicate), 409);
}

#[tokio::test]
async fn test_ping_is_answered() {
    let server = TestServer::start().await;
    let session_id = server.create_session().await;
    let alice = server.join(&session_id, "Alice").await;
    let mut alice_ws = server.subscribe(&session_id, alice).await.unwrap();

    alice_ws
        .send(Message::Text(json!({"type": "ping"}).to_string().into()))
        .await
        .unwrap();
    assert_eq!(next_json(&mut alice_ws).await, json!({"type": "pong"}));
}

#[tokio::test]
async fn test_shutdown_closes_sockets_and_empties_registry() {
    let server = TestServer::start().await;
    let session_id = server.create_session().await;
    let alice = server.join(&session_id, "Alice").await;
    let mut alice_ws = server.subscribe(&session_id, alice).await.unwrap();

    server.state.registry.shutdown();

    assert!(matches!(next_frame(&mut alice_ws).await, Message::Close(_)));
    let registry = Arc::clone(&server.state.registry);
    wait_until(|| registry.is_empty()).await;
}
