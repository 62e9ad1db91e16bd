//! Live-socket tests for the dashboard event stream.

use futures_util::{SinkExt, Stream, StreamExt};
use podium_broadcast::Broadcaster;
use podium_db::{create_pool, run_migrations, DbRuntimeSettings};
use podium_lifecycle::LifecycleManager;
use podium_server::{app, AppState};
use podium_suggest::{MockSuggester, Suggester};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};

async fn spawn_server() -> (std::net::SocketAddr, TempDir) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("podium.db");
    let pool = create_pool(
        path.to_str().expect("utf-8 temp path"),
        DbRuntimeSettings::default(),
    )
    .expect("create pool");
    {
        let conn = pool.get().expect("get connection");
        run_migrations(&conn).expect("run migrations");
    }

    let broadcaster = Broadcaster::new();
    let lifecycle = Arc::new(LifecycleManager::new(pool.clone(), broadcaster.clone()));
    let suggester: Arc<dyn Suggester> = Arc::new(MockSuggester);

    let state = AppState {
        pool,
        broadcaster,
        lifecycle,
        suggester,
    };

    let app = app(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server error");
    });

    (addr, dir)
}

async fn next_json(
    stream: &mut (impl Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin),
) -> serde_json::Value {
    let msg = tokio::time::timeout(Duration::from_secs(5), stream.next())
        .await
        .expect("timed out waiting for event")
        .expect("stream ended")
        .expect("websocket error");
    match msg {
        Message::Text(text) => serde_json::from_str(&text).expect("event should be JSON"),
        other => panic!("unexpected frame: {other:?}"),
    }
}

#[tokio::test]
async fn connected_clients_receive_lifecycle_events() {
    let (addr, _dir) = spawn_server().await;
    let client = reqwest::Client::new();

    let (mut ws_a, _) = connect_async(format!("ws://{addr}/ws"))
        .await
        .expect("connect first client");
    let (mut ws_b, _) = connect_async(format!("ws://{addr}/ws"))
        .await
        .expect("connect second client");

    // A moderator to drive the full lifecycle.
    client
        .post(format!("http://{addr}/api/users"))
        .json(&json!({ "username": "mod", "email": "mod@example.com", "is_moderator": true }))
        .send()
        .await
        .expect("register moderator")
        .error_for_status()
        .expect("registration should succeed");

    // New question reaches both clients.
    let question: serde_json::Value = client
        .post(format!("http://{addr}/api/questions"))
        .json(&json!({ "message": "Is the stream live?" }))
        .send()
        .await
        .expect("submit question")
        .json()
        .await
        .expect("question JSON");
    let qid = question["id"].as_i64().expect("question id");

    for ws in [&mut ws_a, &mut ws_b] {
        let event = next_json(ws).await;
        assert_eq!(event["type"], "new_question");
        assert_eq!(event["data"]["id"], qid);
        assert_eq!(event["data"]["status"], "Pending");
    }

    // Status change fans out as an update.
    client
        .patch(format!("http://{addr}/api/questions/{qid}/status"))
        .header("X-Podium-User", "mod")
        .json(&json!({ "status": "Escalated" }))
        .send()
        .await
        .expect("escalate")
        .error_for_status()
        .expect("escalation should succeed");

    let event = next_json(&mut ws_a).await;
    assert_eq!(event["type"], "question_updated");
    assert_eq!(event["data"]["status"], "Escalated");

    // New answer fans out too.
    client
        .post(format!("http://{addr}/api/questions/{qid}/answers"))
        .header("X-Podium-User", "mod")
        .json(&json!({ "message": "Yes, it is live." }))
        .send()
        .await
        .expect("answer")
        .error_for_status()
        .expect("answer should succeed");

    let event = next_json(&mut ws_a).await;
    assert_eq!(event["type"], "new_answer");
    assert_eq!(event["data"]["question_id"], qid);

    // The second client saw the same stream in the same order.
    let event = next_json(&mut ws_b).await;
    assert_eq!(event["type"], "question_updated");
    let event = next_json(&mut ws_b).await;
    assert_eq!(event["type"], "new_answer");
}

#[tokio::test]
async fn closed_client_is_deregistered() {
    let (addr, _dir) = spawn_server().await;
    let client = reqwest::Client::new();

    let (mut ws, _) = connect_async(format!("ws://{addr}/ws"))
        .await
        .expect("connect client");

    let health: serde_json::Value = client
        .get(format!("http://{addr}/health"))
        .send()
        .await
        .expect("health")
        .json()
        .await
        .expect("health JSON");
    assert_eq!(health["observers"], 1);

    ws.send(Message::Close(None)).await.expect("send close");
    drop(ws);

    // Deregistration is asynchronous; poll briefly.
    let mut observers = -1;
    for _ in 0..50 {
        let health: serde_json::Value = client
            .get(format!("http://{addr}/health"))
            .send()
            .await
            .expect("health")
            .json()
            .await
            .expect("health JSON");
        observers = health["observers"].as_i64().expect("observer count");
        if observers == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(observers, 0, "observer should be removed after close");
}

#[tokio::test]
async fn rejected_submission_emits_no_event() {
    let (addr, _dir) = spawn_server().await;
    let client = reqwest::Client::new();

    let (mut ws, _) = connect_async(format!("ws://{addr}/ws"))
        .await
        .expect("connect client");

    let response = client
        .post(format!("http://{addr}/api/questions"))
        .json(&json!({ "message": "   " }))
        .send()
        .await
        .expect("submit");
    assert_eq!(response.status(), 422);

    // A valid follow-up must be the first thing the client sees.
    client
        .post(format!("http://{addr}/api/questions"))
        .json(&json!({ "message": "real question" }))
        .send()
        .await
        .expect("submit valid")
        .error_for_status()
        .expect("valid submission");

    let event = next_json(&mut ws).await;
    assert_eq!(event["type"], "new_question");
    assert_eq!(event["data"]["message"], "real question");
}
