//! Minimal Engine.IO/Socket.IO servers for the real-time suite
//!
//! [`FakeSocketIo::start`] speaks the websocket transport only.
//! [`FakeSocketIo::start_polling`] speaks HTTP long-polling only and refuses
//! websocket upgrades, so clients must fall back.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::{accept_async, tungstenite::Message};

use stadtwache_harness::realtime::protocol::{join_payload, split_payload};

const OPEN_PACKET: &str = r#"0{"sid":"fake-engine-sid","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#;
const SEND_MESSAGE_PREFIX: &str = r#"42["send_message","#;

/// Engine.IO session id handed out by the polling server
pub const POLLING_SID: &str = "fake-polling-sid";
const POLLING_OPEN_PACKET: &str = r#"0{"sid":"fake-polling-sid","upgrades":["websocket"],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#;

/// How long a poll is held open before answering with a noop
const POLL_HOLD: Duration = Duration::from_millis(500);

/// How the fake server reacts to the client
#[derive(Debug, Clone, Copy)]
pub struct Behavior {
    /// Answer `send_message` with a `new_message` carrying the same payload
    pub echo_messages: bool,
    /// Acknowledge the namespace connect
    pub acknowledge: bool,
}

enum Reaction {
    Reply(Vec<String>),
    Close,
}

/// What the server sends back for one client frame
fn react(frame: &str, behavior: Behavior) -> Reaction {
    if frame == "40" {
        if behavior.acknowledge {
            Reaction::Reply(vec![
                r#"40{"sid":"fake-socket-sid"}"#.to_string(),
                "2".to_string(),
                r#"42["user_online",{"user_id":"u-9","status":"Im Dienst"}]"#.to_string(),
            ])
        } else {
            Reaction::Reply(Vec::new())
        }
    } else if behavior.echo_messages && frame.starts_with(SEND_MESSAGE_PREFIX) {
        let payload = &frame[SEND_MESSAGE_PREFIX.len()..frame.len() - 1];
        Reaction::Reply(vec![format!(r#"42["new_message",{}]"#, payload)])
    } else if frame == "1" {
        Reaction::Close
    } else {
        Reaction::Reply(Vec::new())
    }
}

pub struct FakeSocketIo {
    pub origin: String,
    frames: Arc<Mutex<Vec<String>>>,
    handle: JoinHandle<()>,
}

impl FakeSocketIo {
    pub async fn start(behavior: Behavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake socket.io server");
        let addr = listener.local_addr().expect("local address");
        let frames = Arc::new(Mutex::new(Vec::new()));

        let accepted = Arc::clone(&frames);
        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let frames = Arc::clone(&accepted);
                tokio::spawn(serve(stream, behavior, frames));
            }
        });

        Self {
            origin: format!("http://{}", addr),
            frames,
            handle,
        }
    }

    pub async fn start_polling(behavior: Behavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake polling server");
        let addr = listener.local_addr().expect("local address");
        let frames = Arc::new(Mutex::new(Vec::new()));

        let state = PollingState {
            behavior,
            frames: Arc::clone(&frames),
            pending: Arc::new(Mutex::new(VecDeque::new())),
            ready: Arc::new(Notify::new()),
        };
        let app = Router::new()
            .route("/socket.io/", get(poll).post(push))
            .with_state(state);

        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            origin: format!("http://{}", addr),
            frames,
            handle,
        }
    }

    /// Frames received from clients so far
    pub fn received(&self) -> Vec<String> {
        self.frames.lock().unwrap().clone()
    }
}

impl Drop for FakeSocketIo {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve(stream: TcpStream, behavior: Behavior, frames: Arc<Mutex<Vec<String>>>) {
    let ws = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(_) => return,
    };
    let (mut tx, mut rx) = ws.split();

    if tx.send(Message::text(OPEN_PACKET)).await.is_err() {
        return;
    }

    while let Some(Ok(message)) = rx.next().await {
        let text = match message {
            Message::Text(text) => text.to_string(),
            Message::Close(_) => break,
            _ => continue,
        };
        frames.lock().unwrap().push(text.clone());

        let replies = match react(&text, behavior) {
            Reaction::Reply(replies) => replies,
            Reaction::Close => break,
        };
        for reply in replies {
            if tx.send(Message::text(reply)).await.is_err() {
                return;
            }
        }
    }
}

/// Shared state of the polling server
#[derive(Clone)]
struct PollingState {
    behavior: Behavior,
    frames: Arc<Mutex<Vec<String>>>,
    /// Frames waiting for the next poll
    pending: Arc<Mutex<VecDeque<String>>>,
    ready: Arc<Notify>,
}

/// Handshake, or hold the poll until frames are queued
async fn poll(
    State(state): State<PollingState>,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, String) {
    if params.get("transport").map(String::as_str) != Some("polling") {
        return (StatusCode::BAD_REQUEST, "Transport unknown".to_string());
    }

    match params.get("sid").map(String::as_str) {
        // A ping rides along with the open packet
        None => (StatusCode::OK, join_payload(&[POLLING_OPEN_PACKET, "2"])),
        Some(POLLING_SID) => loop {
            let batch: Vec<String> = state.pending.lock().unwrap().drain(..).collect();
            if !batch.is_empty() {
                return (StatusCode::OK, join_payload(&batch));
            }
            if timeout(POLL_HOLD, state.ready.notified()).await.is_err() {
                return (StatusCode::OK, "6".to_string());
            }
        },
        Some(_) => (StatusCode::BAD_REQUEST, "Session ID unknown".to_string()),
    }
}

/// Accept a payload of client frames
async fn push(
    State(state): State<PollingState>,
    Query(params): Query<HashMap<String, String>>,
    body: String,
) -> (StatusCode, String) {
    if params.get("sid").map(String::as_str) != Some(POLLING_SID) {
        return (StatusCode::BAD_REQUEST, "Session ID unknown".to_string());
    }

    for frame in split_payload(&body) {
        state.frames.lock().unwrap().push(frame.to_string());
        if let Reaction::Reply(replies) = react(frame, state.behavior) {
            if !replies.is_empty() {
                state.pending.lock().unwrap().extend(replies);
                state.ready.notify_one();
            }
        }
    }
    (StatusCode::OK, "ok".to_string())
}
