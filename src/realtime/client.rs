use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::{mpsc, Notify, RwLock};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

use super::listeners::ListenerRegistry;
use super::protocol::{EnginePacket, SocketPacket, DEFAULT_NAMESPACE};
use super::transport::{default_transports, Endpoint, Transport, TransportChannels};
use crate::config::RealtimeConfig;
use crate::error::{HarnessError, HarnessResult};

/// How long teardown waits for the close frames to be flushed
const CLOSE_FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

/// Lifecycle of the real-time connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// Room join requests were sent
    Joined,
    /// A message was sent and the client is waiting for events
    Active,
}

impl ConnectionState {
    /// Whether events can be emitted
    pub fn is_connected(&self) -> bool {
        *self >= ConnectionState::Connected
    }
}

/// Pieces of a live connection
struct LiveConnection {
    transport: &'static str,
    sid: String,
    outbound: mpsc::Sender<String>,
    driver: JoinHandle<()>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

/// Socket.IO client driving one connection
///
/// Listeners are fixed at construction. Incoming frames are handled on a
/// single driver task which answers pings, tracks the connect acknowledgement
/// and dispatches events to the listeners.
pub struct RealtimeClient {
    endpoint: Endpoint,
    handshake_timeout: Duration,
    settle_delay: Duration,
    transports: Vec<Box<dyn Transport>>,
    listeners: Arc<ListenerRegistry>,
    state: Arc<RwLock<ConnectionState>>,
    acknowledged: Arc<Notify>,
    /// Reason given by the server when it refused the namespace connect
    refusal: Arc<RwLock<Option<String>>>,
    live: Option<LiveConnection>,
}

impl RealtimeClient {
    /// Client using websocket with polling fallback
    pub fn new(config: &RealtimeConfig, listeners: ListenerRegistry) -> HarnessResult<Self> {
        Ok(Self::with_transports(config, listeners, default_transports()?))
    }

    /// Client with an explicit transport order
    pub fn with_transports(
        config: &RealtimeConfig,
        listeners: ListenerRegistry,
        transports: Vec<Box<dyn Transport>>,
    ) -> Self {
        Self {
            endpoint: Endpoint::new(&config.origin, &config.path),
            handshake_timeout: config.handshake_timeout,
            settle_delay: config.settle_delay,
            transports,
            listeners: Arc::new(listeners),
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            acknowledged: Arc::new(Notify::new()),
            refusal: Arc::new(RwLock::new(None)),
            live: None,
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub async fn state(&self) -> ConnectionState {
        *self.state.read().await
    }

    /// Name of the transport in use, if connected
    pub fn transport(&self) -> Option<&'static str> {
        self.live.as_ref().map(|live| live.transport)
    }

    /// Engine.IO session id, if connected
    pub fn sid(&self) -> Option<&str> {
        self.live.as_ref().map(|live| live.sid.as_str())
    }

    /// Handshake, join the default namespace and wait out the settle delay
    ///
    /// Succeeds once the server acknowledged the namespace connect within the
    /// settle delay. Transports are tried in order until one opens.
    #[instrument(skip(self), fields(origin = %self.endpoint.origin))]
    pub async fn connect(&mut self) -> HarnessResult<()> {
        if self.state().await.is_connected() {
            return Ok(());
        }
        self.set_state(ConnectionState::Connecting).await;
        *self.refusal.write().await = None;

        let mut last_error = HarnessError::realtime("no transports configured");
        let mut opened = None;
        for transport in &self.transports {
            match transport.open(&self.endpoint, self.handshake_timeout).await {
                Ok(channels) => {
                    info!(transport = transport.name(), sid = %channels.handshake.sid, "Transport open");
                    opened = Some((transport.name(), channels));
                    break;
                }
                Err(e) => {
                    warn!(transport = transport.name(), error = %e, "Transport failed, trying next");
                    last_error = e;
                }
            }
        }

        let (name, channels) = match opened {
            Some(opened) => opened,
            None => {
                self.set_state(ConnectionState::Disconnected).await;
                return Err(last_error);
            }
        };

        let TransportChannels {
            handshake,
            outbound,
            inbound,
            reader,
            writer,
        } = channels;

        let driver = tokio::spawn(drive(
            inbound,
            outbound.clone(),
            Arc::clone(&self.listeners),
            Arc::clone(&self.state),
            Arc::clone(&self.acknowledged),
            Arc::clone(&self.refusal),
        ));
        self.live = Some(LiveConnection {
            transport: name,
            sid: handshake.sid,
            outbound: outbound.clone(),
            driver,
            reader,
            writer,
        });

        if outbound.send(SocketPacket::connect().to_frame()).await.is_err() {
            self.disconnect().await;
            return Err(HarnessError::realtime("connection closed before namespace connect"));
        }

        let _ = timeout(self.settle_delay, self.acknowledged.notified()).await;
        if self.state().await.is_connected() {
            info!(transport = name, "Real-time connection established");
            Ok(())
        } else {
            let refused = self.refusal.read().await.clone();
            self.disconnect().await;
            Err(HarnessError::realtime(match refused {
                Some(reason) => format!("server refused the connection: {}", reason),
                None => format!(
                    "server did not acknowledge the connection within {}ms",
                    self.settle_delay.as_millis()
                ),
            }))
        }
    }

    /// Emit a named event with one argument
    pub async fn emit(&self, name: &str, data: Value) -> HarnessResult<()> {
        if !self.state().await.is_connected() {
            return Err(HarnessError::NotConnected);
        }
        let live = self.live.as_ref().ok_or(HarnessError::NotConnected)?;

        debug!(event = name, "Emitting event");
        live.outbound
            .send(SocketPacket::event(name, data).to_frame())
            .await
            .map_err(|_| HarnessError::realtime(format!("connection closed while emitting '{}'", name)))
    }

    /// Move to a later lifecycle state; ignored unless connected
    pub async fn advance(&self, to: ConnectionState) {
        let mut state = self.state.write().await;
        if state.is_connected() && to > *state {
            *state = to;
        }
    }

    /// Leave the namespace, close the engine session and stop all tasks
    ///
    /// Safe to call repeatedly.
    pub async fn disconnect(&mut self) {
        let Some(live) = self.live.take() else {
            self.set_state(ConnectionState::Disconnected).await;
            return;
        };

        // Stop dispatching first so no listener fires after this point
        live.driver.abort();

        let _ = live.outbound.send(SocketPacket::disconnect().to_frame()).await;
        let _ = live.outbound.send(EnginePacket::Close.encode()).await;
        drop(live.outbound);

        let mut writer = live.writer;
        if timeout(CLOSE_FLUSH_TIMEOUT, &mut writer).await.is_err() {
            debug!("Close frames were not flushed in time");
            writer.abort();
        }
        live.reader.abort();

        self.set_state(ConnectionState::Disconnected).await;
        info!(transport = live.transport, "Real-time connection closed");
    }

    async fn set_state(&self, to: ConnectionState) {
        *self.state.write().await = to;
    }
}

impl Drop for RealtimeClient {
    fn drop(&mut self) {
        if let Some(live) = self.live.take() {
            live.driver.abort();
            live.reader.abort();
            live.writer.abort();
        }
    }
}

/// Handle inbound frames until the connection ends
async fn drive(
    mut inbound: mpsc::Receiver<String>,
    outbound: mpsc::Sender<String>,
    listeners: Arc<ListenerRegistry>,
    state: Arc<RwLock<ConnectionState>>,
    acknowledged: Arc<Notify>,
    refusal: Arc<RwLock<Option<String>>>,
) {
    while let Some(frame) = inbound.recv().await {
        let packet = match EnginePacket::decode(&frame) {
            Ok(packet) => packet,
            Err(e) => {
                warn!(error = %e, "Dropping malformed frame");
                continue;
            }
        };

        match packet {
            EnginePacket::Ping(data) => {
                if outbound.send(EnginePacket::Pong(data).encode()).await.is_err() {
                    break;
                }
            }
            EnginePacket::Message(body) => match SocketPacket::decode(&body) {
                Ok(packet) if packet.namespace() != DEFAULT_NAMESPACE => {
                    debug!(namespace = packet.namespace(), "Ignoring packet for another namespace");
                }
                Ok(SocketPacket::Connect { data, .. }) => {
                    debug!(?data, "Namespace connect acknowledged");
                    {
                        let mut current = state.write().await;
                        if !current.is_connected() {
                            *current = ConnectionState::Connected;
                        }
                    }
                    acknowledged.notify_one();
                }
                Ok(SocketPacket::Event { name, args, .. }) => {
                    let payload = args.into_iter().next().unwrap_or(Value::Null);
                    listeners.dispatch(&name, payload);
                }
                Ok(SocketPacket::Disconnect { .. }) => {
                    info!("Server closed the namespace");
                    break;
                }
                Ok(SocketPacket::ConnectError { data, .. }) => {
                    let reason = refusal_reason(data.as_ref());
                    warn!(%reason, "Namespace connect refused");
                    *refusal.write().await = Some(reason);
                    acknowledged.notify_one();
                    break;
                }
                Ok(SocketPacket::Ack { ack_id, .. }) => {
                    debug!(ack_id, "Ignoring ack");
                }
                Err(e) => warn!(error = %e, "Dropping malformed socket packet"),
            },
            EnginePacket::Close => {
                info!("Server closed the engine session");
                break;
            }
            other => debug!(?other, "Ignoring engine packet"),
        }
    }

    *state.write().await = ConnectionState::Disconnected;
    debug!("Driver stopped");
}

/// Human-readable reason from a connect error payload
fn refusal_reason(data: Option<&Value>) -> String {
    match data {
        Some(Value::Object(map)) => match map.get("message").and_then(Value::as_str) {
            Some(message) => message.to_string(),
            None => Value::Object(map.clone()).to_string(),
        },
        Some(Value::String(message)) => message.clone(),
        Some(other) => other.to_string(),
        None => "no reason given".to_string(),
    }
}
