//! Engine.IO transports
//!
//! A transport performs the Engine.IO handshake and then exposes the
//! connection as two text-frame channels backed by a reader and a writer
//! task. The client never touches sockets or HTTP directly.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::{
    connect_async, tungstenite::protocol::Message as WsMessage, MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, info, warn};

use super::protocol::{join_payload, split_payload, EnginePacket, Handshake, ENGINE_IO_VERSION};
use crate::error::{HarnessError, HarnessResult};

/// Buffer size of the frame channels
pub const FRAME_CHANNEL_CAPACITY: usize = 64;

/// Where the Socket.IO server lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// `http(s)://host[:port]` without a trailing slash
    pub origin: String,
    /// Mount path, e.g. `/socket.io`
    pub path: String,
}

impl Endpoint {
    pub fn new(origin: &str, path: &str) -> Self {
        let path = path.trim_end_matches('/');
        Self {
            origin: origin.trim_end_matches('/').to_string(),
            path: if path.starts_with('/') {
                path.to_string()
            } else {
                format!("/{}", path)
            },
        }
    }

    /// `ws(s)://` URL for the websocket transport
    pub fn websocket_url(&self) -> String {
        let origin = if let Some(rest) = self.origin.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = self.origin.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            self.origin.clone()
        };
        format!(
            "{}{}/?EIO={}&transport=websocket",
            origin, self.path, ENGINE_IO_VERSION
        )
    }

    /// Polling URL with a fresh cache buster and, once known, the session id
    pub fn polling_url(&self, sid: Option<&str>) -> String {
        let mut url = format!(
            "{}{}/?EIO={}&transport=polling&t={}",
            self.origin,
            self.path,
            ENGINE_IO_VERSION,
            cache_buster()
        );
        if let Some(sid) = sid {
            url.push_str("&sid=");
            url.push_str(sid);
        }
        url
    }
}

fn cache_buster() -> String {
    std::iter::repeat_with(fastrand::alphanumeric).take(8).collect()
}

/// An open transport
pub struct TransportChannels {
    pub handshake: Handshake,
    /// Frames to send to the server
    pub outbound: mpsc::Sender<String>,
    /// Frames received from the server; closes when the connection ends
    pub inbound: mpsc::Receiver<String>,
    pub reader: JoinHandle<()>,
    pub writer: JoinHandle<()>,
}

/// A way of reaching the Engine.IO server
#[async_trait]
pub trait Transport: Send + Sync {
    /// Name used in logs and reports
    fn name(&self) -> &'static str;

    /// Handshake and start the frame pumps; the handshake is bounded by `handshake_timeout`
    async fn open(
        &self,
        endpoint: &Endpoint,
        handshake_timeout: Duration,
    ) -> HarnessResult<TransportChannels>;
}

/// Native websocket transport
#[derive(Debug, Clone, Default)]
pub struct WebSocketTransport;

#[async_trait]
impl Transport for WebSocketTransport {
    fn name(&self) -> &'static str {
        "websocket"
    }

    async fn open(
        &self,
        endpoint: &Endpoint,
        handshake_timeout: Duration,
    ) -> HarnessResult<TransportChannels> {
        let url = endpoint.websocket_url();
        info!(%url, "Opening websocket transport");

        let (handshake, mut sink, mut source) =
            match timeout(handshake_timeout, websocket_handshake(&url)).await {
                Ok(result) => result?,
                Err(_) => {
                    return Err(HarnessError::realtime(format!(
                        "websocket handshake timed out after {}ms",
                        handshake_timeout.as_millis()
                    )))
                }
            };
        debug!(sid = %handshake.sid, "Websocket handshake complete");

        let (inbound_tx, inbound_rx) = mpsc::channel::<String>(FRAME_CHANNEL_CAPACITY);
        let (outbound_tx, mut outbound_rx) = mpsc::channel::<String>(FRAME_CHANNEL_CAPACITY);

        let reader = tokio::spawn(async move {
            while let Some(message) = source.next().await {
                match message {
                    Ok(WsMessage::Text(text)) => {
                        if inbound_tx.send(text.to_string()).await.is_err() {
                            break;
                        }
                    }
                    Ok(WsMessage::Close(frame)) => {
                        debug!("Websocket closed by server: {:?}", frame);
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, "Websocket read failed");
                        break;
                    }
                }
            }
            debug!("Websocket reader stopped");
        });

        let writer = tokio::spawn(async move {
            while let Some(frame) = outbound_rx.recv().await {
                if let Err(e) = sink.send(WsMessage::text(frame)).await {
                    warn!(error = %e, "Websocket write failed");
                    break;
                }
            }
            let _ = sink.close().await;
            debug!("Websocket writer stopped");
        });

        Ok(TransportChannels {
            handshake,
            outbound: outbound_tx,
            inbound: inbound_rx,
            reader,
            writer,
        })
    }
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connect and read frames until the engine open packet arrives
async fn websocket_handshake(
    url: &str,
) -> HarnessResult<(Handshake, SplitSink<WsStream, WsMessage>, SplitStream<WsStream>)> {
    let (stream, _) = connect_async(url)
        .await
        .map_err(|e| HarnessError::realtime(format!("websocket connection failed: {}", e)))?;
    let (sink, mut source) = stream.split();

    while let Some(message) = source.next().await {
        match message {
            Ok(WsMessage::Text(text)) => {
                return match EnginePacket::decode(&text.to_string())? {
                    EnginePacket::Open(handshake) => Ok((handshake, sink, source)),
                    other => Err(HarnessError::realtime(format!(
                        "expected open packet, got {:?}",
                        other
                    ))),
                };
            }
            Ok(WsMessage::Close(frame)) => {
                return Err(HarnessError::realtime(format!(
                    "server closed during handshake: {:?}",
                    frame
                )));
            }
            Ok(_) => {}
            Err(e) => return Err(HarnessError::realtime(format!("websocket error: {}", e))),
        }
    }
    Err(HarnessError::realtime("server closed during handshake"))
}

/// HTTP long-polling transport
#[derive(Debug, Clone)]
pub struct PollingTransport {
    client: reqwest::Client,
}

impl PollingTransport {
    pub fn new() -> HarnessResult<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| HarnessError::realtime(format!("failed to build polling client: {}", e)))?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for PollingTransport {
    fn name(&self) -> &'static str {
        "polling"
    }

    async fn open(
        &self,
        endpoint: &Endpoint,
        handshake_timeout: Duration,
    ) -> HarnessResult<TransportChannels> {
        let url = endpoint.polling_url(None);
        info!(%url, "Opening polling transport");

        let body = self
            .client
            .get(&url)
            .timeout(handshake_timeout)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| HarnessError::realtime(format!("polling handshake failed: {}", e)))?
            .text()
            .await
            .map_err(|e| HarnessError::realtime(format!("polling handshake failed: {}", e)))?;

        let mut packets = split_payload(&body).into_iter();
        let handshake = match packets.next().map(EnginePacket::decode).transpose()? {
            Some(EnginePacket::Open(handshake)) => handshake,
            other => {
                return Err(HarnessError::realtime(format!(
                    "expected open packet, got {:?}",
                    other
                )))
            }
        };
        let leftover: Vec<String> = packets.map(str::to_string).collect();
        debug!(sid = %handshake.sid, "Polling handshake complete");

        // A poll may legitimately hang for a full ping cycle
        let poll_timeout = Duration::from_millis(handshake.ping_interval + handshake.ping_timeout)
            + handshake_timeout;

        let (inbound_tx, inbound_rx) = mpsc::channel::<String>(FRAME_CHANNEL_CAPACITY);
        let (outbound_tx, mut outbound_rx) = mpsc::channel::<String>(FRAME_CHANNEL_CAPACITY);

        let client = self.client.clone();
        let poll_endpoint = endpoint.clone();
        let sid = handshake.sid.clone();
        let reader = tokio::spawn(async move {
            for packet in leftover {
                if inbound_tx.send(packet).await.is_err() {
                    return;
                }
            }
            loop {
                let url = poll_endpoint.polling_url(Some(&sid));
                let response = client.get(&url).timeout(poll_timeout).send().await;
                let body = match response {
                    Ok(response) if response.status().is_success() => match response.text().await {
                        Ok(body) => body,
                        Err(e) => {
                            warn!(error = %e, "Polling read failed");
                            break;
                        }
                    },
                    Ok(response) => {
                        debug!(status = %response.status(), "Polling session ended");
                        break;
                    }
                    Err(e) => {
                        warn!(error = %e, "Polling request failed");
                        break;
                    }
                };
                for packet in split_payload(&body) {
                    if inbound_tx.send(packet.to_string()).await.is_err() {
                        return;
                    }
                }
            }
            debug!("Polling reader stopped");
        });

        let client = self.client.clone();
        let post_endpoint = endpoint.clone();
        let sid = handshake.sid.clone();
        let writer = tokio::spawn(async move {
            while let Some(frame) = outbound_rx.recv().await {
                // Everything queued so far goes out in one payload
                let mut batch = vec![frame];
                while let Ok(next) = outbound_rx.try_recv() {
                    batch.push(next);
                }

                let url = post_endpoint.polling_url(Some(&sid));
                let result = client
                    .post(&url)
                    .header("Content-Type", "text/plain;charset=UTF-8")
                    .body(join_payload(&batch))
                    .timeout(handshake_timeout)
                    .send()
                    .await;
                match result {
                    Ok(response) if response.status().is_success() => {}
                    Ok(response) => {
                        warn!(status = %response.status(), "Polling write rejected");
                        break;
                    }
                    Err(e) => {
                        warn!(error = %e, "Polling write failed");
                        break;
                    }
                }
            }
            debug!("Polling writer stopped");
        });

        Ok(TransportChannels {
            handshake,
            outbound: outbound_tx,
            inbound: inbound_rx,
            reader,
            writer,
        })
    }
}

/// Transports in the order they are attempted
pub fn default_transports() -> HarnessResult<Vec<Box<dyn Transport>>> {
    Ok(vec![
        Box::new(WebSocketTransport),
        Box::new(PollingTransport::new()?),
    ])
}
