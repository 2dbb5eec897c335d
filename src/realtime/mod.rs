//! Socket.IO event verification
//!
//! Layers, bottom up: the text packet codec, the Engine.IO transports, the
//! listener registry with its capture queue, the connection client and the
//! verifier that runs the three real-time checks.

pub mod client;
pub mod listeners;
pub mod protocol;
pub mod transport;
pub mod verifier;

pub use client::{ConnectionState, RealtimeClient};
pub use listeners::{EventCapture, InboundEvent, ListenerRegistry, ObservationLog, ObservedEvent};
pub use transport::{Endpoint, PollingTransport, Transport, WebSocketTransport};
pub use verifier::EventVerifier;
