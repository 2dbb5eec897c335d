//! Named event listeners and the capture queue behind them
//!
//! Listeners are plain callbacks keyed by event name. They are invoked from
//! the connection's single driver task, so two callbacks never run at the same
//! time. The [`EventCapture`] installs one listener per inbound event that
//! pushes an immutable record onto a bounded queue; verification code drains
//! the queue afterwards instead of sharing mutable state with the callbacks.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// Capacity of the capture queue
pub const CAPTURE_CAPACITY: usize = 256;

/// Server events the harness listens for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InboundEvent {
    NewMessage,
    IncidentAssigned,
    IncidentUpdated,
    LocationUpdated,
    UserOnline,
    UserOffline,
}

impl InboundEvent {
    pub const ALL: [InboundEvent; 6] = [
        InboundEvent::NewMessage,
        InboundEvent::IncidentAssigned,
        InboundEvent::IncidentUpdated,
        InboundEvent::LocationUpdated,
        InboundEvent::UserOnline,
        InboundEvent::UserOffline,
    ];

    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            InboundEvent::NewMessage => "new_message",
            InboundEvent::IncidentAssigned => "incident_assigned",
            InboundEvent::IncidentUpdated => "incident_updated",
            InboundEvent::LocationUpdated => "location_updated",
            InboundEvent::UserOnline => "user_online",
            InboundEvent::UserOffline => "user_offline",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|event| event.name() == name)
    }
}

impl fmt::Display for InboundEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Type for listener IDs
pub type ListenerId = Uuid;

type Callback = Arc<dyn Fn(InboundEvent, Value) -> anyhow::Result<()> + Send + Sync>;

/// Callbacks keyed by inbound event
#[derive(Clone, Default)]
pub struct ListenerRegistry {
    listeners: HashMap<InboundEvent, Vec<(ListenerId, Callback)>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback for one event
    pub fn on<F>(&mut self, event: InboundEvent, callback: F) -> ListenerId
    where
        F: Fn(InboundEvent, Value) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = Uuid::new_v4();
        self.listeners
            .entry(event)
            .or_default()
            .push((id, Arc::new(callback)));
        debug!(listener_id = %id, event = %event, "Registered listener");
        id
    }

    /// Total number of callbacks
    pub fn len(&self) -> usize {
        self.listeners.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invoke every callback registered for `name`, returning how many ran
    ///
    /// Unknown events are ignored. A failing callback is logged and does not
    /// stop the others.
    pub fn dispatch(&self, name: &str, payload: Value) -> usize {
        let Some(event) = InboundEvent::from_name(name) else {
            debug!(event = name, "Ignoring unregistered event");
            return 0;
        };
        let Some(callbacks) = self.listeners.get(&event) else {
            debug!(event = name, "No listener for event");
            return 0;
        };

        for (id, callback) in callbacks {
            if let Err(e) = callback(event, payload.clone()) {
                error!(listener_id = %id, event = name, error = %e, "Listener failed");
            }
        }
        callbacks.len()
    }
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listeners", &self.len())
            .finish()
    }
}

/// One event as it arrived
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObservedEvent {
    pub event: InboundEvent,
    pub payload: Value,
    pub received_at: DateTime<Utc>,
}

/// Drained contents of the capture queue, in arrival order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObservationLog {
    /// Payloads of `new_message`
    pub messages: Vec<Value>,
    /// Every other event, tagged with its name
    pub events: Vec<ObservedEvent>,
}

impl ObservationLog {
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty() && self.events.is_empty()
    }

    /// Distinct names of the non-message events, in first-seen order
    pub fn event_names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        for observed in &self.events {
            let name = observed.event.name();
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }
}

/// Bounded queue fed by listeners
pub struct EventCapture {
    sender: mpsc::Sender<ObservedEvent>,
    receiver: mpsc::Receiver<ObservedEvent>,
}

impl EventCapture {
    pub fn new() -> Self {
        Self::with_capacity(CAPTURE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity);
        Self { sender, receiver }
    }

    /// Register a capturing listener for every inbound event
    pub fn install(&self, registry: &mut ListenerRegistry) {
        for event in InboundEvent::ALL {
            let sender = self.sender.clone();
            registry.on(event, move |event, payload| {
                let observed = ObservedEvent {
                    event,
                    payload,
                    received_at: Utc::now(),
                };
                match sender.try_send(observed) {
                    Ok(()) => Ok(()),
                    Err(mpsc::error::TrySendError::Full(dropped)) => {
                        warn!(event = %dropped.event, "Capture queue full, dropping event");
                        Ok(())
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => {
                        Err(anyhow!("capture queue is closed"))
                    }
                }
            });
        }
    }

    /// Take everything captured so far
    pub fn drain(&mut self) -> ObservationLog {
        let mut log = ObservationLog::default();
        while let Ok(observed) = self.receiver.try_recv() {
            if observed.event == InboundEvent::NewMessage {
                log.messages.push(observed.payload);
            } else {
                log.events.push(observed);
            }
        }
        log
    }
}

impl Default for EventCapture {
    fn default() -> Self {
        Self::new()
    }
}
