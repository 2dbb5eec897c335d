use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Result alias used throughout the harness
pub type HarnessResult<T> = Result<T, HarnessError>;

/// Everything that can go wrong while driving the service under test
#[derive(Error, Debug, Clone)]
pub enum HarnessError {
    // Transport errors
    #[error("{method} {url} failed before a response arrived: {reason}")]
    Transport {
        method: String,
        url: String,
        reason: String,
    },

    #[error("{method} {url} timed out after {}s", .timeout.as_secs())]
    Timeout {
        method: String,
        url: String,
        timeout: Duration,
    },

    // Protocol / shape errors
    #[error("Unexpected response shape: {reason}")]
    Protocol {
        reason: String,
    },

    // Semantic errors
    #[error("Server rejected the request with status {status}: {body}")]
    Semantic {
        status: u16,
        body: String,
    },

    // Precondition errors
    #[error("Precondition not met: {reason}")]
    Precondition {
        reason: String,
    },

    // Real-time channel errors
    #[error("Real-time channel error: {reason}")]
    Realtime {
        reason: String,
    },

    #[error("Malformed packet '{packet}': {reason}")]
    Codec {
        packet: String,
        reason: String,
    },

    #[error("Real-time channel is not connected")]
    NotConnected,

    // Several independent lookups failed within one case
    #[error("{}", .parts.join("; "))]
    Combined {
        kind: FailureKind,
        parts: Vec<String>,
    },

    // Configuration errors
    #[error("Invalid configuration value for '{key}': {reason}")]
    ConfigInvalid {
        key: String,
        value: String,
        reason: String,
    },
}

/// Failure taxonomy a case failure is classified into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Connection refused, DNS failure, timeout
    Transport,
    /// Success status but the body has the wrong shape
    Protocol,
    /// The server rejected the operation
    Semantic,
    /// A dependent case ran without its prerequisite state
    Precondition,
    /// Bad harness configuration
    Configuration,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Transport => write!(f, "transport"),
            FailureKind::Protocol => write!(f, "protocol"),
            FailureKind::Semantic => write!(f, "semantic"),
            FailureKind::Precondition => write!(f, "precondition"),
            FailureKind::Configuration => write!(f, "configuration"),
        }
    }
}

impl HarnessError {
    /// Classify the error into the failure taxonomy
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Transport { .. } | Self::Timeout { .. } | Self::Realtime { .. } => {
                FailureKind::Transport
            }
            Self::NotConnected => FailureKind::Transport,
            Self::Protocol { .. } | Self::Codec { .. } => FailureKind::Protocol,
            Self::Semantic { .. } => FailureKind::Semantic,
            Self::Precondition { .. } => FailureKind::Precondition,
            Self::ConfigInvalid { .. } => FailureKind::Configuration,
            Self::Combined { kind, .. } => *kind,
        }
    }

    /// Label each failure and merge them; the first failure decides the kind
    pub fn combined(failures: Vec<(&str, HarnessError)>) -> Self {
        let kind = failures
            .first()
            .map(|(_, err)| err.kind())
            .unwrap_or(FailureKind::Protocol);
        let parts = failures
            .iter()
            .map(|(label, err)| format!("{}: {}", label, err))
            .collect();
        Self::Combined { kind, parts }
    }

    pub fn protocol(reason: impl Into<String>) -> Self {
        Self::Protocol {
            reason: reason.into(),
        }
    }

    pub fn precondition(reason: impl Into<String>) -> Self {
        Self::Precondition {
            reason: reason.into(),
        }
    }

    pub fn realtime(reason: impl Into<String>) -> Self {
        Self::Realtime {
            reason: reason.into(),
        }
    }

    pub fn codec(packet: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Codec {
            packet: packet.into(),
            reason: reason.into(),
        }
    }

    /// Build a semantic error, truncating very long bodies
    pub fn semantic(status: u16, body: &str) -> Self {
        const MAX_BODY: usize = 300;
        let body = if body.chars().count() > MAX_BODY {
            let cut: String = body.chars().take(MAX_BODY).collect();
            format!("{}...", cut)
        } else {
            body.to_string()
        };
        Self::Semantic { status, body }
    }

    /// Map a reqwest error onto the transport half of the taxonomy
    pub fn from_reqwest(
        method: &http::Method,
        url: &str,
        timeout: Duration,
        err: reqwest::Error,
    ) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                method: method.to_string(),
                url: url.to_string(),
                timeout,
            }
        } else {
            Self::Transport {
                method: method.to_string(),
                url: url.to_string(),
                reason: describe_reqwest(&err),
            }
        }
    }
}

/// Walk the source chain so DNS and connect failures keep their root cause
fn describe_reqwest(err: &reqwest::Error) -> String {
    let mut reason = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(inner) = source {
        reason.push_str(": ");
        reason.push_str(&inner.to_string());
        source = std::error::Error::source(inner);
    }
    reason
}

impl From<serde_json::Error> for HarnessError {
    fn from(err: serde_json::Error) -> Self {
        Self::protocol(format!("invalid JSON: {}", err))
    }
}
