//! Black-box integration harness for the Stadtwache backend
//!
//! Two suites share this crate: the [`sequencer`] drives the REST API through
//! a fixed catalog of dependent cases, and the [`realtime`] verifier checks the
//! Socket.IO channel. Both produce a [`SuiteReport`].

pub mod api;
pub mod config;
pub mod error;
pub mod fixtures;
pub mod http_client;
pub mod realtime;
pub mod report;
pub mod sequencer;
pub mod session;

use tracing_subscriber::{filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

pub use api::ApiClient;
pub use config::{AdminCredentials, ApiConfig, HarnessConfig, RealtimeConfig};
pub use error::{FailureKind, HarnessError, HarnessResult};
pub use realtime::EventVerifier;
pub use report::{Outcome, SuiteReport, Summary, TestRecord};
pub use sequencer::Sequencer;
pub use session::{AuthenticatedUser, CarriedReferences, EntityRole, Session};

/// Filter used when `RUST_LOG` is not set
pub const DEFAULT_LOG_FILTER: &str = "stadtwache_harness=info,warn";

/// Install the global tracing subscriber
///
/// Honors `RUST_LOG`. Calling it twice is harmless; the second call is ignored.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            if cfg!(debug_assertions) {
                "stadtwache_harness=debug,warn".into()
            } else {
                DEFAULT_LOG_FILTER.into()
            }
        }))
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .try_init();
}
