//! # Bifrost Telemetry
//!
//! Observability plumbing shared by every Bifrost component.
//!
//! - **Metrics**: a [`Metrics`] value owning its own Prometheus registry.
//!   It is created once by the runtime and handed to each component as
//!   `Arc<Metrics>`; there are no package-level singletons.
//! - **Logging**: `tracing` subscriber setup driven by [`TelemetryConfig`].
//! - **HTTP**: [`MetricsServer`] serves `GET /metrics` in Prometheus text
//!   format.
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `BIFROST_LOG_LEVEL` / `RUST_LOG` | `info` | Log filter |
//! | `BIFROST_JSON_LOGS` | `false` (`true` in containers) | JSON log lines |
//! | `BIFROST_CONSOLE_OUTPUT` | `true` | Write logs to stdout |
//! | `NET` | `testnet` | Network name attached to the startup line |

#![warn(missing_docs)]
#![warn(clippy::all)]

mod config;
mod metrics;
mod server;
mod tracing_setup;

pub use config::TelemetryConfig;
pub use metrics::{names, HistogramTimer, Metrics};
pub use server::{MetricsServer, MetricsServerConfig};
pub use tracing_setup::init_tracing;

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// Subscriber could not be installed.
    #[error("Failed to initialize tracing: {0}")]
    TracerInit(String),

    /// A metric could not be created or registered.
    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    /// The metrics listener could not be bound.
    #[error("Failed to bind metrics server: {0}")]
    Bind(String),
}

impl From<prometheus::Error> for TelemetryError {
    fn from(err: prometheus::Error) -> Self {
        TelemetryError::MetricsInit(err.to_string())
    }
}

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
