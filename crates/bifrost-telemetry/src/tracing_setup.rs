//! `tracing` subscriber installation. Called once by the binary; library
//! crates only emit events.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::{TelemetryConfig, TelemetryError};

type BoxedLayer = Box<dyn Layer<tracing_subscriber::Registry> + Send + Sync>;

fn output_layer(config: &TelemetryConfig) -> Option<BoxedLayer> {
    if !config.console_output {
        return None;
    }
    let layer = tracing_subscriber::fmt::layer().with_target(true);
    Some(if config.json_logs {
        layer
            .json()
            .with_current_span(false)
            .with_line_number(true)
            .boxed()
    } else {
        layer.compact().with_ansi(true).boxed()
    })
}

/// Install the global subscriber. An unparsable level falls back to
/// `RUST_LOG`.
///
/// Fails if a subscriber is already installed.
pub fn init_tracing(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let filter = EnvFilter::try_new(&config.log_level)
        .or_else(|_| EnvFilter::try_from_default_env())
        .map_err(|e| TelemetryError::TracerInit(e.to_string()))?;

    tracing_subscriber::registry()
        .with(output_layer(config))
        .with(filter)
        .try_init()
        .map_err(|e| TelemetryError::TracerInit(e.to_string()))?;

    tracing::info!(
        service = %config.service_name,
        network = %config.network,
        version = crate::VERSION,
        json = config.json_logs,
        "Logging to console"
    );
    Ok(())
}
