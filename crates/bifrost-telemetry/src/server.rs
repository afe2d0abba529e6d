//! `GET /metrics` over HTTP.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tower_http::timeout::TimeoutLayer;
use tracing::{error, info};

use crate::{Metrics, TelemetryError};

/// Listener settings.
#[derive(Debug, Clone)]
pub struct MetricsServerConfig {
    /// Port bound on all interfaces
    pub listen_port: u16,
    /// Deadline for reading a request
    pub read_timeout: Duration,
    /// Deadline for producing the response
    pub write_timeout: Duration,
}

impl Default for MetricsServerConfig {
    fn default() -> Self {
        Self {
            listen_port: 9000,
            read_timeout: Duration::from_secs(30),
            write_timeout: Duration::from_secs(30),
        }
    }
}

/// Prometheus scrape endpoint.
pub struct MetricsServer {
    shutdown_tx: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
    local_addr: SocketAddr,
}

impl MetricsServer {
    /// Router serving `metrics` at `/metrics`.
    pub fn router(metrics: Arc<Metrics>, request_timeout: Duration) -> Router {
        Router::new()
            .route("/metrics", get(handle_metrics))
            .layer(TimeoutLayer::new(request_timeout))
            .with_state(metrics)
    }

    /// Bind and start serving in the background.
    pub async fn start(
        metrics: Arc<Metrics>,
        config: &MetricsServerConfig,
    ) -> Result<Self, TelemetryError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.listen_port));
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| TelemetryError::Bind(format!("{}: {}", addr, e)))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| TelemetryError::Bind(e.to_string()))?;

        let router = Self::router(metrics, config.read_timeout + config.write_timeout);
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        info!(addr = %local_addr, "Starting metrics server");
        let handle = tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.wait_for(|stop| *stop).await;
                })
                .await;
            if let Err(e) = result {
                error!(error = %e, "Metrics server error");
            }
        });

        Ok(Self {
            shutdown_tx,
            handle: Some(handle),
            local_addr,
        })
    }

    /// Address actually bound (useful with port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting connections and wait for the server task.
    pub async fn stop(&mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
        info!("Metrics server stopped");
    }
}

async fn handle_metrics(State(metrics): State<Arc<Metrics>>) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}
