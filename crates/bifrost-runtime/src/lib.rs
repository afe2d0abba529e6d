//! # bifrost-runtime
//!
//! Configuration loader and lifecycle of the `bifrost` daemon. The binary in
//! `main.rs` parses the command line, installs the tracing subscriber and
//! hands over to [`Bifrost`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod runtime;

pub use config::{BifrostConfig, ConfigError, MetricsConfig};
pub use runtime::{chain_db_path, Bifrost};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
