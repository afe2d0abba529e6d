//! Adapters: HTTP transport, node key file and bridge views.

pub mod http;
pub mod keys;
pub mod sources;

pub use http::RetryingHttpClient;
pub use keys::Keys;
pub use sources::{BridgeHeightSource, BridgePubKeySource};
