//! Ports for the public-key registry.

pub mod inbound;
pub mod outbound;
