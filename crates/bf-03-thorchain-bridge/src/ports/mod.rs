//! Ports for the consensus bridge.

pub mod inbound;
