//! Ports for the threshold service client.

pub mod inbound;
