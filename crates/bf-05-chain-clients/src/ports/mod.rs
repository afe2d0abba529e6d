//! Ports for chain adapters.

pub mod inbound;
