//! Ports for the block scanner.

pub mod inbound;
pub mod outbound;
