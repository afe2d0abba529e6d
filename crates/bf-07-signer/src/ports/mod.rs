//! Ports for the signer.

pub mod inbound;
