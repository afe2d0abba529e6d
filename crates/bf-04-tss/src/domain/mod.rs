//! Threshold service domain: configuration, wire types and errors.

pub mod config;
pub mod errors;
pub mod types;

pub use config::TssConfig;
pub use errors::TssError;
pub use types::{
    assemble_signature, KeygenRequest, KeygenResponse, KeysignRequest, KeysignResponse, TssStatus,
};
