//! Chain client domain: configuration, account view and errors.

pub mod account;
pub mod config;
pub mod errors;

pub use account::Account;
pub use config::ChainConfiguration;
pub use errors::ChainClientError;
