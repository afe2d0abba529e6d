//! Cross-component scenarios.

mod keygen;
mod observation;
mod signing;
