//! # Bifrost Test Suite
//!
//! End-to-end scenarios wiring the real components to in-memory stores and
//! the mock consensus node, threshold service and chain adapter.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── harness.rs        # shared wiring
//! └── integration/
//!     ├── observation.rs  # scanner → observer → witness broadcast
//!     ├── signing.rs      # consensus instruction → signer → chain broadcast
//!     └── keygen.rs       # keygen → registry → observation
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p bifrost-tests
//! cargo test -p bifrost-tests integration::signing::
//! ```

pub mod harness;
pub mod integration;
