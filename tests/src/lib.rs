//! # Parley Test Suite
//!
//! Cross-subsystem tests for the Parley client.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── fixtures.rs       # Mock transport, scripted collaborators, harness
//! └── integration/      # Choreography across subsystems
//!     ├── correlation.rs  # Requester ↔ registry ↔ bus
//!     ├── lifecycle.rs    # Supervisor ↔ registry ↔ queue
//!     └── runtime.rs      # Full client runtime
//! tests/benches/
//! └── correlation_benchmarks.rs
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p pl-tests
//!
//! # One area
//! cargo test -p pl-tests integration::lifecycle
//!
//! # Benchmarks
//! cargo bench -p pl-tests
//! ```

#![allow(clippy::unwrap_used)]

pub mod fixtures;

#[cfg(test)]
pub mod integration;
