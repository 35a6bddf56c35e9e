//! Integration tests across Parley subsystems.
//!
//! Each module drives real subsystem instances over one in-memory bus; only
//! the transport and the session collaborators are mocked.

mod correlation;
mod lifecycle;
