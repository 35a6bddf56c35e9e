//! # Shared Types Crate
//!
//! Types shared by every Parley subsystem: correlation keys, the envelopes
//! the transport publishes, request/response payloads, connection state and
//! the `RemoteService` port.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: All cross-subsystem types are defined here.
//! - **Envelope Owns Correlation**: Payloads never carry correlation data;
//!   `OutboundRequest` and the envelopes do.
//! - **Explicit Matching**: Key matching is a plain function
//!   (`CorrelationKey::matches`), never a runtime type check.

pub mod correlation;
pub mod entities;
pub mod envelope;
pub mod errors;
pub mod ipc;
pub mod remote;

pub use correlation::CorrelationKey;
pub use entities::*;
pub use envelope::{ErrorCode, ErrorEnvelope, ResponseEnvelope};
pub use errors::*;
pub use ipc::*;
pub use remote::RemoteService;
