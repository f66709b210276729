//! # Tapline Types
//!
//! Message schema shared by every Tapline crate.
//!
//! ## Contents
//!
//! - **Envelope**: `{ id, payload }`, the unit carried inside one wire frame.
//!   `id == 0` marks a server push, any other id correlates a response with
//!   the request that carried it.
//! - **Payload**: every request, response and push message the proxy speaks
//! - **Records**: targets, samples, status and session descriptors
//! - **EnvelopeSerializer**: the seam between framed bytes and envelopes
//!
//! ## Quick Start
//!
//! ```rust
//! use types::{BincodeSerializer, Envelope, EnvelopeSerializer, Payload};
//!
//! let serializer = BincodeSerializer::default();
//! let bytes = serializer.serialize(&Envelope::new(7, Payload::ListTargets)).unwrap();
//! let decoded = serializer.deserialize(&bytes).unwrap();
//! assert_eq!(decoded.id, 7);
//! ```
//!
//! ## What This Crate Does NOT Contain
//! - Framing (libs/codec)
//! - Transport, correlation or push routing (libs/network)
//! - Rate derivation or display formatting (libs/telemetry)

pub mod envelope;
pub mod records;
pub mod serializer;
pub mod time;

pub use envelope::{Envelope, Payload, PayloadClass, PUSH_ID};
pub use records::{
    AuthenticateRequest, ErrorBody, HistoryBatch, HistoryRequest, RuntimeConfig, Sample,
    SampleBatch, ServerStatus, ServerStatusUpdate, SessionInfo, SessionInfoUpdate, TargetId,
    TargetInfo, TargetSpec, TargetUpdate,
};
#[cfg(feature = "bincode-serializer")]
pub use serializer::BincodeSerializer;
pub use serializer::{EnvelopeSerializer, SerializationError, SerializationResult};
pub use time::{current_timestamp_ns, ns_to_secs};
