//! # Tapline Wire Codec
//!
//! ## Purpose
//!
//! The framing layer of the Tapline client. Turns a byte stream into discrete
//! payloads and back:
//! - Unsigned LEB128 varint length prefixes (max 10 bytes)
//! - Stateful accumulation of partial socket reads
//! - Fatal, non-resynchronising handling of oversized or corrupt prefixes
//! - Full reset for reuse across sessions
//!
//! ## Architecture Role
//!
//! ```text
//! socket bytes → [codec] → payload bytes → types::EnvelopeSerializer → Envelope
//!                   ↑
//!            network::SessionTransport owns one FrameCodec per client
//! ```
//!
//! ## What This Crate Does NOT Contain
//! - Envelope schema or serialization (belongs in libs/types)
//! - Socket management or connection handling (belongs in libs/network)

pub mod error;
pub mod frame;
pub mod varint;

pub use error::{FramingError, FramingResult, MAX_VARINT_LEN};
pub use frame::{encode_frame, encode_frame_into, FrameCodec, DEFAULT_MAX_MESSAGE_SIZE};
pub use varint::{decode_varint, encode_varint, encoded_len};
