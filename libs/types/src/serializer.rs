//! Serializer seam between framed bytes and typed envelopes
//!
//! The transport only ever sees opaque payload bytes. Anything able to turn
//! an [`Envelope`] into bytes and back can sit behind [`EnvelopeSerializer`];
//! [`BincodeSerializer`] is the implementation used unless one is injected.

use crate::envelope::Envelope;
use thiserror::Error;

/// Envelope (de)serialization failures
///
/// A deserialization failure affects one frame only: the receive loop drops
/// it and keeps reading.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SerializationError {
    #[error("Failed to serialize envelope {id}: {reason}")]
    Encode { id: u64, reason: String },

    #[error("Failed to deserialize {len}-byte payload: {reason}")]
    Decode { len: usize, reason: String },
}

impl SerializationError {
    pub fn category(&self) -> &'static str {
        match self {
            SerializationError::Encode { .. } => "encode",
            SerializationError::Decode { .. } => "decode",
        }
    }
}

pub type SerializationResult<T> = std::result::Result<T, SerializationError>;

pub trait EnvelopeSerializer: Send + Sync {
    fn serialize(&self, envelope: &Envelope) -> SerializationResult<Vec<u8>>;

    fn deserialize(&self, bytes: &[u8]) -> SerializationResult<Envelope>;
}

/// Serde + bincode envelope encoding
#[cfg(feature = "bincode-serializer")]
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeSerializer;

#[cfg(feature = "bincode-serializer")]
impl EnvelopeSerializer for BincodeSerializer {
    fn serialize(&self, envelope: &Envelope) -> SerializationResult<Vec<u8>> {
        bincode::serialize(envelope).map_err(|e| SerializationError::Encode {
            id: envelope.id,
            reason: e.to_string(),
        })
    }

    fn deserialize(&self, bytes: &[u8]) -> SerializationResult<Envelope> {
        bincode::deserialize(bytes).map_err(|e| SerializationError::Decode {
            len: bytes.len(),
            reason: e.to_string(),
        })
    }
}
