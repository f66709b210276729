//! Framing errors for the varint length-prefixed wire format
//!
//! Every variant here is fatal at the connection level: once the length
//! prefix of the byte stream cannot be trusted there is no way to find the
//! next frame boundary, so callers discard the buffer and tear down.

use thiserror::Error;

/// Maximum encoded size of a 64-bit varint
pub const MAX_VARINT_LEN: usize = 10;

/// Wire framing errors with diagnostic context
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FramingError {
    /// Length prefix kept its continuation bit past the 10-byte limit
    #[error("Varint too long: continuation bit still set after {bytes_read} bytes (max {max})")]
    VarintTooLong { bytes_read: usize, max: usize },

    /// Length prefix carries data bits beyond the 64-bit range
    #[error("Varint overflow: byte {byte_index} shifts data past bit 63 (byte value {byte:#04x})")]
    VarintOverflow { byte_index: usize, byte: u8 },

    /// Declared frame length exceeds the negotiated maximum
    #[error("Frame too large: declared {declared} bytes exceeds maximum {max} (buffered: {buffered}, likely cause: {likely_cause})")]
    FrameTooLarge {
        declared: u64,
        max: usize,
        buffered: usize,
        likely_cause: String,
    },

    /// Outbound payload exceeds the negotiated maximum
    #[error("Payload too large to frame: {size} bytes exceeds maximum {max}")]
    PayloadTooLarge { size: usize, max: usize },
}

impl FramingError {
    /// Create a FrameTooLarge error, guessing at the cause from the magnitude
    pub fn frame_too_large(declared: u64, max: usize, buffered: usize) -> Self {
        let likely_cause = if declared > (max as u64).saturating_mul(1024) {
            "stream desynchronised or peer speaks a different protocol"
        } else {
            "peer sent a message above the configured limit"
        };

        Self::FrameTooLarge {
            declared,
            max,
            buffered,
            likely_cause: likely_cause.to_string(),
        }
    }

    /// Get error category for logging and metrics
    pub fn category(&self) -> &'static str {
        match self {
            FramingError::VarintTooLong { .. } => "varint_too_long",
            FramingError::VarintOverflow { .. } => "varint_overflow",
            FramingError::FrameTooLarge { .. } => "frame_too_large",
            FramingError::PayloadTooLarge { .. } => "payload_too_large",
        }
    }
}

/// Result type for framing operations
pub type FramingResult<T> = std::result::Result<T, FramingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_too_large_diagnosis() {
        let modest = FramingError::frame_too_large(2_000, 1_024, 10);
        let absurd = FramingError::frame_too_large(u64::MAX, 1_024, 10);

        match (&modest, &absurd) {
            (
                FramingError::FrameTooLarge { likely_cause: a, .. },
                FramingError::FrameTooLarge { likely_cause: b, .. },
            ) => {
                assert!(a.contains("configured limit"));
                assert!(b.contains("desynchronised"));
            }
            _ => panic!("Expected FrameTooLarge"),
        }
        assert_eq!(modest.category(), "frame_too_large");
    }

    #[test]
    fn test_error_display_includes_context() {
        let err = FramingError::VarintTooLong {
            bytes_read: 10,
            max: MAX_VARINT_LEN,
        };
        let text = err.to_string();
        assert!(text.contains("10 bytes"));
        assert!(text.contains("max 10"));
    }
}
