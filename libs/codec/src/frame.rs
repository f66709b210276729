//! # Frame Codec - Varint Length-Prefixed Framing
//!
//! ## Purpose
//!
//! Splits an ordered byte stream into discrete payloads. Each frame on the
//! wire is `<varint length><payload bytes>`; frames are written back to back
//! with no padding or delimiter.
//!
//! ## Decoding Model
//!
//! Socket reads arrive in arbitrary chunks. The codec accumulates them in a
//! `BytesMut` and hands back complete payloads as zero-copy `Bytes` slices:
//!
//! ```text
//! read #1: [05 h e l]            -> need more bytes
//! read #2: [l o 02 h i 03 a]     -> "hello", "hi", need more bytes
//! read #3: [b c]                 -> "abc"
//! ```
//!
//! A length prefix above `max_message_size`, or a malformed prefix, is fatal:
//! the buffered bytes are discarded and the error is returned. There is no
//! attempt to resynchronise on a stream whose boundaries can't be trusted.

use crate::error::{FramingError, FramingResult};
use crate::varint::{decode_varint, encode_varint, encoded_len};
use bytes::{Buf, Bytes, BytesMut};
use tracing::{debug, error};

/// Default maximum payload size (16MB)
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Initial capacity of the accumulation buffer (64KB)
const INITIAL_BUFFER_CAPACITY: usize = 64 * 1024;

/// Encode one payload as a frame, enforcing the size limit
pub fn encode_frame(payload: &[u8], max_message_size: usize) -> FramingResult<Bytes> {
    if payload.len() > max_message_size {
        return Err(FramingError::PayloadTooLarge {
            size: payload.len(),
            max: max_message_size,
        });
    }

    let mut buf = BytesMut::with_capacity(encoded_len(payload.len() as u64) + payload.len());
    encode_frame_into(payload, &mut buf);
    Ok(buf.freeze())
}

/// Append a frame for `payload` to `buf` without checking limits
pub fn encode_frame_into(payload: &[u8], buf: &mut BytesMut) {
    encode_varint(payload.len() as u64, buf);
    buf.extend_from_slice(payload);
}

/// Stateful stream decoder and frame encoder
#[derive(Debug)]
pub struct FrameCodec {
    max_message_size: usize,
    buffer: BytesMut,
    frames_decoded: u64,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MESSAGE_SIZE)
    }
}

impl FrameCodec {
    /// Create a codec enforcing `max_message_size` on both directions
    pub fn new(max_message_size: usize) -> Self {
        Self {
            max_message_size,
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            frames_decoded: 0,
        }
    }

    pub fn max_message_size(&self) -> usize {
        self.max_message_size
    }

    /// Bytes received but not yet returned as a frame
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Frames decoded since construction or the last reset
    pub fn frames_decoded(&self) -> u64 {
        self.frames_decoded
    }

    /// Encode one payload as a frame
    pub fn encode(&self, payload: &[u8]) -> FramingResult<Bytes> {
        encode_frame(payload, self.max_message_size)
    }

    /// Append freshly read bytes to the accumulation buffer
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Pull the next complete frame out of the buffer, if any
    pub fn decode_next(&mut self) -> FramingResult<Option<Bytes>> {
        let (declared, header_len) = match decode_varint(&self.buffer) {
            Ok(Some(prefix)) => prefix,
            Ok(None) => return Ok(None),
            Err(e) => {
                error!(
                    buffered = self.buffer.len(),
                    category = e.category(),
                    "Corrupt length prefix, discarding stream buffer"
                );
                self.discard();
                return Err(e);
            }
        };

        if declared > self.max_message_size as u64 {
            let err = FramingError::frame_too_large(declared, self.max_message_size, self.buffer.len());
            error!(
                declared,
                max = self.max_message_size,
                "Oversized frame, discarding stream buffer"
            );
            self.discard();
            return Err(err);
        }

        let payload_len = declared as usize;
        let frame_len = header_len + payload_len;
        if self.buffer.len() < frame_len {
            self.buffer.reserve(frame_len - self.buffer.len());
            return Ok(None);
        }

        self.buffer.advance(header_len);
        let payload = self.buffer.split_to(payload_len).freeze();
        self.frames_decoded += 1;
        Ok(Some(payload))
    }

    /// Append `data` and return every frame that is now complete, in order
    pub fn decode(&mut self, data: &[u8]) -> FramingResult<Vec<Bytes>> {
        self.extend(data);

        let mut frames = Vec::new();
        while let Some(frame) = self.decode_next()? {
            frames.push(frame);
        }

        if !frames.is_empty() {
            debug!(
                frames = frames.len(),
                remaining = self.buffer.len(),
                "Decoded frames from stream buffer"
            );
        }
        Ok(frames)
    }

    /// Drop all buffered state so the codec can serve a new session
    pub fn reset(&mut self) {
        self.discard();
        self.frames_decoded = 0;
    }

    fn discard(&mut self) {
        self.buffer = BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY);
    }
}
