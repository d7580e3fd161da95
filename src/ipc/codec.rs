//! Length-prefixed framing
//!
//! Wire format:
//! ```text
//!   [4 bytes: payload length (u32 BE)]
//!   [payload bytes (UTF-8 JSON)]
//! ```
//!
//! [`FrameDecoder`] turns an arbitrarily chunked byte stream back into
//! payloads. It is a pure state machine: callers push whatever bytes the
//! transport produced and pull complete frames out, so the same decoder works
//! over sockets, pipes, or in-memory buffers.

use bytes::{Buf, Bytes, BytesMut};
use thiserror::Error;

/// Size of the big-endian length prefix
pub const LENGTH_PREFIX_LEN: usize = 4;

/// Largest payload that may be encoded or accepted
pub const MAX_FRAME_LEN: usize = 10_000_000;

/// Transport-level framing failures. All of them are fatal to the connection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("frame length {len} exceeds maximum of {max} bytes")]
    Oversize { len: usize, max: usize },

    #[error("connection closed with {buffered} bytes of an incomplete frame buffered")]
    Truncated { buffered: usize },

    #[error("decoder rejected earlier data; stream is no longer trusted")]
    Poisoned,
}

/// Encode a payload as a frame using the default maximum
pub fn encode_frame(payload: &[u8]) -> Result<Vec<u8>, FrameError> {
    encode_frame_with_max(payload, MAX_FRAME_LEN)
}

/// Encode a payload as a frame, refusing payloads longer than `max`
pub fn encode_frame_with_max(payload: &[u8], max: usize) -> Result<Vec<u8>, FrameError> {
    let max = max.min(MAX_FRAME_LEN);
    if payload.len() > max {
        return Err(FrameError::Oversize {
            len: payload.len(),
            max,
        });
    }

    let mut buf = Vec::with_capacity(LENGTH_PREFIX_LEN + payload.len());
    // Cannot truncate: max <= MAX_FRAME_LEN < u32::MAX
    buf.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    buf.extend_from_slice(payload);
    Ok(buf)
}

/// Incremental frame decoder
#[derive(Debug)]
pub struct FrameDecoder {
    buf: BytesMut,
    max_frame_len: usize,
    poisoned: bool,
}

impl FrameDecoder {
    /// Create a decoder that accepts frames up to [`MAX_FRAME_LEN`]
    pub fn new() -> Self {
        Self::with_max_frame_len(MAX_FRAME_LEN)
    }

    /// Create a decoder with a lower frame ceiling
    ///
    /// Values above [`MAX_FRAME_LEN`] are clamped to it.
    pub fn with_max_frame_len(max_frame_len: usize) -> Self {
        Self {
            buf: BytesMut::new(),
            max_frame_len: max_frame_len.min(MAX_FRAME_LEN),
            poisoned: false,
        }
    }

    /// Append a chunk and return the frames that are now complete
    ///
    /// The returned iterator is lazy. Frames it does not yield stay buffered
    /// and come out of the next call, so dropping it early loses nothing.
    /// After an [`FrameError::Oversize`] the decoder is poisoned: it discards
    /// all further input and every later iterator yields
    /// [`FrameError::Poisoned`] once.
    pub fn feed(&mut self, chunk: &[u8]) -> Frames<'_> {
        if !self.poisoned {
            self.buf.extend_from_slice(chunk);
        }
        Frames {
            decoder: self,
            done: false,
        }
    }

    /// Bytes received but not yet emitted as a frame
    pub fn buffered_len(&self) -> usize {
        self.buf.len()
    }

    /// Whether an oversize frame has been seen
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Check that the stream ended on a frame boundary
    ///
    /// Call once the transport reports end-of-stream and every frame has been
    /// drained. Leftover bytes mean the peer stopped mid-frame.
    pub fn finish(&self) -> Result<(), FrameError> {
        if self.poisoned {
            return Err(FrameError::Poisoned);
        }
        if !self.buf.is_empty() {
            return Err(FrameError::Truncated {
                buffered: self.buf.len(),
            });
        }
        Ok(())
    }

    fn next_frame(&mut self) -> Option<Result<Bytes, FrameError>> {
        if self.buf.len() < LENGTH_PREFIX_LEN {
            return None;
        }

        let mut prefix = [0u8; LENGTH_PREFIX_LEN];
        prefix.copy_from_slice(&self.buf[..LENGTH_PREFIX_LEN]);
        let len = u32::from_be_bytes(prefix) as usize;

        // Checked before any space is reserved for the payload
        if len > self.max_frame_len {
            self.poisoned = true;
            self.buf = BytesMut::new();
            return Some(Err(FrameError::Oversize {
                len,
                max: self.max_frame_len,
            }));
        }

        let total = LENGTH_PREFIX_LEN + len;
        if self.buf.len() < total {
            self.buf.reserve(total - self.buf.len());
            return None;
        }

        self.buf.advance(LENGTH_PREFIX_LEN);
        Some(Ok(self.buf.split_to(len).freeze()))
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Frames completed by one [`FrameDecoder::feed`] call
#[derive(Debug)]
pub struct Frames<'a> {
    decoder: &'a mut FrameDecoder,
    done: bool,
}

impl Iterator for Frames<'_> {
    type Item = Result<Bytes, FrameError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if self.decoder.poisoned {
            self.done = true;
            return Some(Err(FrameError::Poisoned));
        }
        let next = self.decoder.next_frame();
        if matches!(next, None | Some(Err(_))) {
            self.done = true;
        }
        next
    }
}
