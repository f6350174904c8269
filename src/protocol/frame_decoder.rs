//! Stateful frame decoder with resynchronization.
//!
//! Turns a stream of byte chunks into complete `(marker, payload)` frames.
//! Bytes between frames that are not the start marker are skipped as framing
//! noise, up to a bounded tolerance per pass. Unconsumed bytes of an
//! incomplete frame are carried forward internally, so a read buffer handed
//! to [`FrameDecoder::push`] never has to outlive the call.
//!
//! An illegal FRAME_LENGTH (non-positive or above the configured maximum)
//! is unrecoverable: the stream can no longer be trusted to resynchronize,
//! so the decoder clears its state and returns an error the caller must
//! treat as fatal for the connection.

use bytes::{Bytes, BytesMut};

use super::wire_format::{FRAME_LENGTH_SIZE, START_MARKER, START_MARKER_SIZE};
use crate::error::{FramewireError, Result};

/// Maximum number of non-marker bytes skipped in one scan pass.
pub const MAX_GARBAGE_TOLERANCE: usize = 8192;

/// A decoded frame: the data-type marker and its raw payload.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFrame {
    /// Data-type marker byte as read from the wire.
    pub marker: u8,
    /// Payload bytes; `FRAME_LENGTH - 1` of them.
    pub payload: Bytes,
}

/// Per-connection decoder state machine.
pub struct FrameDecoder {
    /// Unconsumed bytes carried between pushes.
    residual: BytesMut,
    max_frame_length: u32,
}

impl FrameDecoder {
    /// Create a decoder enforcing `max_frame_length` on FRAME_LENGTH.
    ///
    /// # Panics
    ///
    /// Panics if `max_frame_length` is zero.
    pub fn new(max_frame_length: u32) -> Self {
        assert!(max_frame_length > 0, "max_frame_length must be positive");
        Self {
            residual: BytesMut::new(),
            max_frame_length,
        }
    }

    /// Feed arriving bytes and extract every frame that completes.
    ///
    /// May return zero frames (awaiting data or skipping noise) or several
    /// (adjacent frames in one chunk). An empty `chunk` is allowed and
    /// continues processing of retained bytes.
    ///
    /// # Errors
    ///
    /// [`FramewireError::FrameNonPositive`] or
    /// [`FramewireError::FrameOversize`] when FRAME_LENGTH is illegal. The
    /// decoder state is cleared; the caller must close the connection.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<RawFrame>> {
        self.residual.extend_from_slice(chunk);

        let mut frames = Vec::new();
        loop {
            // Seek the start marker, discarding at most the garbage
            // tolerance per pass. Bytes past the tolerance stay retained
            // and continue the scan on the next push.
            let window = self.residual.len().min(MAX_GARBAGE_TOLERANCE);
            let marker_at = self.residual[..window]
                .iter()
                .position(|&b| b == START_MARKER);
            let Some(marker_at) = marker_at else {
                let _ = self.residual.split_to(window);
                break;
            };
            if marker_at > 0 {
                let _ = self.residual.split_to(marker_at);
            }

            // The marker byte stays in place until the whole frame is
            // available; an incomplete frame rewinds to it for free.
            if self.residual.len() < START_MARKER_SIZE + FRAME_LENGTH_SIZE {
                break;
            }
            let frame_length = i32::from_be_bytes(
                self.residual[START_MARKER_SIZE..START_MARKER_SIZE + FRAME_LENGTH_SIZE]
                    .try_into()
                    .expect("slice is four bytes"),
            );
            if frame_length <= 0 {
                self.residual.clear();
                return Err(FramewireError::FrameNonPositive(frame_length));
            }
            let frame_length = frame_length as u32;
            if frame_length > self.max_frame_length {
                self.residual.clear();
                return Err(FramewireError::FrameOversize {
                    length: frame_length,
                    max: self.max_frame_length,
                });
            }

            // FRAME_LENGTH counts the type byte plus the payload.
            let body_len = frame_length as usize;
            let total = START_MARKER_SIZE + FRAME_LENGTH_SIZE + body_len;
            if self.residual.len() < total {
                break;
            }

            let mut frame = self.residual.split_to(total);
            let marker = frame[START_MARKER_SIZE + FRAME_LENGTH_SIZE];
            let payload = frame
                .split_off(START_MARKER_SIZE + FRAME_LENGTH_SIZE + 1)
                .freeze();
            frames.push(RawFrame { marker, payload });
        }

        Ok(frames)
    }

    /// Number of retained bytes awaiting more data.
    pub fn pending(&self) -> usize {
        self.residual.len()
    }

    /// Drop all retained bytes.
    pub fn clear(&mut self) {
        self.residual.clear();
    }
}
