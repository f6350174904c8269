//! Error types for framewire.

use thiserror::Error;

/// Main error type for all framewire operations.
#[derive(Debug, Error)]
pub enum FramewireError {
    /// I/O error during socket or file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A buffer request exceeded the largest pool size class.
    #[error("requested buffer size {requested} exceeds maximum {max}")]
    BufferTooLarge { requested: usize, max: usize },

    /// The channel (or an engine queue backing it) is closed.
    #[error("channel closed")]
    ChannelClosed,

    /// The peer closed the connection (EOF on read, failed write).
    #[error("peer closed the connection")]
    PeerClosed,

    /// No bytes arrived within the keep-alive window.
    #[error("read timed out")]
    Timeout,

    /// FRAME_LENGTH on the wire was zero or negative.
    #[error("invalid frame length {0}: must be positive")]
    FrameNonPositive(i32),

    /// FRAME_LENGTH on the wire exceeded the configured maximum.
    #[error("frame length {length} exceeds maximum {max}")]
    FrameOversize { length: u32, max: u32 },

    /// Malformed payload: unknown marker, negative inner length,
    /// or inner length larger than the remaining payload.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// A typed payload was shorter than its type requires.
    #[error("incomplete payload: {0}")]
    ProtocolIncomplete(String),

    /// Frame assembly failed inside the encoder.
    #[error("encoder error: {0}")]
    EncoderInternal(String),

    /// Malformed configuration value.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl FramewireError {
    /// Whether this error must tear down the connection.
    ///
    /// Errors that can desynchronize the byte stream are fatal; errors
    /// local to a single payload are not.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            FramewireError::Io(_)
                | FramewireError::PeerClosed
                | FramewireError::Timeout
                | FramewireError::FrameNonPositive(_)
                | FramewireError::FrameOversize { .. }
        )
    }
}

/// Result type alias using FramewireError.
pub type Result<T> = std::result::Result<T, FramewireError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(FramewireError::FrameNonPositive(0).is_fatal());
        assert!(FramewireError::FrameOversize {
            length: 70000,
            max: 65536
        }
        .is_fatal());
        assert!(FramewireError::PeerClosed.is_fatal());
        assert!(FramewireError::Timeout.is_fatal());

        assert!(!FramewireError::ProtocolViolation("unknown marker".into()).is_fatal());
        assert!(!FramewireError::ProtocolIncomplete("short".into()).is_fatal());
        assert!(!FramewireError::EncoderInternal("overflow".into()).is_fatal());
    }

    #[test]
    fn test_display_messages() {
        let err = FramewireError::BufferTooLarge {
            requested: 100_000,
            max: 65536,
        };
        assert!(err.to_string().contains("100000"));
        assert!(err.to_string().contains("65536"));

        let err = FramewireError::FrameNonPositive(-5);
        assert!(err.to_string().contains("-5"));
    }
}
