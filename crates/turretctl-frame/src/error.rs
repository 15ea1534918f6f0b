use std::io::ErrorKind;

/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The frame exceeds the configured maximum size.
    #[error("frame too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,

    /// The write deadline passed after part of a frame was written.
    #[error("partial frame write ({written} of {total} bytes)")]
    PartialWrite { written: usize, total: usize },

    /// A previous partial write left the stream mid-frame.
    #[error("frame writer poisoned by an earlier partial write")]
    Poisoned,
}

impl FrameError {
    /// Whether this is a read/write timeout with no stream damage.
    ///
    /// Timeouts on read leave any partial frame buffered; the caller may
    /// simply retry.
    pub fn is_timeout(&self) -> bool {
        matches!(self, FrameError::Io(err) if err.kind() == ErrorKind::WouldBlock || err.kind() == ErrorKind::TimedOut)
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
