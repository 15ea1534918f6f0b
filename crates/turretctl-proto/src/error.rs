/// Errors produced while decoding a frame body.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The body is shorter than its header, checksum or payload require.
    #[error("truncated frame ({actual} bytes, need {needed})")]
    Truncated { needed: usize, actual: usize },

    /// The payload does not have the shape its message type requires.
    #[error("malformed {message} payload: {reason}")]
    Malformed {
        message: &'static str,
        reason: String,
    },

    /// The message-type byte is not part of the protocol vocabulary.
    #[error("unknown message type 0x{0:02x}")]
    UnknownTag(u8),

    /// The format-version byte names a protocol revision we do not speak.
    #[error("unsupported format version {0}")]
    UnsupportedVersion(u8),

    /// The trailing checksum does not match the body.
    #[error("checksum mismatch (frame 0x{received:04x}, computed 0x{computed:04x})")]
    ChecksumMismatch { received: u16, computed: u16 },
}

impl DecodeError {
    pub(crate) fn malformed(message: &'static str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            message,
            reason: reason.into(),
        }
    }
}
