//! Length-prefixed framing for turret control links.
//!
//! Every message on the wire is framed with a 4-byte little-endian body
//! length. The body itself (format version, message type, payload and
//! checksum) is opaque here and belongs to `turretctl-proto`.
//!
//! No partial reads, no buffer management in user code.

#[cfg(feature = "async")]
pub mod async_codec;
pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub use async_codec::FrameCodec;
pub use codec::{
    decode_frame, encode_frame, wire_size, FrameConfig, DEFAULT_MAX_FRAME_SIZE, LENGTH_PREFIX_SIZE,
};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use writer::FrameWriter;
