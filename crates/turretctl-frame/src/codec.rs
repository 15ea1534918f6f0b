use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Frame header: a 4-byte little-endian body length.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Default maximum body size: 1 KiB.
///
/// Turret messages are a few dozen bytes; anything near this limit means
/// the stream has lost sync.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1024;

/// Encode a frame body into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────────┬──────────────────────────────────────────┐
/// │ Length       │ Body                                     │
/// │ (4B LE)      │ version | type | payload | checksum      │
/// └──────────────┴──────────────────────────────────────────┘
/// ```
///
/// The body is opaque at this layer; `turretctl-proto` owns its layout.
pub fn encode_frame(body: &[u8], dst: &mut BytesMut) -> Result<()> {
    if body.len() > u32::MAX as usize {
        return Err(FrameError::PayloadTooLarge {
            size: body.len(),
            max: u32::MAX as usize,
        });
    }
    dst.reserve(LENGTH_PREFIX_SIZE + body.len());
    dst.put_u32_le(body.len() as u32);
    dst.put_slice(body);
    Ok(())
}

/// Decode a frame body from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet;
/// the partial bytes stay in `src` untouched. On success, consumes the
/// frame bytes from the buffer.
pub fn decode_frame(src: &mut BytesMut, max_frame_size: usize) -> Result<Option<Bytes>> {
    if src.len() < LENGTH_PREFIX_SIZE {
        return Ok(None); // Need more data
    }

    let body_len = u32::from_le_bytes([src[0], src[1], src[2], src[3]]) as usize;

    if body_len > max_frame_size {
        return Err(FrameError::PayloadTooLarge {
            size: body_len,
            max: max_frame_size,
        });
    }

    let total = LENGTH_PREFIX_SIZE + body_len;
    if src.len() < total {
        src.reserve(total - src.len());
        return Ok(None); // Need more data
    }

    src.advance(LENGTH_PREFIX_SIZE);
    Ok(Some(src.split_to(body_len).freeze()))
}

/// The total wire size of a body once framed.
pub fn wire_size(body_len: usize) -> usize {
    LENGTH_PREFIX_SIZE + body_len
}

/// Configuration for the frame codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum body size in bytes. Default: 1 KiB.
    pub max_frame_size: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            read_timeout: None,
            write_timeout: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_roundtrip() {
        let mut buf = BytesMut::new();
        let body = b"\x01\x04\x07\x00\x00\x00\xaa\xbb";

        encode_frame(body, &mut buf).unwrap();

        assert_eq!(buf.len(), LENGTH_PREFIX_SIZE + body.len());

        let frame = decode_frame(&mut buf, DEFAULT_MAX_FRAME_SIZE)
            .unwrap()
            .unwrap();

        assert_eq!(frame.as_ref(), body);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_incomplete_prefix() {
        let mut buf = BytesMut::from(&[0x08, 0x00, 0x00][..]);
        let result = decode_frame(&mut buf, DEFAULT_MAX_FRAME_SIZE).unwrap();
        assert!(result.is_none());
        assert_eq!(buf.len(), 3, "partial prefix must stay buffered");
    }

    #[test]
    fn test_decode_incomplete_body() {
        let mut buf = BytesMut::new();
        encode_frame(b"hello", &mut buf).unwrap();
        buf.truncate(LENGTH_PREFIX_SIZE + 2);

        let result = decode_frame(&mut buf, DEFAULT_MAX_FRAME_SIZE).unwrap();
        assert!(result.is_none());
        assert_eq!(buf.len(), LENGTH_PREFIX_SIZE + 2);
    }

    #[test]
    fn test_decode_frame_too_large() {
        let mut buf = BytesMut::new();
        buf.put_u32_le(64 * 1024);

        let result = decode_frame(&mut buf, DEFAULT_MAX_FRAME_SIZE);
        assert!(matches!(result, Err(FrameError::PayloadTooLarge { .. })));
    }

    #[test]
    fn test_multiple_frames() {
        let mut buf = BytesMut::new();
        encode_frame(b"first", &mut buf).unwrap();
        encode_frame(b"second", &mut buf).unwrap();

        let f1 = decode_frame(&mut buf, DEFAULT_MAX_FRAME_SIZE)
            .unwrap()
            .unwrap();
        assert_eq!(f1.as_ref(), b"first");

        let f2 = decode_frame(&mut buf, DEFAULT_MAX_FRAME_SIZE)
            .unwrap()
            .unwrap();
        assert_eq!(f2.as_ref(), b"second");

        assert!(buf.is_empty());
    }

    #[test]
    fn test_empty_body() {
        let mut buf = BytesMut::new();
        encode_frame(b"", &mut buf).unwrap();

        let frame = decode_frame(&mut buf, DEFAULT_MAX_FRAME_SIZE)
            .unwrap()
            .unwrap();
        assert!(frame.is_empty());
    }

    #[test]
    fn test_wire_size() {
        assert_eq!(wire_size(4), LENGTH_PREFIX_SIZE + 4);
    }
}
