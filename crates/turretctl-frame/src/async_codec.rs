//! `tokio_util` codec with the same framing as [`FrameReader`](crate::FrameReader)
//! and [`FrameWriter`](crate::FrameWriter).

use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{decode_frame, encode_frame, DEFAULT_MAX_FRAME_SIZE};
use crate::error::FrameError;

/// Length-prefixed frame codec for `tokio_util::codec::Framed`.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    max_frame_size: usize,
}

impl FrameCodec {
    /// Create a codec with the default maximum frame size.
    pub fn new() -> Self {
        Self::with_max_frame_size(DEFAULT_MAX_FRAME_SIZE)
    }

    /// Create a codec with an explicit maximum frame size.
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FrameCodec {
    type Item = Bytes;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        decode_frame(src, self.max_frame_size)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None if src.is_empty() => Ok(None),
            None => Err(FrameError::ConnectionClosed),
        }
    }
}

impl Encoder<Bytes> for FrameCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if item.len() > self.max_frame_size {
            return Err(FrameError::PayloadTooLarge {
                size: item.len(),
                max: self.max_frame_size,
            });
        }
        encode_frame(&item, dst)
    }
}

#[cfg(test)]
mod tests {
    use futures_util::{SinkExt, StreamExt};
    use tokio_util::codec::{FramedRead, FramedWrite};

    use super::*;

    #[tokio::test]
    async fn framed_roundtrip_over_duplex() {
        let (client, server) = tokio::io::duplex(64);
        let mut sink = FramedWrite::new(client, FrameCodec::new());
        let mut stream = FramedRead::new(server, FrameCodec::new());

        sink.send(Bytes::from_static(b"aim")).await.unwrap();
        sink.send(Bytes::from_static(b"fire")).await.unwrap();
        drop(sink);

        assert_eq!(stream.next().await.unwrap().unwrap().as_ref(), b"aim");
        assert_eq!(stream.next().await.unwrap().unwrap().as_ref(), b"fire");
        assert!(stream.next().await.is_none());
    }

    #[test]
    fn truncated_stream_at_eof_is_error() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        encode_frame(b"status", &mut buf).unwrap();
        buf.truncate(buf.len() - 2);

        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert!(matches!(
            codec.decode_eof(&mut buf),
            Err(FrameError::ConnectionClosed)
        ));
    }

    #[test]
    fn encoder_enforces_limit() {
        let mut codec = FrameCodec::with_max_frame_size(2);
        let mut dst = BytesMut::new();
        let err = codec
            .encode(Bytes::from_static(b"toolong"), &mut dst)
            .unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { .. }));
        assert!(dst.is_empty());
    }
}
