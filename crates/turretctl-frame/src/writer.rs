use std::io::{ErrorKind, Write};

use bytes::BytesMut;
use turretctl_transport::TurretStream;
use tracing::{trace, warn};

use crate::codec::{encode_frame, FrameConfig};
use crate::error::{FrameError, Result};
use crate::reader::transport_to_frame_error;

const INITIAL_BUFFER_CAPACITY: usize = 1024;

/// Writes complete frames to any `Write` stream.
///
/// Each `send` is bounded by the stream's write timeout. A timeout before
/// any byte is written is a plain [`FrameError::Io`]; a timeout after part
/// of the frame went out returns [`FrameError::PartialWrite`] and poisons
/// the writer, since the peer is now mid-frame and cannot resynchronise.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
    poisoned: bool,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
            poisoned: false,
        }
    }

    /// Encode and send one frame body.
    pub fn send(&mut self, body: &[u8]) -> Result<()> {
        if self.poisoned {
            return Err(FrameError::Poisoned);
        }

        if body.len() > self.config.max_frame_size {
            return Err(FrameError::PayloadTooLarge {
                size: body.len(),
                max: self.config.max_frame_size,
            });
        }

        self.buf.clear();
        encode_frame(body, &mut self.buf)?;

        let total = self.buf.len();
        let mut offset = 0usize;
        while offset < total {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(self.fail_mid_frame(offset, FrameError::ConnectionClosed)),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err)
                    if err.kind() == ErrorKind::WouldBlock || err.kind() == ErrorKind::TimedOut =>
                {
                    if offset == 0 {
                        return Err(FrameError::Io(err));
                    }
                    return Err(self.fail_mid_frame(
                        offset,
                        FrameError::PartialWrite {
                            written: offset,
                            total,
                        },
                    ));
                }
                Err(err) => return Err(self.fail_mid_frame(offset, FrameError::Io(err))),
            }
        }

        trace!(bytes = total, "frame sent");
        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Whether an earlier partial write left the stream unusable.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    fn fail_mid_frame(&mut self, written: usize, err: FrameError) -> FrameError {
        if written > 0 {
            warn!(written, "frame write aborted mid-frame; writer poisoned");
            self.poisoned = true;
        }
        err
    }
}

impl FrameWriter<TurretStream> {
    /// Create a frame writer for `TurretStream` and apply write timeout from config.
    pub fn with_config_stream(inner: TurretStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_write_timeout(config.write_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}
