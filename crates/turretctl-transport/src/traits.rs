use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::Duration;

use crate::error::Result;

/// A connected turret link, implementing Read and Write.
///
/// This is the fundamental I/O type returned by transport operations.
/// Today it wraps a TCP stream; a serial link would be added as another
/// inner variant without changing callers.
pub struct TurretStream {
    inner: TurretStreamInner,
}

enum TurretStreamInner {
    Tcp(TcpStream),
}

impl Read for TurretStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            TurretStreamInner::Tcp(stream) => stream.read(buf),
        }
    }
}

impl Write for TurretStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            TurretStreamInner::Tcp(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            TurretStreamInner::Tcp(stream) => stream.flush(),
        }
    }
}

impl TurretStream {
    /// Create a TurretStream from a connected TCP stream.
    pub(crate) fn from_tcp(stream: TcpStream) -> Self {
        Self {
            inner: TurretStreamInner::Tcp(stream),
        }
    }

    /// Set read timeout on the underlying stream.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match &self.inner {
            TurretStreamInner::Tcp(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
        }
    }

    /// Set write timeout on the underlying stream.
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match &self.inner {
            TurretStreamInner::Tcp(stream) => stream.set_write_timeout(timeout).map_err(Into::into),
        }
    }

    /// Try to clone this stream (creates a new file descriptor).
    ///
    /// Clones share the underlying connection: the session keeps one clone
    /// for reading and one for writing.
    pub fn try_clone(&self) -> Result<Self> {
        match &self.inner {
            TurretStreamInner::Tcp(stream) => {
                let cloned = stream.try_clone()?;
                Ok(Self::from_tcp(cloned))
            }
        }
    }

    /// Shut down both directions of the link.
    ///
    /// Any read blocked on another clone of this stream returns immediately.
    /// Shutting down an already-closed link is not an error.
    pub fn shutdown(&self) -> Result<()> {
        match &self.inner {
            TurretStreamInner::Tcp(stream) => match stream.shutdown(Shutdown::Both) {
                Ok(()) => Ok(()),
                Err(err) if err.kind() == std::io::ErrorKind::NotConnected => Ok(()),
                Err(err) => Err(err.into()),
            },
        }
    }

    /// Address of the remote end.
    pub fn peer_addr(&self) -> Result<SocketAddr> {
        match &self.inner {
            TurretStreamInner::Tcp(stream) => stream.peer_addr().map_err(Into::into),
        }
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        match &self.inner {
            TurretStreamInner::Tcp(_) => "tcp",
        }
    }
}

impl std::fmt::Debug for TurretStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            TurretStreamInner::Tcp(stream) => f
                .debug_struct("TurretStream")
                .field("type", &"tcp")
                .field("peer", &stream.peer_addr().ok())
                .finish(),
        }
    }
}
