use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::TurretStream;

/// TCP transport to a turret controller.
///
/// `connect` is the client side used by sessions. `bind`/`accept` host the
/// controller end and exist for simulators and loopback tests.
pub struct TcpTransport {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl TcpTransport {
    /// Bind and listen on a TCP address. Port 0 picks an ephemeral port.
    pub fn bind(addr: impl ToSocketAddrs + std::fmt::Display) -> Result<Self> {
        let label = addr.to_string();
        let listener = TcpListener::bind(addr).map_err(|e| TransportError::Bind {
            addr: label.clone(),
            source: e,
        })?;
        let local_addr = listener.local_addr().map_err(|e| TransportError::Bind {
            addr: label,
            source: e,
        })?;

        info!(%local_addr, "listening for turret links");

        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Accept an incoming connection (blocking).
    pub fn accept(&self) -> Result<TurretStream> {
        let (stream, peer) = self.listener.accept().map_err(TransportError::Accept)?;
        stream.set_nodelay(true).map_err(TransportError::Accept)?;
        debug!(%peer, "accepted turret link");
        Ok(TurretStream::from_tcp(stream))
    }

    /// Connect to a turret controller, bounding each attempt by `timeout`.
    ///
    /// Every socket address the name resolves to is tried in order; the
    /// error from the last one is returned if none accepts.
    pub fn connect(addr: &str, timeout: Duration) -> Result<TurretStream> {
        let candidates: Vec<SocketAddr> = addr
            .to_socket_addrs()
            .map_err(|e| TransportError::Resolve {
                addr: addr.to_string(),
                source: e,
            })?
            .collect();

        if candidates.is_empty() {
            return Err(TransportError::Resolve {
                addr: addr.to_string(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "address resolved to no socket addresses",
                ),
            });
        }

        let mut last_err = None;
        for candidate in candidates {
            match TcpStream::connect_timeout(&candidate, timeout) {
                Ok(stream) => {
                    stream.set_nodelay(true)?;
                    debug!(%candidate, "connected to turret");
                    return Ok(TurretStream::from_tcp(stream));
                }
                Err(err)
                    if err.kind() == std::io::ErrorKind::TimedOut
                        || err.kind() == std::io::ErrorKind::WouldBlock =>
                {
                    debug!(%candidate, ?timeout, "connect attempt timed out");
                    last_err = Some(TransportError::ConnectTimeout {
                        addr: addr.to_string(),
                        timeout,
                    });
                }
                Err(err) => {
                    debug!(%candidate, %err, "connect attempt failed");
                    last_err = Some(TransportError::Connect {
                        addr: addr.to_string(),
                        source: err,
                    });
                }
            }
        }

        Err(last_err.unwrap_or(TransportError::Shutdown))
    }

    /// The address this listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        "tcp"
    }
}
