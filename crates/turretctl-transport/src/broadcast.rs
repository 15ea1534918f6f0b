use std::io::ErrorKind;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::time::{Duration, Instant};

use bytes::Bytes;
use tracing::debug;

use crate::error::{Result, TransportError};

/// Largest datagram accepted as a broadcast reply.
const MAX_REPLY_SIZE: usize = 1024;

/// A single datagram received in answer to a broadcast.
#[derive(Debug, Clone)]
pub struct BroadcastReply {
    /// Where the reply came from.
    pub from: SocketAddr,
    /// Raw reply datagram.
    pub payload: Bytes,
}

/// The limited-broadcast address on `port`.
pub fn broadcast_target(port: u16) -> SocketAddr {
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::BROADCAST, port))
}

/// Send `payload` as one datagram to `target` and wait for the first reply.
///
/// Broadcast is enabled on the socket so `target` may be
/// [`broadcast_target`]. Replies that arrive after `timeout` are ignored.
pub fn broadcast_request(
    payload: &[u8],
    target: SocketAddr,
    timeout: Duration,
) -> Result<BroadcastReply> {
    let bind_addr = match target {
        SocketAddr::V4(_) => "0.0.0.0:0",
        SocketAddr::V6(_) => "[::]:0",
    };
    let socket = UdpSocket::bind(bind_addr).map_err(|e| TransportError::Bind {
        addr: bind_addr.to_string(),
        source: e,
    })?;
    socket.set_broadcast(true)?;

    socket.send_to(payload, target)?;
    debug!(%target, bytes = payload.len(), "sent discovery request");

    let deadline = Instant::now() + timeout;
    let mut buf = [0u8; MAX_REPLY_SIZE];
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(TransportError::NoReply(timeout));
        }
        socket.set_read_timeout(Some(remaining))?;

        match socket.recv_from(&mut buf) {
            Ok((n, from)) => {
                debug!(%from, bytes = n, "broadcast reply received");
                return Ok(BroadcastReply {
                    from,
                    payload: Bytes::copy_from_slice(&buf[..n]),
                });
            }
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) if err.kind() == ErrorKind::WouldBlock || err.kind() == ErrorKind::TimedOut => {
                return Err(TransportError::NoReply(timeout));
            }
            Err(err) => return Err(TransportError::Io(err)),
        }
    }
}
