use std::net::SocketAddr;

use tracing::info;
use turretctl_proto::{decode, encode, Message};
use turretctl_transport::broadcast_request;

use crate::config::DiscoveryConfig;
use crate::error::{Result, SessionError};

/// Find a turret controller on the local network.
///
/// Broadcasts a Discover message and waits for the first Address reply.
/// The controller's command endpoint is the replying host on the
/// announced port.
pub fn discover(config: &DiscoveryConfig) -> Result<SocketAddr> {
    let request = encode(&Message::Discover);
    let reply = broadcast_request(&request, config.target, config.timeout)?;

    match decode(&reply.payload)? {
        Message::Address { port } => {
            let endpoint = SocketAddr::new(reply.from.ip(), port);
            info!(%endpoint, "turret controller discovered");
            Ok(endpoint)
        }
        other => Err(SessionError::UnexpectedReply(other.message_type().name())),
    }
}
