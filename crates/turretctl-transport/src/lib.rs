//! Byte-stream transport for turret control links.
//!
//! Provides the connection primitives everything else builds on:
//! - TCP streams to the turret controller, with bounded connect timeouts
//! - A TCP listener used by simulators and tests
//! - A one-shot UDP broadcast request used for controller discovery
//!
//! This is the lowest layer of turretctl. Framing, codecs and session
//! handling all sit on top of the [`TurretStream`] type provided here.

pub mod error;
pub mod broadcast;
pub mod tcp;
pub mod traits;

pub use error::{Result, TransportError};
pub use broadcast::{broadcast_request, broadcast_target, BroadcastReply};
pub use tcp::TcpTransport;
pub use traits::TurretStream;
