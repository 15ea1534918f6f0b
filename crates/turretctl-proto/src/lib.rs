//! Versioned binary wire codec for turret commands and telemetry.
//!
//! A frame body is laid out as:
//! - a 1-byte format version ([`FORMAT_VERSION`])
//! - a 1-byte message type ([`MessageType`])
//! - a fixed-shape little-endian payload
//! - a 2-byte CRC-16/CCITT-FALSE checksum over everything before it
//!
//! Decoding untrusted bytes never panics; every failure is a [`DecodeError`].
//! The length prefix in front of the body is added by `turretctl-frame`.

pub mod angle;
pub mod checksum;
pub mod codec;
pub mod error;
pub mod message;

pub use angle::{Angle, Orientation};
pub use checksum::crc16_ccitt_false;
pub use codec::{decode, encode, FORMAT_VERSION};
pub use error::DecodeError;
pub use message::{
    Command, CommandKind, Message, MessageType, SequenceNumber, TargetSighting, Telemetry,
};
