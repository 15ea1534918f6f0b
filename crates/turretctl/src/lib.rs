//! Command/control client for networked nerf turrets.
//!
//! turretctl keeps a live control session with a turret controller: it
//! frames and encodes commands, enforces a safety interlock before
//! anything moves or fires, and reconciles what was commanded against the
//! telemetry the turret reports back.
//!
//! # Crate Structure
//!
//! - [`transport`]: TCP links and the UDP discovery request
//! - [`frame`]: Length-prefixed framing (async codec behind `async`)
//! - [`proto`]: Versioned, checksummed command/telemetry codec
//! - [`session`]: Sessions, safety interlock and reconciliation (behind `session` feature)

/// Re-export transport types.
pub mod transport {
    pub use turretctl_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use turretctl_frame::*;
}

/// Re-export wire codec types.
pub mod proto {
    pub use turretctl_proto::*;
}

/// Re-export session types (requires `session` feature).
#[cfg(feature = "session")]
pub mod session {
    pub use turretctl_session::*;
}
