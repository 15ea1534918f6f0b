//! Control sessions with a networked nerf turret.
//!
//! This is the layer callers use. Connect to a turret controller, submit
//! intents (aim, fire, hold, query, reset) and get each one back as an
//! [`Outcome`]. Underneath, every submission passes a state gate and a
//! safety interlock, is tracked until the turret acknowledges it, and is
//! reconciled against the telemetry the turret reports.
//!
//! ```no_run
//! use turretctl_session::{Intent, SessionConfig, TurretClient};
//!
//! let client = TurretClient::connect("192.168.4.1:12345", SessionConfig::default())?;
//! let mut aim = client.submit(Intent::aim(30.0, 10.0)?)?;
//! let outcome = client.await_result(&mut aim)?;
//! println!("{}", outcome.name());
//! client.close();
//! # Ok::<(), turretctl_session::SessionError>(())
//! ```

pub mod client;
pub mod config;
pub mod discovery;
pub mod error;
pub mod intent;
pub mod interlock;
pub mod reconciler;
pub mod state;

pub use client::TurretClient;
pub use config::{
    AngularBounds, DiscoveryConfig, ReconnectPolicy, SafetyLimits, SessionConfig,
    DEFAULT_DISCOVERY_PORT,
};
pub use discovery::discover;
pub use error::{RejectReason, Result, SessionError};
pub use intent::{CommandHandle, Intent, Outcome, TelemetrySnapshot};
pub use interlock::{allow, Denial};
pub use reconciler::Reconciler;
pub use state::{Health, SessionState, StateMachine, Transition};
