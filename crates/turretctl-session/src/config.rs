use std::net::SocketAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use turretctl_proto::{Angle, Orientation};

use crate::error::{Result, SessionError};

/// Rectangular angular region in turret coordinates, bounds inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AngularBounds {
    pub azimuth_min: Angle,
    pub azimuth_max: Angle,
    pub elevation_min: Angle,
    pub elevation_max: Angle,
}

impl AngularBounds {
    /// Bounds from degree values.
    pub fn degrees(azimuth: (f64, f64), elevation: (f64, f64)) -> Self {
        Self {
            azimuth_min: Angle::from_degrees(azimuth.0),
            azimuth_max: Angle::from_degrees(azimuth.1),
            elevation_min: Angle::from_degrees(elevation.0),
            elevation_max: Angle::from_degrees(elevation.1),
        }
    }

    pub fn contains(&self, orientation: Orientation) -> bool {
        (self.azimuth_min..=self.azimuth_max).contains(&orientation.azimuth)
            && (self.elevation_min..=self.elevation_max).contains(&orientation.elevation)
    }

    fn is_ordered(&self) -> bool {
        self.azimuth_min <= self.azimuth_max && self.elevation_min <= self.elevation_max
    }
}

/// Thresholds consulted by the safety interlock, copied out of
/// [`SessionConfig`] for each evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SafetyLimits {
    pub safe_envelope: AngularBounds,
    pub axis_limits: AngularBounds,
    pub max_fresh_age: Duration,
}

/// Bounded retry policy for (re)connect attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectPolicy {
    /// Attempts per connect cycle before giving up.
    pub max_attempts: u32,
    #[serde(with = "millis")]
    pub initial_backoff: Duration,
    #[serde(with = "millis")]
    pub max_backoff: Duration,
}

impl ReconnectPolicy {
    /// Delay before retry number `attempt` (1-based): doubling from
    /// `initial_backoff`, capped at `max_backoff`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        self.initial_backoff
            .saturating_mul(1u32 << shift)
            .min(self.max_backoff)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(2),
        }
    }
}

/// Configuration for a turret session.
///
/// Every blocking point of the session is bounded by one of these values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Bound on each TCP connect attempt.
    #[serde(with = "millis")]
    pub connect_timeout: Duration,
    /// Silence after which a Ready session becomes Degraded.
    #[serde(with = "millis")]
    pub heartbeat_interval: Duration,
    /// Silence in Degraded after which the link is dropped and redialled.
    #[serde(with = "millis")]
    pub degraded_timeout: Duration,
    /// How long a command may wait for its acknowledgement.
    #[serde(with = "millis")]
    pub ack_timeout: Duration,
    /// Pending-set bound; submissions beyond it are rejected.
    pub max_pending_commands: usize,
    /// Region the head must be in (and aiming into) for Fire to be allowed.
    pub safe_envelope: AngularBounds,
    /// Oldest telemetry Fire may rely on.
    #[serde(with = "millis")]
    pub max_fresh_age: Duration,
    /// Mechanical limits; Aim targets outside are refused.
    pub axis_limits: AngularBounds,
    /// Bound on writing one frame.
    #[serde(with = "millis")]
    pub write_timeout: Duration,
    /// Receive-path tick: read timeout between expiry sweeps.
    #[serde(with = "millis")]
    pub poll_interval: Duration,
    /// Silence after which an internal status query is sent; `None` disables.
    #[serde(with = "option_millis")]
    pub keepalive_interval: Option<Duration>,
    /// Default wait in [`TurretClient::await_result`](crate::TurretClient::await_result).
    #[serde(with = "millis")]
    pub await_result_timeout: Duration,
    /// Consecutive undecodable frames tolerated before the link is dropped.
    pub max_decode_errors: u32,
    /// Largest frame body accepted from the turret.
    pub max_frame_size: usize,
    pub reconnect: ReconnectPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(2),
            heartbeat_interval: Duration::from_secs(1),
            degraded_timeout: Duration::from_secs(3),
            ack_timeout: Duration::from_millis(1500),
            max_pending_commands: 8,
            safe_envelope: AngularBounds::degrees((-45.0, 45.0), (-10.0, 30.0)),
            max_fresh_age: Duration::from_millis(500),
            axis_limits: AngularBounds::degrees((-170.0, 170.0), (-20.0, 60.0)),
            write_timeout: Duration::from_millis(250),
            poll_interval: Duration::from_millis(50),
            keepalive_interval: Some(Duration::from_millis(400)),
            await_result_timeout: Duration::from_secs(3),
            max_decode_errors: 5,
            max_frame_size: turretctl_frame::DEFAULT_MAX_FRAME_SIZE,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl SessionConfig {
    pub fn safety_limits(&self) -> SafetyLimits {
        SafetyLimits {
            safe_envelope: self.safe_envelope,
            axis_limits: self.axis_limits,
            max_fresh_age: self.max_fresh_age,
        }
    }

    /// Reject configurations that would make a blocking point unbounded or
    /// a safety check vacuous.
    pub fn validate(&self) -> Result<()> {
        let durations = [
            ("connect_timeout", self.connect_timeout),
            ("heartbeat_interval", self.heartbeat_interval),
            ("degraded_timeout", self.degraded_timeout),
            ("ack_timeout", self.ack_timeout),
            ("max_fresh_age", self.max_fresh_age),
            ("write_timeout", self.write_timeout),
            ("poll_interval", self.poll_interval),
            ("await_result_timeout", self.await_result_timeout),
        ];
        for (name, value) in durations {
            if value.is_zero() {
                return Err(SessionError::InvalidConfig(format!("{name} must be non-zero")));
            }
        }
        if self.keepalive_interval.is_some_and(|d| d.is_zero()) {
            return Err(SessionError::InvalidConfig(
                "keepalive_interval must be non-zero when set".to_string(),
            ));
        }
        if self.max_pending_commands == 0 {
            return Err(SessionError::InvalidConfig(
                "max_pending_commands must be at least 1".to_string(),
            ));
        }
        if self.max_frame_size < turretctl_proto::codec::MIN_BODY_SIZE {
            return Err(SessionError::InvalidConfig(
                "max_frame_size is smaller than the smallest message".to_string(),
            ));
        }
        if self.reconnect.max_attempts == 0 {
            return Err(SessionError::InvalidConfig(
                "reconnect.max_attempts must be at least 1".to_string(),
            ));
        }
        if !self.safe_envelope.is_ordered() || !self.axis_limits.is_ordered() {
            return Err(SessionError::InvalidConfig(
                "angular bounds must have min <= max".to_string(),
            ));
        }
        Ok(())
    }
}

/// Where and how long to look for a turret controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Datagram destination; the limited broadcast address by default.
    pub target: SocketAddr,
    #[serde(with = "millis")]
    pub timeout: Duration,
}

/// UDP port controllers listen on for discovery broadcasts.
pub const DEFAULT_DISCOVERY_PORT: u16 = 12346;

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            target: turretctl_transport::broadcast_target(DEFAULT_DISCOVERY_PORT),
            timeout: Duration::from_secs(2),
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis().min(u128::from(u64::MAX)) as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

mod option_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&(d.as_millis().min(u128::from(u64::MAX)) as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Option::<u64>::deserialize(deserializer).map(|v| v.map(Duration::from_millis))
    }
}
