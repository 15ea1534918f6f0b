use std::fmt;
use std::sync::mpsc::{Receiver, RecvTimeoutError, TryRecvError};
use std::time::{Duration, Instant};

use turretctl_proto::{CommandKind, Orientation, SequenceNumber, Telemetry};

use crate::interlock::{self, Denial};

/// What the caller wants the turret to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// Slew to an absolute orientation.
    Aim(Orientation),
    /// Fire this many rounds from the current orientation.
    Fire { rounds: u16 },
    HoldPosition,
    QueryStatus,
    /// Clear a latched controller fault.
    Reset,
}

impl Intent {
    /// Aim at a target given in degrees. Non-finite angles are denied
    /// here, before any session sees them.
    pub fn aim(azimuth: f64, elevation: f64) -> Result<Self, Denial> {
        interlock::aim_target(azimuth, elevation).map(Intent::Aim)
    }

    pub fn fire(rounds: u16) -> Self {
        Intent::Fire { rounds }
    }

    pub fn is_fire(&self) -> bool {
        matches!(self, Intent::Fire { .. })
    }

    pub fn name(&self) -> &'static str {
        self.command_kind().name()
    }

    /// The wire command this intent becomes.
    pub fn command_kind(&self) -> CommandKind {
        match *self {
            Intent::Aim(target) => CommandKind::Aim {
                azimuth: target.azimuth,
                elevation: target.elevation,
            },
            Intent::Fire { rounds } => CommandKind::Fire { rounds },
            Intent::HoldPosition => CommandKind::HoldPosition,
            Intent::QueryStatus => CommandKind::QueryStatus,
            Intent::Reset => CommandKind::Reset,
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Intent::Aim(target) => write!(f, "aim {target}"),
            Intent::Fire { rounds } => write!(f, "fire {rounds}"),
            other => f.write_str(other.name()),
        }
    }
}

/// A telemetry report stamped with its local receipt time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelemetrySnapshot {
    pub telemetry: Telemetry,
    /// Monotonic time the report was received.
    pub received_at: Instant,
    /// Connection the report arrived on.
    pub session_id: u64,
}

impl TelemetrySnapshot {
    pub fn orientation(&self) -> Orientation {
        self.telemetry.orientation
    }

    /// Time since receipt.
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.received_at)
    }
}

/// How an admitted command ended. Every admitted command ends exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The turret acknowledged it; carries the acknowledging report.
    Acknowledged(TelemetrySnapshot),
    /// No acknowledgement within the ack timeout.
    CommandTimeout,
    /// The link dropped before an acknowledgement arrived.
    ConnectionLost,
    /// The session was closed while the command was pending.
    SessionClosed,
}

impl Outcome {
    pub fn is_acknowledged(&self) -> bool {
        matches!(self, Outcome::Acknowledged(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Outcome::Acknowledged(_) => "acknowledged",
            Outcome::CommandTimeout => "timeout",
            Outcome::ConnectionLost => "connection-lost",
            Outcome::SessionClosed => "session-closed",
        }
    }
}

/// Receipt for an admitted command; resolves to its [`Outcome`].
#[derive(Debug)]
pub struct CommandHandle {
    seq: SequenceNumber,
    intent: Intent,
    rx: Receiver<Outcome>,
    resolved: Option<Outcome>,
}

impl CommandHandle {
    pub(crate) fn new(seq: SequenceNumber, intent: Intent, rx: Receiver<Outcome>) -> Self {
        Self {
            seq,
            intent,
            rx,
            resolved: None,
        }
    }

    pub fn seq(&self) -> SequenceNumber {
        self.seq
    }

    pub fn intent(&self) -> Intent {
        self.intent
    }

    /// The outcome, if it has arrived. Never blocks.
    pub fn try_outcome(&mut self) -> Option<Outcome> {
        if self.resolved.is_none() {
            self.resolved = match self.rx.try_recv() {
                Ok(outcome) => Some(outcome),
                Err(TryRecvError::Empty) => None,
                // The session dropped the command without resolving it.
                Err(TryRecvError::Disconnected) => Some(Outcome::SessionClosed),
            };
        }
        self.resolved
    }

    /// Block up to `timeout` for the outcome.
    pub fn wait(&mut self, timeout: Duration) -> Option<Outcome> {
        if self.resolved.is_none() {
            self.resolved = match self.rx.recv_timeout(timeout) {
                Ok(outcome) => Some(outcome),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => Some(Outcome::SessionClosed),
            };
        }
        self.resolved
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use turretctl_proto::Angle;

    use super::*;

    #[test]
    fn aim_intent_maps_to_wire_angles() {
        let kind = Intent::aim(30.0, 10.0)
            .expect("aim target should be finite")
            .command_kind();
        assert_eq!(
            kind,
            CommandKind::Aim {
                azimuth: Angle::from_millidegrees(30_000),
                elevation: Angle::from_millidegrees(10_000),
            }
        );
    }

    #[test]
    fn handle_caches_its_outcome() {
        let (tx, rx) = mpsc::sync_channel(1);
        let mut handle = CommandHandle::new(SequenceNumber::FIRST, Intent::HoldPosition, rx);
        assert_eq!(handle.try_outcome(), None);

        tx.send(Outcome::CommandTimeout).expect("receiver should be alive");
        drop(tx);
        assert_eq!(handle.wait(Duration::from_millis(10)), Some(Outcome::CommandTimeout));
        assert_eq!(handle.try_outcome(), Some(Outcome::CommandTimeout));
    }

    #[test]
    fn dropped_sender_reads_as_closed() {
        let (tx, rx) = mpsc::sync_channel::<Outcome>(1);
        drop(tx);
        let mut handle = CommandHandle::new(SequenceNumber::FIRST, Intent::QueryStatus, rx);
        assert_eq!(handle.wait(Duration::from_millis(10)), Some(Outcome::SessionClosed));
    }
}
