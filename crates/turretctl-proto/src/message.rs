use std::fmt;

use serde::{Deserialize, Serialize};

use crate::angle::{Angle, Orientation};

/// Locally assigned command sequence number. The first command of a
/// client is sequence 1; zero is never issued.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SequenceNumber(u32);

impl SequenceNumber {
    pub const FIRST: SequenceNumber = SequenceNumber(1);

    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    pub const fn get(self) -> u32 {
        self.0
    }

    /// The following sequence number, or `None` once the space is spent.
    pub fn next(self) -> Option<Self> {
        self.0.checked_add(1).map(Self)
    }
}

impl fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Wire message-type byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    Aim = 0x01,
    Fire = 0x02,
    HoldPosition = 0x03,
    QueryStatus = 0x04,
    Reset = 0x05,
    Discover = 0x06,
    Telemetry = 0x81,
    Address = 0x82,
}

impl MessageType {
    pub fn name(self) -> &'static str {
        match self {
            MessageType::Aim => "aim",
            MessageType::Fire => "fire",
            MessageType::HoldPosition => "hold",
            MessageType::QueryStatus => "query-status",
            MessageType::Reset => "reset",
            MessageType::Discover => "discover",
            MessageType::Telemetry => "telemetry",
            MessageType::Address => "address",
        }
    }

    /// Whether messages of this type travel from the turret to the client.
    pub fn is_inbound(self) -> bool {
        (self as u8) & 0x80 != 0
    }
}

impl TryFrom<u8> for MessageType {
    type Error = u8;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        match tag {
            0x01 => Ok(MessageType::Aim),
            0x02 => Ok(MessageType::Fire),
            0x03 => Ok(MessageType::HoldPosition),
            0x04 => Ok(MessageType::QueryStatus),
            0x05 => Ok(MessageType::Reset),
            0x06 => Ok(MessageType::Discover),
            0x81 => Ok(MessageType::Telemetry),
            0x82 => Ok(MessageType::Address),
            other => Err(other),
        }
    }
}

/// What a command asks the turret to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// Slew the head to an absolute orientation.
    Aim { azimuth: Angle, elevation: Angle },
    /// Fire `rounds` rounds from the current orientation.
    Fire { rounds: u16 },
    /// Stop all motion and keep the current orientation.
    HoldPosition,
    /// Ask for a telemetry report.
    QueryStatus,
    /// Clear a latched controller fault.
    Reset,
}

impl CommandKind {
    pub fn message_type(&self) -> MessageType {
        match self {
            CommandKind::Aim { .. } => MessageType::Aim,
            CommandKind::Fire { .. } => MessageType::Fire,
            CommandKind::HoldPosition => MessageType::HoldPosition,
            CommandKind::QueryStatus => MessageType::QueryStatus,
            CommandKind::Reset => MessageType::Reset,
        }
    }

    pub fn name(&self) -> &'static str {
        self.message_type().name()
    }

    pub fn is_fire(&self) -> bool {
        matches!(self, CommandKind::Fire { .. })
    }

    /// Aim target, for Aim commands.
    pub fn aim_target(&self) -> Option<Orientation> {
        match *self {
            CommandKind::Aim { azimuth, elevation } => Some(Orientation::new(azimuth, elevation)),
            _ => None,
        }
    }
}

/// A sequenced command. Immutable once built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Command {
    pub seq: SequenceNumber,
    pub kind: CommandKind,
}

impl Command {
    pub const fn new(seq: SequenceNumber, kind: CommandKind) -> Self {
        Self { seq, kind }
    }
}

/// A target reported by the turret's onboard detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetSighting {
    /// Where the target is, in turret coordinates.
    pub position: Orientation,
    /// Detector confidence, 0..=100 percent.
    pub confidence: u8,
}

/// One telemetry report as carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Telemetry {
    /// Sequence number of the command this report acknowledges, if any.
    pub sequence_ack: Option<SequenceNumber>,
    /// Orientation measured by the axis encoders.
    pub orientation: Orientation,
    pub ammo_remaining: u16,
    pub target: Option<TargetSighting>,
    /// Hardware interlock fault code; `None` when the interlock is clear.
    pub interlock_fault: Option<u16>,
}

/// Every message of the protocol vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Message {
    Command(Command),
    Telemetry(Telemetry),
    /// Discovery broadcast from a client.
    Discover,
    /// Discovery answer: the controller's command port.
    Address { port: u16 },
}

impl Message {
    pub fn message_type(&self) -> MessageType {
        match self {
            Message::Command(command) => command.kind.message_type(),
            Message::Telemetry(_) => MessageType::Telemetry,
            Message::Discover => MessageType::Discover,
            Message::Address { .. } => MessageType::Address,
        }
    }
}

impl From<Command> for Message {
    fn from(command: Command) -> Self {
        Message::Command(command)
    }
}

impl From<Telemetry> for Message {
    fn from(telemetry: Telemetry) -> Self {
        Message::Telemetry(telemetry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_conversion_is_total_over_vocabulary() {
        for tag in [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x81, 0x82] {
            let ty = MessageType::try_from(tag).unwrap();
            assert_eq!(ty as u8, tag);
        }
        assert_eq!(MessageType::try_from(0x7f), Err(0x7f));
    }

    #[test]
    fn direction_follows_high_bit() {
        assert!(MessageType::Telemetry.is_inbound());
        assert!(MessageType::Address.is_inbound());
        assert!(!MessageType::Fire.is_inbound());
    }

    #[test]
    fn sequence_numbers_stop_at_the_end_of_the_space() {
        assert_eq!(SequenceNumber::FIRST.next(), Some(SequenceNumber::new(2)));
        assert_eq!(SequenceNumber::new(u32::MAX).next(), None);
    }
}
