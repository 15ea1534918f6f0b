use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::angle::{Angle, Orientation};
use crate::checksum::crc16_ccitt_false;
use crate::error::DecodeError;
use crate::message::{
    Command, CommandKind, Message, MessageType, SequenceNumber, TargetSighting, Telemetry,
};

/// Current wire format revision.
pub const FORMAT_VERSION: u8 = 1;

/// Version byte + message-type byte.
const HEADER_SIZE: usize = 2;
const CHECKSUM_SIZE: usize = 2;
/// Smallest possible body: header and checksum around an empty payload.
pub const MIN_BODY_SIZE: usize = HEADER_SIZE + CHECKSUM_SIZE;

const SEQ_SIZE: usize = 4;
const ORIENTATION_SIZE: usize = 8;
const TARGET_SIZE: usize = ORIENTATION_SIZE + 1;

const FLAG_ACK: u8 = 0x01;
const FLAG_TARGET: u8 = 0x02;
const FLAG_FAULT: u8 = 0x04;
const KNOWN_FLAGS: u8 = FLAG_ACK | FLAG_TARGET | FLAG_FAULT;

const MAX_CONFIDENCE: u8 = 100;

/// Encode a message into a frame body.
///
/// Deterministic: equal messages always produce identical bytes.
pub fn encode(message: &Message) -> Bytes {
    let mut buf = BytesMut::with_capacity(32);
    buf.put_u8(FORMAT_VERSION);
    buf.put_u8(message.message_type() as u8);

    match message {
        Message::Command(command) => encode_command(command, &mut buf),
        Message::Telemetry(telemetry) => encode_telemetry(telemetry, &mut buf),
        Message::Discover => {}
        Message::Address { port } => buf.put_u16_le(*port),
    }

    let crc = crc16_ccitt_false(&buf);
    buf.put_u16_le(crc);
    buf.freeze()
}

fn encode_command(command: &Command, buf: &mut BytesMut) {
    buf.put_u32_le(command.seq.get());
    match command.kind {
        CommandKind::Aim { azimuth, elevation } => {
            put_orientation(buf, Orientation::new(azimuth, elevation));
        }
        CommandKind::Fire { rounds } => buf.put_u16_le(rounds),
        CommandKind::HoldPosition | CommandKind::QueryStatus | CommandKind::Reset => {}
    }
}

fn encode_telemetry(telemetry: &Telemetry, buf: &mut BytesMut) {
    let mut flags = 0u8;
    if telemetry.sequence_ack.is_some() {
        flags |= FLAG_ACK;
    }
    if telemetry.target.is_some() {
        flags |= FLAG_TARGET;
    }
    if telemetry.interlock_fault.is_some() {
        flags |= FLAG_FAULT;
    }
    buf.put_u8(flags);

    if let Some(ack) = telemetry.sequence_ack {
        buf.put_u32_le(ack.get());
    }
    put_orientation(buf, telemetry.orientation);
    buf.put_u16_le(telemetry.ammo_remaining);
    if let Some(target) = telemetry.target {
        put_orientation(buf, target.position);
        buf.put_u8(target.confidence);
    }
    if let Some(fault) = telemetry.interlock_fault {
        buf.put_u16_le(fault);
    }
}

fn put_orientation(buf: &mut BytesMut, orientation: Orientation) {
    buf.put_i32_le(orientation.azimuth.millidegrees());
    buf.put_i32_le(orientation.elevation.millidegrees());
}

/// Decode a frame body.
///
/// Checks run in order: minimum length, checksum, format version, message
/// type, then the exact payload shape of that type.
pub fn decode(body: &[u8]) -> Result<Message, DecodeError> {
    if body.len() < MIN_BODY_SIZE {
        return Err(DecodeError::Truncated {
            needed: MIN_BODY_SIZE,
            actual: body.len(),
        });
    }

    let (content, trailer) = body.split_at(body.len() - CHECKSUM_SIZE);
    let received = u16::from_le_bytes([trailer[0], trailer[1]]);
    let computed = crc16_ccitt_false(content);
    if received != computed {
        return Err(DecodeError::ChecksumMismatch { received, computed });
    }

    let version = content[0];
    if version != FORMAT_VERSION {
        return Err(DecodeError::UnsupportedVersion(version));
    }

    let message_type = MessageType::try_from(content[1]).map_err(DecodeError::UnknownTag)?;
    let payload = Payload {
        message_type,
        bytes: &content[HEADER_SIZE..],
    };

    match message_type {
        MessageType::Aim => {
            let mut p = payload.exact(SEQ_SIZE + ORIENTATION_SIZE)?;
            let seq = read_seq(&mut p, message_type)?;
            let target = read_orientation(&mut p);
            Ok(command(seq, CommandKind::Aim {
                azimuth: target.azimuth,
                elevation: target.elevation,
            }))
        }
        MessageType::Fire => {
            let mut p = payload.exact(SEQ_SIZE + 2)?;
            let seq = read_seq(&mut p, message_type)?;
            let rounds = p.get_u16_le();
            Ok(command(seq, CommandKind::Fire { rounds }))
        }
        MessageType::HoldPosition => {
            let mut p = payload.exact(SEQ_SIZE)?;
            Ok(command(read_seq(&mut p, message_type)?, CommandKind::HoldPosition))
        }
        MessageType::QueryStatus => {
            let mut p = payload.exact(SEQ_SIZE)?;
            Ok(command(read_seq(&mut p, message_type)?, CommandKind::QueryStatus))
        }
        MessageType::Reset => {
            let mut p = payload.exact(SEQ_SIZE)?;
            Ok(command(read_seq(&mut p, message_type)?, CommandKind::Reset))
        }
        MessageType::Discover => {
            payload.exact(0)?;
            Ok(Message::Discover)
        }
        MessageType::Address => {
            let mut p = payload.exact(2)?;
            let port = p.get_u16_le();
            if port == 0 {
                return Err(DecodeError::malformed(message_type.name(), "port must be non-zero"));
            }
            Ok(Message::Address { port })
        }
        MessageType::Telemetry => decode_telemetry(payload).map(Message::Telemetry),
    }
}

fn command(seq: SequenceNumber, kind: CommandKind) -> Message {
    Message::Command(Command::new(seq, kind))
}

fn decode_telemetry(payload: Payload<'_>) -> Result<Telemetry, DecodeError> {
    let message_type = payload.message_type;
    let Some(&flags) = payload.bytes.first() else {
        return Err(payload.truncated(1));
    };
    if flags & !KNOWN_FLAGS != 0 {
        return Err(DecodeError::malformed(
            message_type.name(),
            format!("unknown flag bits 0x{:02x}", flags & !KNOWN_FLAGS),
        ));
    }

    let has_ack = flags & FLAG_ACK != 0;
    let has_target = flags & FLAG_TARGET != 0;
    let has_fault = flags & FLAG_FAULT != 0;

    let expected = 1
        + if has_ack { SEQ_SIZE } else { 0 }
        + ORIENTATION_SIZE
        + 2
        + if has_target { TARGET_SIZE } else { 0 }
        + if has_fault { 2 } else { 0 };

    let mut p = payload.exact(expected)?;
    p.advance(1);

    let sequence_ack = if has_ack {
        Some(read_seq(&mut p, message_type)?)
    } else {
        None
    };
    let orientation = read_orientation(&mut p);
    let ammo_remaining = p.get_u16_le();
    let target = if has_target {
        let position = read_orientation(&mut p);
        let confidence = p.get_u8();
        if confidence > MAX_CONFIDENCE {
            return Err(DecodeError::malformed(
                message_type.name(),
                format!("confidence {confidence} exceeds {MAX_CONFIDENCE}"),
            ));
        }
        Some(TargetSighting {
            position,
            confidence,
        })
    } else {
        None
    };
    let interlock_fault = if has_fault {
        Some(p.get_u16_le())
    } else {
        None
    };

    Ok(Telemetry {
        sequence_ack,
        orientation,
        ammo_remaining,
        target,
        interlock_fault,
    })
}

/// Payload bytes of one message, with the type they claim to be.
#[derive(Clone, Copy)]
struct Payload<'a> {
    message_type: MessageType,
    bytes: &'a [u8],
}

impl<'a> Payload<'a> {
    /// The payload, provided it is exactly `len` bytes long. Every read
    /// after this check stays in bounds.
    fn exact(self, len: usize) -> Result<&'a [u8], DecodeError> {
        if self.bytes.len() < len {
            return Err(self.truncated(len));
        }
        if self.bytes.len() > len {
            return Err(DecodeError::malformed(
                self.message_type.name(),
                format!("{} trailing bytes", self.bytes.len() - len),
            ));
        }
        Ok(self.bytes)
    }

    fn truncated(self, payload_len: usize) -> DecodeError {
        DecodeError::Truncated {
            needed: MIN_BODY_SIZE + payload_len,
            actual: MIN_BODY_SIZE + self.bytes.len(),
        }
    }
}

fn read_seq(p: &mut &[u8], message_type: MessageType) -> Result<SequenceNumber, DecodeError> {
    let raw = p.get_u32_le();
    if raw == 0 {
        return Err(DecodeError::malformed(
            message_type.name(),
            "sequence number zero is reserved",
        ));
    }
    Ok(SequenceNumber::new(raw))
}

fn read_orientation(p: &mut &[u8]) -> Orientation {
    let azimuth = Angle::from_millidegrees(p.get_i32_le());
    let elevation = Angle::from_millidegrees(p.get_i32_le());
    Orientation::new(azimuth, elevation)
}
