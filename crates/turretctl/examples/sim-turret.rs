//! Loopback turret simulator.
//!
//! Answers every command with a telemetry report, slews instantly, counts
//! ammunition down and "sees" a target near az 12° el 4°. Also answers
//! discovery requests.
//!
//! Run with:
//!   cargo run --example sim-turret -- 127.0.0.1:12345
//!
//! In another terminal:
//!   cargo run --features cli -- discover --target 127.0.0.1:12346
//!   cargo run --features cli -- aim 127.0.0.1:12345 --azimuth 12 --elevation 4
//!   cargo run --features cli -- fire 127.0.0.1:12345 --rounds 2

use std::net::UdpSocket;
use std::thread;

use turretctl::frame::{FrameReader, FrameWriter};
use turretctl::proto::{
    decode, encode, CommandKind, Message, Orientation, TargetSighting, Telemetry,
};
use turretctl::session::DEFAULT_DISCOVERY_PORT;
use turretctl::transport::{TcpTransport, TurretStream};

const MAGAZINE: u16 = 24;

struct Turret {
    orientation: Orientation,
    ammo: u16,
    target: Orientation,
}

impl Turret {
    fn apply(&mut self, kind: CommandKind) {
        match kind {
            CommandKind::Aim { azimuth, elevation } => {
                self.orientation = Orientation::new(azimuth, elevation);
            }
            CommandKind::Fire { rounds } => {
                self.ammo = self.ammo.saturating_sub(rounds);
                eprintln!("  bang x{rounds} ({} left)", self.ammo);
            }
            CommandKind::Reset => self.ammo = MAGAZINE,
            CommandKind::HoldPosition | CommandKind::QueryStatus => {}
        }
    }

    fn sighting(&self) -> Option<TargetSighting> {
        let off_az = (self.orientation.azimuth.degrees() - self.target.azimuth.degrees()).abs();
        let off_el = (self.orientation.elevation.degrees() - self.target.elevation.degrees()).abs();
        let off = off_az.max(off_el);
        (off < 20.0).then(|| TargetSighting {
            position: self.target,
            confidence: (100.0 - off * 5.0).clamp(0.0, 100.0) as u8,
        })
    }

    fn report(&self, ack: Option<turretctl::proto::SequenceNumber>) -> Telemetry {
        Telemetry {
            sequence_ack: ack,
            orientation: self.orientation,
            ammo_remaining: self.ammo,
            target: self.sighting(),
            interlock_fault: None,
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:12345".to_string());
    let listener = TcpTransport::bind(addr.as_str())?;
    let port = listener.local_addr().port();
    eprintln!("Turret simulator listening on {}", listener.local_addr());

    let discovery = UdpSocket::bind(("0.0.0.0", DEFAULT_DISCOVERY_PORT))?;
    thread::spawn(move || answer_discovery(&discovery, port));

    let mut turret = Turret {
        orientation: Orientation::default(),
        ammo: MAGAZINE,
        target: Orientation::degrees(12.0, 4.0),
    };

    loop {
        let stream = listener.accept()?;
        eprintln!("Client connected");
        if let Err(err) = serve(stream, &mut turret) {
            eprintln!("Client disconnected: {err}");
        }
    }
}

fn serve(stream: TurretStream, turret: &mut Turret) -> Result<(), Box<dyn std::error::Error>> {
    let mut reader = FrameReader::new(stream.try_clone()?);
    let mut writer = FrameWriter::new(stream);

    loop {
        let body = reader.read_frame()?;
        let command = match decode(&body) {
            Ok(Message::Command(command)) => command,
            Ok(other) => {
                eprintln!("  ignoring {}", other.message_type().name());
                continue;
            }
            Err(err) => {
                eprintln!("  bad frame: {err}");
                continue;
            }
        };
        eprintln!("{} {}", command.seq, command.kind.name());
        turret.apply(command.kind);
        writer.send(&encode(&Message::Telemetry(turret.report(Some(command.seq)))))?;
    }
}

fn answer_discovery(socket: &UdpSocket, port: u16) {
    let mut buf = [0u8; 64];
    while let Ok((n, from)) = socket.recv_from(&mut buf) {
        if matches!(decode(&buf[..n]), Ok(Message::Discover)) {
            eprintln!("Discovery request from {from}");
            let _ = socket.send_to(&encode(&Message::Address { port }), from);
        }
    }
}
