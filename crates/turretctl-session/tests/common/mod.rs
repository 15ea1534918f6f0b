//! A scripted turret controller on loopback TCP.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use turretctl_frame::{FrameReader, FrameWriter};
use turretctl_proto::{decode, encode, Command, CommandKind, Message, Orientation, Telemetry};
use turretctl_session::SessionConfig;
use turretctl_transport::TcpTransport;

/// What the simulated hardware currently looks like.
#[derive(Debug, Clone, Copy)]
pub struct Model {
    pub orientation: Orientation,
    pub ammo: u16,
    pub fault: Option<u16>,
}

impl Default for Model {
    fn default() -> Self {
        Self {
            orientation: Orientation::degrees(0.0, 0.0),
            ammo: 10,
            fault: None,
        }
    }
}

impl Model {
    fn apply(&mut self, kind: &CommandKind) {
        match *kind {
            CommandKind::Aim { azimuth, elevation } => {
                self.orientation = Orientation::new(azimuth, elevation);
            }
            CommandKind::Fire { rounds } => self.ammo = self.ammo.saturating_sub(rounds),
            CommandKind::Reset => self.fault = None,
            CommandKind::HoldPosition | CommandKind::QueryStatus => {}
        }
    }

    fn report(&self, command: &Command) -> Telemetry {
        Telemetry {
            sequence_ack: Some(command.seq),
            orientation: self.orientation,
            ammo_remaining: self.ammo,
            target: None,
            interlock_fault: self.fault,
        }
    }
}

/// How the turret answers one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    /// Execute and acknowledge.
    Ack,
    /// Swallow the command.
    Silent,
    /// Drop the connection without answering.
    Hangup,
    /// Answer with this many frames that fail their checksum.
    Garbage(usize),
}

/// Context handed to the scripting closure.
pub struct Turn<'a> {
    /// Zero-based index of the accepted connection.
    pub connection: usize,
    pub command: &'a Command,
    pub model: &'a mut Model,
}

pub struct FakeTurret {
    pub addr: SocketAddr,
    received: Arc<Mutex<Vec<Command>>>,
}

impl FakeTurret {
    /// Serve up to `connections` connections, answering each command as
    /// `script` says. The listener closes once the last one is accepted,
    /// so later dials are refused.
    pub fn spawn<F>(connections: usize, model: Model, mut script: F) -> Self
    where
        F: FnMut(Turn<'_>) -> Reply + Send + 'static,
    {
        let listener = TcpTransport::bind("127.0.0.1:0").expect("fake turret should bind");
        let addr = listener.local_addr();
        let received = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&received);

        thread::spawn(move || {
            let mut model = model;
            let mut listener = Some(listener);
            for connection in 0..connections {
                let Some(Ok(stream)) = listener.as_ref().map(TcpTransport::accept) else {
                    return;
                };
                if connection + 1 == connections {
                    listener = None;
                }
                let mut reader =
                    FrameReader::new(stream.try_clone().expect("stream should clone"));
                let mut writer = FrameWriter::new(stream);

                while let Ok(body) = reader.read_frame() {
                    let Ok(Message::Command(command)) = decode(&body) else {
                        continue;
                    };
                    log.lock().expect("log lock").push(command);

                    let turn = Turn {
                        connection,
                        command: &command,
                        model: &mut model,
                    };
                    match script(turn) {
                        Reply::Ack => {
                            model.apply(&command.kind);
                            let report = Message::Telemetry(model.report(&command));
                            if writer.send(&encode(&report)).is_err() {
                                break;
                            }
                        }
                        Reply::Silent => {}
                        Reply::Garbage(frames) => {
                            let corrupt = corrupt_telemetry(&model.report(&command));
                            for _ in 0..frames {
                                if writer.send(&corrupt).is_err() {
                                    break;
                                }
                            }
                        }
                        Reply::Hangup => {
                            let _ = writer.get_ref().shutdown();
                            break;
                        }
                    }
                }
            }
        });

        Self { addr, received }
    }

    pub fn address(&self) -> String {
        self.addr.to_string()
    }

    /// Every command received so far, in arrival order.
    pub fn received(&self) -> Vec<Command> {
        self.received.lock().expect("log lock").clone()
    }

    pub fn received_kinds(&self) -> Vec<CommandKind> {
        self.received().into_iter().map(|c| c.kind).collect()
    }
}

/// A telemetry body with its checksum flipped.
fn corrupt_telemetry(report: &Telemetry) -> Vec<u8> {
    let mut body = encode(&Message::Telemetry(*report)).to_vec();
    if let Some(last) = body.last_mut() {
        *last ^= 0xff;
    }
    body
}

/// Config with short timings so tests finish quickly.
pub fn fast_config() -> SessionConfig {
    SessionConfig {
        connect_timeout: Duration::from_millis(500),
        heartbeat_interval: Duration::from_secs(5),
        degraded_timeout: Duration::from_secs(5),
        ack_timeout: Duration::from_millis(500),
        poll_interval: Duration::from_millis(10),
        keepalive_interval: None,
        await_result_timeout: Duration::from_secs(3),
        ..SessionConfig::default()
    }
}

/// Poll `condition` until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}
