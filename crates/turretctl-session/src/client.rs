use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use tracing::{debug, info, warn};
use turretctl_frame::{FrameConfig, FrameReader, FrameWriter};
use turretctl_proto::{decode, encode, Message};
use turretctl_transport::{TcpTransport, TurretStream};

use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::intent::{CommandHandle, Intent, Outcome, TelemetrySnapshot};
use crate::reconciler::Reconciler;
use crate::state::{Health, SessionState, StateMachine, Transition};

/// A live control session with one turret.
///
/// Commands are written on the caller's thread; a worker thread receives
/// telemetry, expires unacknowledged commands, watches link health and
/// reconnects. Both sides share one lock, so a telemetry update is always
/// visible to the next [`submit`](Self::submit).
pub struct TurretClient {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

struct Shared {
    address: String,
    config: SessionConfig,
    closing: AtomicBool,
    core: Mutex<Core>,
}

struct Core {
    machine: StateMachine,
    reconciler: Reconciler,
    link: Option<FrameWriter<TurretStream>>,
    session_id: u64,
    decode_errors: u32,
}

impl TurretClient {
    /// Connect to the turret controller at `address` (`host:port`).
    ///
    /// Retries per `config.reconnect`; fails with [`SessionError::Connect`]
    /// once the attempts are spent. On success the session is Ready and a
    /// status query is already on its way. That query takes sequence
    /// number 1, so the first submitted command carries 2.
    pub fn connect(address: impl Into<String>, config: SessionConfig) -> Result<Self> {
        config.validate()?;
        let now = Instant::now();
        let core = Core {
            machine: StateMachine::new(now),
            reconciler: Reconciler::new(config.max_pending_commands, config.ack_timeout),
            link: None,
            session_id: 0,
            decode_errors: 0,
        };
        let shared = Arc::new(Shared {
            address: address.into(),
            config,
            closing: AtomicBool::new(false),
            core: Mutex::new(core),
        });

        let stream = shared.dial()?;
        let reader = shared.establish(stream)?;

        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("turretctl-session".to_string())
            .spawn(move || run_worker(worker_shared, reader));
        match worker {
            Ok(worker) => Ok(Self {
                shared,
                worker: Mutex::new(Some(worker)),
            }),
            Err(err) => {
                shared.lock_core().shutdown(Instant::now());
                Err(SessionError::Spawn(err))
            }
        }
    }

    /// Submit an intent.
    ///
    /// Rejections are synchronous and nothing is sent for a rejected
    /// intent. An admitted command is written before this returns; its
    /// handle resolves exactly once.
    pub fn submit(&self, intent: Intent) -> Result<CommandHandle> {
        let now = Instant::now();
        let mut core = self.shared.lock_core();
        let state = core.machine.state();
        if state == SessionState::Closed {
            return Err(SessionError::Closed);
        }

        let limits = self.shared.config.safety_limits();
        let admitted = core.reconciler.submit(intent, state, now, &limits);
        core.flush_outbound(now);

        match admitted {
            Ok(handle) => {
                debug!(seq = %handle.seq(), %intent, "command admitted");
                Ok(handle)
            }
            Err(reason) => {
                warn!(%intent, %reason, "command rejected");
                Err(SessionError::Rejected(reason))
            }
        }
    }

    /// Wait for a command's outcome, bounded by `await_result_timeout`.
    ///
    /// On [`SessionError::AwaitTimeout`] the handle stays usable.
    pub fn await_result(&self, handle: &mut CommandHandle) -> Result<Outcome> {
        let waited = self.shared.config.await_result_timeout;
        let seq = handle.seq();
        handle
            .wait(waited)
            .ok_or(SessionError::AwaitTimeout { seq, waited })
    }

    /// Latest telemetry of the current connection, if any has arrived.
    pub fn current_state(&self) -> Option<TelemetrySnapshot> {
        self.shared.lock_core().reconciler.believed().copied()
    }

    pub fn state(&self) -> SessionState {
        self.shared.lock_core().machine.state()
    }

    /// Identifier of the current connection; increments on every reconnect.
    pub fn session_id(&self) -> u64 {
        self.shared.lock_core().session_id
    }

    pub fn pending_commands(&self) -> usize {
        self.shared.lock_core().reconciler.pending_len()
    }

    pub fn address(&self) -> &str {
        &self.shared.address
    }

    pub fn config(&self) -> &SessionConfig {
        &self.shared.config
    }

    /// Close the session. Outstanding commands resolve with
    /// [`Outcome::SessionClosed`]. Idempotent.
    pub fn close(&self) {
        self.shared.closing.store(true, Ordering::Release);
        self.shared.lock_core().shutdown(Instant::now());

        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(worker) = worker {
            worker.thread().unpark();
            if worker.join().is_err() {
                warn!("session worker panicked");
            }
        }
    }
}

impl Drop for TurretClient {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for TurretClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurretClient")
            .field("address", &self.shared.address)
            .field("state", &self.state())
            .finish()
    }
}

impl Shared {
    fn lock_core(&self) -> MutexGuard<'_, Core> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_closing(&self) -> bool {
        self.closing.load(Ordering::Acquire)
    }

    /// Open a TCP link, retrying with backoff.
    fn dial(&self) -> Result<TurretStream> {
        let policy = self.config.reconnect;
        let mut attempt = 0;
        loop {
            attempt += 1;
            if self.is_closing() {
                return Err(SessionError::Closed);
            }
            log_transition(self.lock_core().machine.begin_connect(Instant::now()));

            let err = match TcpTransport::connect(&self.address, self.config.connect_timeout) {
                Ok(stream) => return Ok(stream),
                Err(err) => err,
            };
            log_transition(self.lock_core().machine.connect_failed(Instant::now()));

            if attempt >= policy.max_attempts || !err.is_retryable() {
                return Err(SessionError::Connect {
                    address: self.address.clone(),
                    attempts: attempt,
                    source: err,
                });
            }

            let delay = policy.backoff(attempt);
            warn!(address = %self.address, attempt, ?delay, error = %err, "connect failed; retrying");
            let until = Instant::now() + delay;
            while !self.is_closing() {
                let now = Instant::now();
                if now >= until {
                    break;
                }
                thread::park_timeout(until - now);
            }
        }
    }

    /// Install a freshly dialled stream as the session link.
    fn establish(&self, stream: TurretStream) -> Result<FrameReader<TurretStream>> {
        let mut core = self.lock_core();
        if self.is_closing() {
            let _ = stream.shutdown();
            return Err(SessionError::Closed);
        }

        let frame_config = FrameConfig {
            max_frame_size: self.config.max_frame_size,
            read_timeout: Some(self.config.poll_interval),
            write_timeout: Some(self.config.write_timeout),
        };
        let reader = FrameReader::with_config_stream(stream.try_clone()?, frame_config.clone())?;
        let writer = FrameWriter::with_config_stream(stream, frame_config)?;

        let now = Instant::now();
        core.session_id += 1;
        core.decode_errors = 0;
        core.link = Some(writer);
        log_transition(core.machine.established(now));
        core.reconciler.begin_session(now);
        info!(address = %self.address, session_id = core.session_id, "turret session established");
        core.flush_outbound(now);
        Ok(reader)
    }

    /// Redial after link loss. `None` means the session is over.
    fn reconnect(&self) -> Option<FrameReader<TurretStream>> {
        let result = self.dial().and_then(|stream| self.establish(stream));
        match result {
            Ok(reader) => Some(reader),
            Err(SessionError::Closed) => None,
            Err(err) => {
                warn!(address = %self.address, error = %err, "reconnect failed; closing session");
                self.lock_core().shutdown(Instant::now());
                None
            }
        }
    }
}

impl Core {
    /// Write everything the reconciler has queued. A failed write drops
    /// the link.
    fn flush_outbound(&mut self, now: Instant) {
        while let Some(command) = self.reconciler.pop_outbound() {
            let Some(writer) = self.link.as_mut() else {
                break;
            };
            let body = encode(&Message::Command(command));
            match writer.send(&body) {
                Ok(()) => debug!(seq = %command.seq, command = command.kind.name(), "command sent"),
                Err(err) => {
                    warn!(seq = %command.seq, error = %err, "command write failed");
                    self.drop_link(now, "write failed");
                    break;
                }
            }
        }
    }

    fn on_frame(&mut self, body: &[u8], now: Instant, max_decode_errors: u32) {
        match decode(body) {
            Ok(Message::Telemetry(telemetry)) => {
                self.decode_errors = 0;
                let snapshot = TelemetrySnapshot {
                    telemetry,
                    received_at: now,
                    session_id: self.session_id,
                };
                log_transition(self.machine.on_telemetry(now));
                if let Some(seq) = self.reconciler.on_telemetry(snapshot) {
                    debug!(%seq, "command acknowledged");
                }
            }
            Ok(other) => {
                warn!(message = other.message_type().name(), "unexpected message from turret dropped");
            }
            Err(err) => {
                self.decode_errors += 1;
                warn!(error = %err, consecutive = self.decode_errors, "undecodable frame dropped");
                if self.decode_errors > max_decode_errors {
                    self.drop_link(now, "too many undecodable frames");
                }
            }
        }
    }

    /// Periodic work: expiry, health, owed re-sync, keepalive.
    fn tick(&mut self, now: Instant, config: &SessionConfig) {
        self.reconciler.sweep(now);

        match self
            .machine
            .check_health(now, config.heartbeat_interval, config.degraded_timeout)
        {
            Health::Steady => {}
            Health::Degraded(transition) => {
                warn!(session_id = self.session_id, "telemetry silent; session degraded");
                log_transition(Some(transition));
            }
            Health::LinkDead => {
                self.drop_link(now, "telemetry silent too long");
                return;
            }
        }

        if self.reconciler.resync_if_owed(now) {
            debug!("status re-sync queued after unconfirmed fire");
        }
        if let Some(interval) = config.keepalive_interval {
            let quiet = self.machine.silence(now).is_some_and(|s| s >= interval);
            if quiet && self.reconciler.keepalive(now) {
                debug!("keepalive status query queued");
            }
        }
        self.flush_outbound(now);
    }

    /// Tear down the current link, failing everything in flight.
    /// No-op without a link.
    fn drop_link(&mut self, now: Instant, reason: &str) {
        let Some(writer) = self.link.take() else {
            return;
        };
        let _ = writer.get_ref().shutdown();
        warn!(session_id = self.session_id, reason, "turret link lost");
        log_transition(self.machine.link_lost(now));
        let failed = self.reconciler.fail_all(Outcome::ConnectionLost);
        if failed > 0 {
            warn!(failed, "pending commands failed by link loss");
        }
        self.decode_errors = 0;
    }

    fn shutdown(&mut self, now: Instant) {
        if let Some(writer) = self.link.take() {
            let _ = writer.get_ref().shutdown();
        }
        log_transition(self.machine.close(now));
        self.reconciler.fail_all(Outcome::SessionClosed);
    }
}

fn log_transition(transition: Option<Transition>) {
    if let Some(Transition { from, to }) = transition {
        info!(%from, %to, "session state changed");
    }
}

fn run_worker(shared: Arc<Shared>, mut reader: FrameReader<TurretStream>) {
    let max_decode_errors = shared.config.max_decode_errors;
    loop {
        let read = reader.read_frame();
        let now = Instant::now();

        let linked = {
            let mut core = shared.lock_core();
            if shared.is_closing() {
                break;
            }
            match read {
                Ok(body) => core.on_frame(&body, now, max_decode_errors),
                Err(err) if err.is_timeout() => {}
                Err(err) => core.drop_link(now, &err.to_string()),
            }
            if core.link.is_some() {
                core.tick(now, &shared.config);
            }
            core.link.is_some()
        };

        if !linked {
            match shared.reconnect() {
                Some(next) => reader = next,
                None => break,
            }
        }
    }
    debug!("session worker stopped");
}
