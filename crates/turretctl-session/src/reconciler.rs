//! Command/telemetry reconciliation.
//!
//! The reconciler owns the sequence counter, the pending set and the
//! believed turret state. It never touches the network: admitted commands
//! are queued in an outbox that the session drains onto the wire, in
//! order, while still holding the same lock.

use std::collections::{BTreeMap, VecDeque};
use std::sync::mpsc::{self, SyncSender};
use std::time::{Duration, Instant};

use tracing::{debug, warn};
use turretctl_proto::{Command, CommandKind, Orientation, SequenceNumber};

use crate::config::SafetyLimits;
use crate::error::RejectReason;
use crate::intent::{CommandHandle, Intent, Outcome, TelemetrySnapshot};
use crate::interlock;
use crate::state::SessionState;

/// Who is waiting on a pending command.
#[derive(Debug)]
enum Origin {
    Caller(SyncSender<Outcome>),
    /// Status query confirming turret state after an unconfirmed Fire or
    /// a fresh connection.
    Resync,
    Keepalive,
}

#[derive(Debug)]
struct Pending {
    kind: CommandKind,
    sent_at: Instant,
    origin: Origin,
}

impl Pending {
    fn resolve(self, seq: SequenceNumber, outcome: Outcome) {
        if let Origin::Caller(tx) = self.origin {
            // A caller that dropped its handle no longer cares.
            let _ = tx.try_send(outcome);
        }
        debug!(%seq, command = self.kind.name(), outcome = outcome.name(), "command resolved");
    }
}

/// Sequence counter, pending set and believed state for one client.
#[derive(Debug)]
pub struct Reconciler {
    next_seq: Option<SequenceNumber>,
    pending: BTreeMap<SequenceNumber, Pending>,
    believed: Option<TelemetrySnapshot>,
    /// A Fire ended without confirmation; turret state must be re-read.
    resync_needed: bool,
    /// The status query currently doing that re-read.
    resync_seq: Option<SequenceNumber>,
    outbox: VecDeque<Command>,
    max_pending: usize,
    ack_timeout: Duration,
}

impl Reconciler {
    pub fn new(max_pending: usize, ack_timeout: Duration) -> Self {
        Self {
            next_seq: Some(SequenceNumber::FIRST),
            pending: BTreeMap::new(),
            believed: None,
            resync_needed: false,
            resync_seq: None,
            outbox: VecDeque::new(),
            max_pending,
            ack_timeout,
        }
    }

    /// Most recent telemetry of the current connection.
    pub fn believed(&self) -> Option<&TelemetrySnapshot> {
        self.believed.as_ref()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, seq: SequenceNumber) -> bool {
        self.pending.contains_key(&seq)
    }

    /// Whether turret state must be confirmed before the next Fire.
    pub fn resync_outstanding(&self) -> bool {
        self.resync_needed || self.resync_seq.is_some()
    }

    /// Next command waiting to be written.
    pub fn pop_outbound(&mut self) -> Option<Command> {
        self.outbox.pop_front()
    }

    /// Admit a caller intent.
    ///
    /// Checks run in order: session state, capacity, the Fire gates, the
    /// safety interlock and sequence space. Only an admitted command queues
    /// anything: an owed status re-sync first, then the command itself.
    pub fn submit(
        &mut self,
        intent: Intent,
        state: SessionState,
        now: Instant,
        limits: &SafetyLimits,
    ) -> Result<CommandHandle, RejectReason> {
        if !state.permits(&intent) {
            return Err(RejectReason::SessionNotReady(state));
        }

        let emit_resync = self.resync_needed && self.resync_seq.is_none();
        let slots = if emit_resync { 2 } else { 1 };
        if self.pending.len() + slots > self.max_pending {
            return Err(RejectReason::PendingSetFull {
                limit: self.max_pending,
            });
        }

        if intent.is_fire() {
            if self.resync_outstanding() {
                return Err(RejectReason::ResyncPending);
            }
            if let Some((seq, _)) = self.pending.iter().find(|(_, p)| p.kind.is_fire()) {
                return Err(RejectReason::FireInProgress(*seq));
            }
        }

        let staleness = self
            .believed
            .map(|snapshot| snapshot.age(now))
            .unwrap_or_default();
        let pending_aims: Vec<Orientation> = self
            .pending
            .values()
            .filter_map(|p| p.kind.aim_target())
            .collect();
        interlock::allow(
            &intent,
            self.believed.as_ref().map(|s| &s.telemetry),
            staleness,
            &pending_aims,
            limits,
        )
        .map_err(RejectReason::SafetyViolation)?;

        if !self.sequence_numbers_left(slots) {
            return Err(RejectReason::SequenceExhausted);
        }
        if emit_resync {
            self.issue_resync(now)?;
        }
        let seq = self.allocate()?;
        let (tx, rx) = mpsc::sync_channel(1);
        self.enqueue(seq, intent.command_kind(), now, Origin::Caller(tx));
        Ok(CommandHandle::new(seq, intent, rx))
    }

    /// Apply one telemetry report: update believed state and resolve the
    /// command it acknowledges. Unknown or repeated acks change nothing
    /// else.
    pub fn on_telemetry(&mut self, snapshot: TelemetrySnapshot) -> Option<SequenceNumber> {
        self.believed = Some(snapshot);

        let seq = snapshot.telemetry.sequence_ack?;
        let Some(pending) = self.pending.remove(&seq) else {
            debug!(%seq, "ack for unknown or resolved command ignored");
            return None;
        };
        if self.resync_seq == Some(seq) {
            debug!(%seq, "status re-sync confirmed");
            self.resync_seq = None;
            self.resync_needed = false;
        }
        pending.resolve(seq, Outcome::Acknowledged(snapshot));
        Some(seq)
    }

    /// Expire commands that have waited longer than the ack timeout.
    /// Returns how many expired.
    pub fn sweep(&mut self, now: Instant) -> usize {
        let ack_timeout = self.ack_timeout;
        let expired: Vec<SequenceNumber> = self
            .pending
            .iter()
            .filter(|(_, p)| now.saturating_duration_since(p.sent_at) >= ack_timeout)
            .map(|(seq, _)| *seq)
            .collect();

        for seq in &expired {
            if let Some(pending) = self.pending.remove(seq) {
                warn!(%seq, command = pending.kind.name(), "command not acknowledged in time");
                self.note_unconfirmed(*seq, &pending);
                pending.resolve(*seq, Outcome::CommandTimeout);
            }
        }
        expired.len()
    }

    /// Resolve every pending command with `outcome` and drop queued
    /// writes. Used on link loss and on close.
    pub fn fail_all(&mut self, outcome: Outcome) -> usize {
        self.outbox.clear();
        let drained = std::mem::take(&mut self.pending);
        let count = drained.len();
        for (seq, pending) in drained {
            self.note_unconfirmed(seq, &pending);
            pending.resolve(seq, outcome);
        }
        count
    }

    /// Start a new connection: forget believed state from the previous
    /// one and query the turret's status. The query doubles as the re-sync
    /// query, so Fire stays gated until it is answered.
    pub fn begin_session(&mut self, now: Instant) {
        self.believed = None;
        self.outbox.clear();
        self.resync_seq = None;
        if self.pending.len() >= self.max_pending {
            self.resync_needed = true;
            return;
        }
        if self.issue_resync(now).is_err() {
            self.resync_needed = true;
        }
    }

    /// Queue the status re-sync owed after an unconfirmed Fire, if it is
    /// not already in flight. Returns whether one was queued.
    pub fn resync_if_owed(&mut self, now: Instant) -> bool {
        if !self.resync_needed || self.resync_seq.is_some() {
            return false;
        }
        if self.pending.len() >= self.max_pending {
            return false;
        }
        self.issue_resync(now).is_ok()
    }

    /// Queue an internal status query if none is already outstanding.
    /// Returns whether one was queued.
    pub fn keepalive(&mut self, now: Instant) -> bool {
        let internal_pending = self
            .pending
            .values()
            .any(|p| !matches!(p.origin, Origin::Caller(_)));
        if internal_pending || self.pending.len() >= self.max_pending {
            return false;
        }
        match self.allocate() {
            Ok(seq) => {
                self.enqueue(seq, CommandKind::QueryStatus, now, Origin::Keepalive);
                true
            }
            Err(_) => false,
        }
    }

    fn issue_resync(&mut self, now: Instant) -> Result<(), RejectReason> {
        let seq = self.allocate()?;
        debug!(%seq, "issuing status re-sync");
        self.resync_seq = Some(seq);
        self.enqueue(seq, CommandKind::QueryStatus, now, Origin::Resync);
        Ok(())
    }

    /// Book-keeping for a command that ended without an ack.
    fn note_unconfirmed(&mut self, seq: SequenceNumber, pending: &Pending) {
        if pending.kind.is_fire() {
            self.resync_needed = true;
        }
        if self.resync_seq == Some(seq) {
            self.resync_seq = None;
            self.resync_needed = true;
        }
    }

    fn sequence_numbers_left(&self, count: usize) -> bool {
        std::iter::successors(self.next_seq, |seq| seq.next())
            .take(count)
            .count()
            == count
    }

    fn allocate(&mut self) -> Result<SequenceNumber, RejectReason> {
        let seq = self.next_seq.ok_or(RejectReason::SequenceExhausted)?;
        self.next_seq = seq.next();
        Ok(seq)
    }

    fn enqueue(&mut self, seq: SequenceNumber, kind: CommandKind, now: Instant, origin: Origin) {
        self.pending.insert(
            seq,
            Pending {
                kind,
                sent_at: now,
                origin,
            },
        );
        self.outbox.push_back(Command::new(seq, kind));
    }
}
