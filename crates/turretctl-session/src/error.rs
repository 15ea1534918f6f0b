use std::time::Duration;

use turretctl_proto::SequenceNumber;

use crate::interlock::Denial;
use crate::state::SessionState;

/// Why a submission was refused. Always synchronous; nothing was sent
/// for the refused command.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RejectReason {
    /// The pending set is at its bound.
    #[error("pending set full ({limit} commands outstanding)")]
    PendingSetFull { limit: usize },

    /// The safety interlock denied the command.
    #[error("safety interlock: {0}")]
    SafetyViolation(Denial),

    /// The session state does not permit this command.
    #[error("session is {0}")]
    SessionNotReady(SessionState),

    /// Another Fire is still awaiting acknowledgement.
    #[error("fire {0} is still pending")]
    FireInProgress(SequenceNumber),

    /// A status re-sync after an unconfirmed Fire has not completed yet.
    #[error("waiting for status re-sync")]
    ResyncPending,

    /// Every sequence number has been issued.
    #[error("sequence numbers exhausted")]
    SequenceExhausted,
}

/// Errors that can occur in session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The configuration would leave a blocking point unbounded.
    #[error("invalid session config: {0}")]
    InvalidConfig(String),

    /// The turret could not be reached within the retry budget.
    #[error("could not connect to {address} after {attempts} attempt(s): {source}")]
    Connect {
        address: String,
        attempts: u32,
        #[source]
        source: turretctl_transport::TransportError,
    },

    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] turretctl_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] turretctl_frame::FrameError),

    /// A received message could not be decoded.
    #[error("decode error: {0}")]
    Decode(#[from] turretctl_proto::DecodeError),

    /// The command was refused before transmission.
    #[error("command rejected: {0}")]
    Rejected(RejectReason),

    /// No outcome arrived within the wait bound. The handle stays valid.
    #[error("no outcome for {seq} after {waited:?}")]
    AwaitTimeout {
        seq: SequenceNumber,
        waited: Duration,
    },

    /// A discovery reply was not an address announcement.
    #[error("unexpected discovery reply: {0}")]
    UnexpectedReply(&'static str),

    /// The session worker thread could not be started.
    #[error("failed to spawn session worker: {0}")]
    Spawn(#[source] std::io::Error),

    /// The session has been closed.
    #[error("session closed")]
    Closed,
}

impl SessionError {
    /// The rejection reason, for refused submissions.
    pub fn reject_reason(&self) -> Option<&RejectReason> {
        match self {
            SessionError::Rejected(reason) => Some(reason),
            _ => None,
        }
    }
}

impl From<Denial> for RejectReason {
    fn from(denial: Denial) -> Self {
        RejectReason::SafetyViolation(denial)
    }
}

impl From<Denial> for SessionError {
    fn from(denial: Denial) -> Self {
        SessionError::Rejected(denial.into())
    }
}

impl From<RejectReason> for SessionError {
    fn from(reason: RejectReason) -> Self {
        SessionError::Rejected(reason)
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
