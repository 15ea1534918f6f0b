use std::fmt;
use std::io;

use turretctl_frame::FrameError;
use turretctl_session::{Outcome, RejectReason, SessionError};
use turretctl_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
/// The safety interlock refused the command.
pub const SAFETY_DENIED: i32 = 40;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => FAILURE,
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted => TRANSPORT_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::ConnectTimeout { .. } | TransportError::NoReply(_) => {
            CliError::new(TIMEOUT, format!("{context}: {err}"))
        }
        TransportError::Resolve { .. } => CliError::new(USAGE, format!("{context}: {err}")),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::PayloadTooLarge { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn session_error(context: &str, err: SessionError) -> CliError {
    match err {
        SessionError::Connect { source, .. } => transport_error(context, source),
        SessionError::Transport(err) => transport_error(context, err),
        SessionError::Frame(err) => frame_error(context, err),
        SessionError::Decode(_) | SessionError::UnexpectedReply(_) => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        SessionError::InvalidConfig(_) => CliError::new(USAGE, format!("{context}: {err}")),
        SessionError::Rejected(RejectReason::SafetyViolation(_)) => {
            CliError::new(SAFETY_DENIED, format!("{context}: {err}"))
        }
        SessionError::Rejected(_) | SessionError::Closed => {
            CliError::new(FAILURE, format!("{context}: {err}"))
        }
        SessionError::AwaitTimeout { .. } => CliError::new(TIMEOUT, format!("{context}: {err}")),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

/// Exit code for a resolved command.
pub fn outcome_code(outcome: &Outcome) -> i32 {
    match outcome {
        Outcome::Acknowledged(_) => SUCCESS,
        Outcome::CommandTimeout => TIMEOUT,
        Outcome::ConnectionLost => TRANSPORT_ERROR,
        Outcome::SessionClosed => FAILURE,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use turretctl_session::Denial;

    use super::*;

    #[test]
    fn safety_rejection_has_its_own_code() {
        let err = session_error(
            "fire",
            SessionError::Rejected(RejectReason::SafetyViolation(Denial::AmmoDepleted)),
        );
        assert_eq!(err.code, SAFETY_DENIED);
        assert!(err.message.contains("no ammunition"));
    }

    #[test]
    fn other_rejections_are_plain_failures() {
        let err = session_error("fire", SessionError::Rejected(RejectReason::ResyncPending));
        assert_eq!(err.code, FAILURE);
    }

    #[test]
    fn connect_timeouts_map_to_timeout() {
        let err = session_error(
            "connect",
            SessionError::Connect {
                address: "10.0.0.9:12345".to_string(),
                attempts: 3,
                source: TransportError::ConnectTimeout {
                    addr: "10.0.0.9:12345".to_string(),
                    timeout: Duration::from_secs(2),
                },
            },
        );
        assert_eq!(err.code, TIMEOUT);
    }

    #[test]
    fn refused_connect_is_a_transport_error() {
        let err = transport_error(
            "connect",
            TransportError::Connect {
                addr: "127.0.0.1:1".to_string(),
                source: io::Error::from(io::ErrorKind::ConnectionRefused),
            },
        );
        assert_eq!(err.code, TRANSPORT_ERROR);
    }

    #[test]
    fn outcomes_map_to_codes() {
        assert_eq!(outcome_code(&Outcome::CommandTimeout), TIMEOUT);
        assert_eq!(outcome_code(&Outcome::ConnectionLost), TRANSPORT_ERROR);
        assert_eq!(outcome_code(&Outcome::SessionClosed), FAILURE);
    }
}
