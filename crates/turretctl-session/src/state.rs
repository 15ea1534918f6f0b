use std::fmt;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::intent::Intent;

/// Lifecycle state of a turret session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionState {
    Disconnected,
    Connecting,
    /// Linked and hearing telemetry.
    Ready,
    /// Linked but telemetry has gone quiet.
    Degraded,
    /// Terminal.
    Closed,
}

impl SessionState {
    pub fn name(self) -> &'static str {
        match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::Ready => "ready",
            SessionState::Degraded => "degraded",
            SessionState::Closed => "closed",
        }
    }

    /// Whether `intent` may be submitted in this state.
    ///
    /// Degraded still lets the caller stop the turret, clear a fault or
    /// ask for status; nothing that moves or fires.
    pub fn permits(self, intent: &Intent) -> bool {
        match self {
            SessionState::Ready => true,
            SessionState::Degraded => matches!(
                intent,
                Intent::QueryStatus | Intent::HoldPosition | Intent::Reset
            ),
            SessionState::Disconnected | SessionState::Connecting | SessionState::Closed => false,
        }
    }

    pub fn is_linked(self) -> bool {
        matches!(self, SessionState::Ready | SessionState::Degraded)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A state change, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: SessionState,
    pub to: SessionState,
}

/// Result of a health check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Health {
    Steady,
    /// Telemetry went quiet; the session just degraded.
    Degraded(Transition),
    /// Degraded for too long; the link should be dropped.
    LinkDead,
}

/// Session lifecycle driven by connection events and telemetry arrival.
///
/// Time is always passed in, so the machine itself never reads a clock.
/// `Closed` absorbs every event.
#[derive(Debug, Clone)]
pub struct StateMachine {
    state: SessionState,
    entered_at: Instant,
    last_heard: Option<Instant>,
}

impl StateMachine {
    pub fn new(now: Instant) -> Self {
        Self {
            state: SessionState::Disconnected,
            entered_at: now,
            last_heard: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// How long the current state has lasted.
    pub fn time_in_state(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.entered_at)
    }

    /// Time since the last telemetry (or since the link came up).
    pub fn silence(&self, now: Instant) -> Option<Duration> {
        self.last_heard
            .map(|heard| now.saturating_duration_since(heard))
    }

    pub fn begin_connect(&mut self, now: Instant) -> Option<Transition> {
        match self.state {
            SessionState::Disconnected => self.enter(SessionState::Connecting, now),
            _ => None,
        }
    }

    pub fn established(&mut self, now: Instant) -> Option<Transition> {
        match self.state {
            SessionState::Connecting => {
                self.last_heard = Some(now);
                self.enter(SessionState::Ready, now)
            }
            _ => None,
        }
    }

    pub fn connect_failed(&mut self, now: Instant) -> Option<Transition> {
        match self.state {
            SessionState::Connecting => self.enter(SessionState::Disconnected, now),
            _ => None,
        }
    }

    pub fn link_lost(&mut self, now: Instant) -> Option<Transition> {
        match self.state {
            SessionState::Connecting | SessionState::Ready | SessionState::Degraded => {
                self.last_heard = None;
                self.enter(SessionState::Disconnected, now)
            }
            _ => None,
        }
    }

    /// Telemetry arrived. Recovers a degraded session.
    pub fn on_telemetry(&mut self, now: Instant) -> Option<Transition> {
        if !self.state.is_linked() {
            return None;
        }
        self.last_heard = Some(now);
        match self.state {
            SessionState::Degraded => self.enter(SessionState::Ready, now),
            _ => None,
        }
    }

    /// Apply the telemetry-silence rules.
    pub fn check_health(
        &mut self,
        now: Instant,
        heartbeat_interval: Duration,
        degraded_timeout: Duration,
    ) -> Health {
        match self.state {
            SessionState::Ready => match self.silence(now) {
                Some(quiet) if quiet > heartbeat_interval => self
                    .enter(SessionState::Degraded, now)
                    .map_or(Health::Steady, Health::Degraded),
                _ => Health::Steady,
            },
            SessionState::Degraded if self.time_in_state(now) > degraded_timeout => {
                Health::LinkDead
            }
            _ => Health::Steady,
        }
    }

    pub fn close(&mut self, now: Instant) -> Option<Transition> {
        self.last_heard = None;
        self.enter(SessionState::Closed, now)
    }

    fn enter(&mut self, to: SessionState, now: Instant) -> Option<Transition> {
        let from = self.state;
        if from == SessionState::Closed || from == to {
            return None;
        }
        self.state = to;
        self.entered_at = now;
        Some(Transition { from, to })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEARTBEAT: Duration = Duration::from_millis(100);
    const DEGRADED: Duration = Duration::from_millis(300);

    fn ready(now: Instant) -> StateMachine {
        let mut machine = StateMachine::new(now);
        machine.begin_connect(now);
        machine.established(now);
        machine
    }

    #[test]
    fn connect_lifecycle() {
        let t0 = Instant::now();
        let mut machine = StateMachine::new(t0);
        assert_eq!(machine.state(), SessionState::Disconnected);

        assert_eq!(
            machine.begin_connect(t0),
            Some(Transition {
                from: SessionState::Disconnected,
                to: SessionState::Connecting
            })
        );
        assert_eq!(
            machine.connect_failed(t0).map(|t| t.to),
            Some(SessionState::Disconnected)
        );
        machine.begin_connect(t0);
        assert_eq!(machine.established(t0).map(|t| t.to), Some(SessionState::Ready));
    }

    #[test]
    fn established_only_from_connecting() {
        let t0 = Instant::now();
        let mut machine = StateMachine::new(t0);
        assert_eq!(machine.established(t0), None);
        assert_eq!(machine.state(), SessionState::Disconnected);
    }

    #[test]
    fn silence_degrades_then_telemetry_recovers() {
        let t0 = Instant::now();
        let mut machine = ready(t0);

        assert_eq!(machine.check_health(t0 + HEARTBEAT, HEARTBEAT, DEGRADED), Health::Steady);

        let t1 = t0 + HEARTBEAT + Duration::from_millis(1);
        assert!(matches!(
            machine.check_health(t1, HEARTBEAT, DEGRADED),
            Health::Degraded(Transition {
                from: SessionState::Ready,
                to: SessionState::Degraded
            })
        ));

        let t2 = t1 + Duration::from_millis(50);
        assert_eq!(machine.on_telemetry(t2).map(|t| t.to), Some(SessionState::Ready));
        assert_eq!(machine.silence(t2), Some(Duration::ZERO));
    }

    #[test]
    fn degraded_too_long_is_link_dead() {
        let t0 = Instant::now();
        let mut machine = ready(t0);
        let t1 = t0 + HEARTBEAT * 2;
        machine.check_health(t1, HEARTBEAT, DEGRADED);
        assert_eq!(machine.state(), SessionState::Degraded);

        assert_eq!(machine.check_health(t1 + DEGRADED, HEARTBEAT, DEGRADED), Health::Steady);
        assert_eq!(
            machine.check_health(t1 + DEGRADED + Duration::from_millis(1), HEARTBEAT, DEGRADED),
            Health::LinkDead
        );

        assert_eq!(
            machine.link_lost(t1 + DEGRADED * 2).map(|t| t.to),
            Some(SessionState::Disconnected)
        );
        assert_eq!(machine.silence(t1), None);
    }

    #[test]
    fn telemetry_keeps_ready_session_ready() {
        let t0 = Instant::now();
        let mut machine = ready(t0);
        for step in 1..10u32 {
            let now = t0 + HEARTBEAT / 2 * step;
            assert_eq!(machine.on_telemetry(now), None);
            assert_eq!(machine.check_health(now, HEARTBEAT, DEGRADED), Health::Steady);
        }
        assert_eq!(machine.state(), SessionState::Ready);
    }

    #[test]
    fn closed_is_terminal() {
        let t0 = Instant::now();
        let mut machine = ready(t0);
        assert_eq!(machine.close(t0).map(|t| t.to), Some(SessionState::Closed));
        assert_eq!(machine.close(t0), None);
        assert_eq!(machine.begin_connect(t0), None);
        assert_eq!(machine.link_lost(t0), None);
        assert_eq!(machine.on_telemetry(t0), None);
        assert_eq!(machine.state(), SessionState::Closed);
    }

    #[test]
    fn command_gate_per_state() {
        let fire = Intent::fire(1);
        let aim = Intent::aim(1.0, 1.0).expect("aim target should be finite");
        let hold = Intent::HoldPosition;

        assert!(SessionState::Ready.permits(&fire));
        assert!(SessionState::Ready.permits(&aim));
        assert!(!SessionState::Degraded.permits(&fire));
        assert!(!SessionState::Degraded.permits(&aim));
        assert!(SessionState::Degraded.permits(&hold));
        assert!(SessionState::Degraded.permits(&Intent::QueryStatus));
        assert!(SessionState::Degraded.permits(&Intent::Reset));
        for state in [
            SessionState::Disconnected,
            SessionState::Connecting,
            SessionState::Closed,
        ] {
            assert!(!state.permits(&hold));
        }
    }
}
