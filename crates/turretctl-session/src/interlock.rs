//! Safety interlock: a pure admission predicate for motion and fire.
//!
//! No I/O and no state. The reconciler calls [`allow`] on every submission
//! with the believed turret state at that instant.

use std::time::Duration;

use turretctl_proto::{Angle, Orientation, Telemetry};

use crate::config::SafetyLimits;
use crate::intent::Intent;

/// Why the interlock refused a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Denial {
    #[error("no telemetry received yet")]
    NoTelemetry,

    #[error("no ammunition remaining")]
    AmmoDepleted,

    #[error("turret reports interlock fault {0:#06x}")]
    InterlockFault(u16),

    #[error("telemetry is {age:?} old (max {max:?})")]
    StaleTelemetry { age: Duration, max: Duration },

    #[error("orientation {0} is outside the safe envelope")]
    OutsideSafeEnvelope(Orientation),

    #[error("pending aim at {0} leaves the safe envelope")]
    PendingAimOutsideEnvelope(Orientation),

    #[error("fire requires at least one round")]
    ZeroRounds,

    #[error("aim target {0} exceeds the axis limits")]
    BeyondAxisLimits(Orientation),

    #[error("aim target must be a finite angle")]
    NonFiniteAngle,
}

/// Convert an aim target given in degrees. NaN and infinities never
/// become a slew command.
pub fn aim_target(azimuth: f64, elevation: f64) -> Result<Orientation, Denial> {
    match (Angle::try_from_degrees(azimuth), Angle::try_from_degrees(elevation)) {
        (Some(azimuth), Some(elevation)) => Ok(Orientation::new(azimuth, elevation)),
        _ => Err(Denial::NonFiniteAngle),
    }
}

/// Decide whether `intent` may be sent.
///
/// `last_known` is the most recent telemetry and `staleness` its age.
/// `pending_aims` are the targets of Aim commands not yet acknowledged;
/// the head may still be travelling towards any of them.
pub fn allow(
    intent: &Intent,
    last_known: Option<&Telemetry>,
    staleness: Duration,
    pending_aims: &[Orientation],
    limits: &SafetyLimits,
) -> Result<(), Denial> {
    match *intent {
        Intent::Fire { rounds } => {
            let telemetry = last_known.ok_or(Denial::NoTelemetry)?;
            if telemetry.ammo_remaining == 0 {
                return Err(Denial::AmmoDepleted);
            }
            if let Some(code) = telemetry.interlock_fault {
                return Err(Denial::InterlockFault(code));
            }
            if staleness > limits.max_fresh_age {
                return Err(Denial::StaleTelemetry {
                    age: staleness,
                    max: limits.max_fresh_age,
                });
            }
            if !limits.safe_envelope.contains(telemetry.orientation) {
                return Err(Denial::OutsideSafeEnvelope(telemetry.orientation));
            }
            if let Some(target) = pending_aims
                .iter()
                .find(|target| !limits.safe_envelope.contains(**target))
            {
                return Err(Denial::PendingAimOutsideEnvelope(*target));
            }
            if rounds == 0 {
                return Err(Denial::ZeroRounds);
            }
            Ok(())
        }
        Intent::Aim(target) if !limits.axis_limits.contains(target) => {
            Err(Denial::BeyondAxisLimits(target))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;

    fn limits() -> SafetyLimits {
        SessionConfig::default().safety_limits()
    }

    fn telemetry(ammo: u16) -> Telemetry {
        Telemetry {
            sequence_ack: None,
            orientation: Orientation::degrees(0.0, 5.0),
            ammo_remaining: ammo,
            target: None,
            interlock_fault: None,
        }
    }

    const FRESH: Duration = Duration::from_millis(20);

    fn aim(azimuth: f64, elevation: f64) -> Intent {
        Intent::aim(azimuth, elevation).expect("aim target should be finite")
    }

    #[test]
    fn fire_allowed_when_everything_checks_out() {
        assert_eq!(
            allow(&Intent::fire(2), Some(&telemetry(10)), FRESH, &[], &limits()),
            Ok(())
        );
    }

    #[test]
    fn fire_without_telemetry_denied() {
        assert_eq!(
            allow(&Intent::fire(1), None, Duration::ZERO, &[], &limits()),
            Err(Denial::NoTelemetry)
        );
    }

    #[test]
    fn empty_magazine_denies_regardless_of_other_conditions() {
        let mut report = telemetry(0);
        report.interlock_fault = Some(7);
        report.orientation = Orientation::degrees(120.0, 50.0);
        let stale = Duration::from_secs(60);
        let far = [Orientation::degrees(150.0, 0.0)];

        for rounds in [0, 1, 5] {
            assert_eq!(
                allow(&Intent::fire(rounds), Some(&report), stale, &far, &limits()),
                Err(Denial::AmmoDepleted)
            );
        }
    }

    #[test]
    fn fault_denies_fire() {
        let mut report = telemetry(4);
        report.interlock_fault = Some(0x0102);
        assert_eq!(
            allow(&Intent::fire(1), Some(&report), FRESH, &[], &limits()),
            Err(Denial::InterlockFault(0x0102))
        );
    }

    #[test]
    fn stale_telemetry_denies_fire() {
        let age = Duration::from_millis(501);
        assert_eq!(
            allow(&Intent::fire(1), Some(&telemetry(4)), age, &[], &limits()),
            Err(Denial::StaleTelemetry {
                age,
                max: Duration::from_millis(500)
            })
        );
        assert!(allow(
            &Intent::fire(1),
            Some(&telemetry(4)),
            Duration::from_millis(500),
            &[],
            &limits()
        )
        .is_ok());
    }

    #[test]
    fn orientation_outside_envelope_denies_fire() {
        let mut report = telemetry(4);
        report.orientation = Orientation::degrees(60.0, 0.0);
        assert_eq!(
            allow(&Intent::fire(1), Some(&report), FRESH, &[], &limits()),
            Err(Denial::OutsideSafeEnvelope(report.orientation))
        );
    }

    #[test]
    fn pending_aim_outside_envelope_denies_fire() {
        let inside = Orientation::degrees(10.0, 10.0);
        let outside = Orientation::degrees(-90.0, 10.0);
        assert_eq!(
            allow(
                &Intent::fire(1),
                Some(&telemetry(4)),
                FRESH,
                &[inside, outside],
                &limits()
            ),
            Err(Denial::PendingAimOutsideEnvelope(outside))
        );
        assert!(allow(&Intent::fire(1), Some(&telemetry(4)), FRESH, &[inside], &limits()).is_ok());
    }

    #[test]
    fn zero_rounds_denied() {
        assert_eq!(
            allow(&Intent::fire(0), Some(&telemetry(4)), FRESH, &[], &limits()),
            Err(Denial::ZeroRounds)
        );
    }

    #[test]
    fn aim_checked_against_axis_limits_only() {
        let limits = limits();
        // Outside the safe envelope but within the axis limits.
        assert!(allow(&aim(120.0, 50.0), None, Duration::ZERO, &[], &limits).is_ok());
        assert_eq!(
            allow(&aim(171.0, 0.0), None, Duration::ZERO, &[], &limits),
            Err(Denial::BeyondAxisLimits(Orientation::degrees(171.0, 0.0)))
        );
        assert_eq!(
            allow(&aim(0.0, -20.5), None, Duration::ZERO, &[], &limits),
            Err(Denial::BeyondAxisLimits(Orientation::degrees(0.0, -20.5)))
        );
    }

    #[test]
    fn non_finite_aim_targets_are_refused() {
        for (azimuth, elevation) in [
            (f64::NAN, f64::NAN),
            (f64::NAN, 0.0),
            (0.0, f64::INFINITY),
            (f64::NEG_INFINITY, 5.0),
        ] {
            assert_eq!(aim_target(azimuth, elevation), Err(Denial::NonFiniteAngle));
            assert_eq!(Intent::aim(azimuth, elevation), Err(Denial::NonFiniteAngle));
        }
        assert_eq!(aim_target(-30.5, 12.0), Ok(Orientation::degrees(-30.5, 12.0)));
    }

    #[test]
    fn other_intents_always_allowed() {
        for intent in [Intent::HoldPosition, Intent::QueryStatus, Intent::Reset] {
            assert!(allow(&intent, None, Duration::MAX, &[], &limits()).is_ok());
        }
    }
}
