//! Sweep the turret between the corners of its safe envelope, firing one
//! round wherever a confident target is reported.
//!
//! Run with (against `sim-turret` or real hardware):
//!   cargo run --example patrol -- 127.0.0.1:12345

use std::time::Duration;

use turretctl::session::{Intent, Outcome, SessionConfig, SessionError, TurretClient};

const CONFIDENCE_TO_FIRE: u8 = 60;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:12345".to_string());
    let config = SessionConfig::default();
    let envelope = config.safe_envelope;
    let client = TurretClient::connect(addr, config)?;

    let corners = [
        (envelope.azimuth_min, envelope.elevation_min),
        (envelope.azimuth_max, envelope.elevation_min),
        (envelope.azimuth_max, envelope.elevation_max),
        (envelope.azimuth_min, envelope.elevation_max),
    ];

    for (azimuth, elevation) in corners.into_iter().cycle().take(8) {
        let intent = Intent::aim(azimuth.degrees() * 0.5, elevation.degrees() * 0.5)?;
        let mut aim = client.submit(intent)?;
        let snapshot = match client.await_result(&mut aim)? {
            Outcome::Acknowledged(snapshot) => snapshot,
            other => {
                eprintln!("{intent}: {}", other.name());
                continue;
            }
        };
        println!("{intent}: ammo {}", snapshot.telemetry.ammo_remaining);

        let Some(target) = snapshot.telemetry.target else {
            continue;
        };
        if target.confidence < CONFIDENCE_TO_FIRE {
            continue;
        }
        match client.submit(Intent::fire(1)) {
            Ok(mut fire) => println!("  fire: {}", client.await_result(&mut fire)?.name()),
            Err(SessionError::Rejected(reason)) => println!("  fire refused: {reason}"),
            Err(err) => return Err(err.into()),
        }
        std::thread::sleep(Duration::from_millis(200));
    }

    let mut hold = client.submit(Intent::HoldPosition)?;
    println!("hold: {}", client.await_result(&mut hold)?.name());
    client.close();
    Ok(())
}
