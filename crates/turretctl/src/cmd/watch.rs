use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use turretctl_session::{Intent, Outcome, SessionConfig, SessionError, SessionState};

use crate::cmd::{connect_settled, parse_duration, WatchArgs};
use crate::exit::{session_error, CliError, CliResult, FAILURE, INTERNAL, SUCCESS};
use crate::output::{print_telemetry, OutputFormat, TelemetryOutput};

pub fn run(args: WatchArgs, format: OutputFormat, config: SessionConfig) -> CliResult<i32> {
    let interval = parse_duration(&args.interval)?;
    let client = connect_settled(&args.address, config)?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut printed = 0usize;
    while running.load(Ordering::SeqCst) {
        let started = Instant::now();

        match client.submit(Intent::QueryStatus) {
            Ok(mut query) => {
                if let Ok(Outcome::Acknowledged(snapshot)) = client.await_result(&mut query) {
                    print_telemetry(&TelemetryOutput::from_snapshot(&snapshot), format);
                    printed = printed.saturating_add(1);
                }
            }
            // Reconnecting or degraded; keep polling until it settles.
            Err(SessionError::Rejected(_)) => {}
            Err(err) => return Err(session_error("watch failed", err)),
        }

        if client.state() == SessionState::Closed {
            return Err(CliError::new(FAILURE, "session closed: turret unreachable"));
        }
        if args.count.is_some_and(|count| printed >= count) {
            break;
        }
        if let Some(rest) = interval.checked_sub(started.elapsed()) {
            std::thread::sleep(rest);
        }
    }

    client.close();
    Ok(SUCCESS)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
