use turretctl_session::{Intent, Outcome, SessionConfig};

use crate::cmd::{connect_settled, TargetArgs};
use crate::exit::{outcome_code, session_error, CliError, CliResult, SUCCESS};
use crate::output::{print_telemetry, OutputFormat, TelemetryOutput};

pub fn run(args: TargetArgs, format: OutputFormat, config: SessionConfig) -> CliResult<i32> {
    let client = connect_settled(&args.address, config)?;

    let mut query = client
        .submit(Intent::QueryStatus)
        .map_err(|err| session_error("status query failed", err))?;
    let outcome = client
        .await_result(&mut query)
        .map_err(|err| session_error("status query failed", err))?;
    client.close();

    match outcome {
        Outcome::Acknowledged(snapshot) => {
            print_telemetry(&TelemetryOutput::from_snapshot(&snapshot), format);
            Ok(SUCCESS)
        }
        other => Err(CliError::new(
            outcome_code(&other),
            format!("status query ended: {}", other.name()),
        )),
    }
}
