use turretctl_session::{Intent, SessionConfig};

use crate::cmd::{connect_settled, AimArgs, FireArgs, TargetArgs};
use crate::exit::{outcome_code, session_error, CliResult};
use crate::output::{print_command, CommandOutput, OutputFormat};

pub fn aim(args: AimArgs, format: OutputFormat, config: SessionConfig) -> CliResult<i32> {
    let intent = Intent::aim(args.azimuth, args.elevation)
        .map_err(|denial| session_error("aim refused", denial.into()))?;
    execute(&args.address, intent, format, config)
}

pub fn fire(args: FireArgs, format: OutputFormat, config: SessionConfig) -> CliResult<i32> {
    execute(&args.address, Intent::fire(args.rounds), format, config)
}

pub fn hold(args: TargetArgs, format: OutputFormat, config: SessionConfig) -> CliResult<i32> {
    execute(&args.address, Intent::HoldPosition, format, config)
}

pub fn reset(args: TargetArgs, format: OutputFormat, config: SessionConfig) -> CliResult<i32> {
    execute(&args.address, Intent::Reset, format, config)
}

/// Submit one intent, wait for its outcome and report it.
fn execute(
    address: &str,
    intent: Intent,
    format: OutputFormat,
    config: SessionConfig,
) -> CliResult<i32> {
    let client = connect_settled(address, config)?;

    let context = format!("{intent} failed");
    let mut handle = client
        .submit(intent)
        .map_err(|err| session_error(&context, err))?;
    let outcome = client
        .await_result(&mut handle)
        .map_err(|err| session_error(&context, err))?;
    client.close();

    print_command(&CommandOutput::new(&handle, &outcome), format);
    Ok(outcome_code(&outcome))
}
