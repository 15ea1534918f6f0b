use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use clap::{Args, Subcommand};
use turretctl_session::{SessionConfig, TurretClient};

use crate::exit::{io_error, session_error, CliError, CliResult, DATA_INVALID, TIMEOUT, USAGE};
use crate::output::OutputFormat;

pub mod command;
pub mod discover;
pub mod status;
pub mod version;
pub mod watch;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Find a turret controller on the local network.
    Discover(DiscoverArgs),
    /// Print the turret's current telemetry.
    Status(TargetArgs),
    /// Slew the turret head to an absolute orientation.
    Aim(AimArgs),
    /// Fire rounds from the current orientation.
    Fire(FireArgs),
    /// Stop all motion.
    Hold(TargetArgs),
    /// Clear a latched controller fault.
    Reset(TargetArgs),
    /// Poll telemetry until interrupted.
    Watch(WatchArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat, config: Option<&Path>) -> CliResult<i32> {
    match command {
        Command::Discover(args) => discover::run(args, format),
        Command::Status(args) => status::run(args, format, load_config(config)?),
        Command::Aim(args) => command::aim(args, format, load_config(config)?),
        Command::Fire(args) => command::fire(args, format, load_config(config)?),
        Command::Hold(args) => command::hold(args, format, load_config(config)?),
        Command::Reset(args) => command::reset(args, format, load_config(config)?),
        Command::Watch(args) => watch::run(args, format, load_config(config)?),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct TargetArgs {
    /// Turret controller address (host:port).
    pub address: String,
}

#[derive(Args, Debug)]
pub struct AimArgs {
    /// Turret controller address (host:port).
    pub address: String,
    /// Target azimuth in degrees.
    #[arg(long, allow_negative_numbers = true)]
    pub azimuth: f64,
    /// Target elevation in degrees.
    #[arg(long, allow_negative_numbers = true)]
    pub elevation: f64,
}

#[derive(Args, Debug)]
pub struct FireArgs {
    /// Turret controller address (host:port).
    pub address: String,
    /// Rounds to fire.
    #[arg(long, default_value = "1")]
    pub rounds: u16,
}

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Turret controller address (host:port).
    pub address: String,
    /// Status query interval (e.g. 500ms, 2s).
    #[arg(long, default_value = "500ms")]
    pub interval: String,
    /// Exit after printing N reports.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct DiscoverArgs {
    /// UDP port controllers listen on.
    #[arg(long, default_value_t = turretctl_session::DEFAULT_DISCOVERY_PORT)]
    pub port: u16,
    /// Send the request here instead of broadcasting (host:port).
    #[arg(long, value_name = "ADDR")]
    pub target: Option<String>,
    /// How long to wait for a reply (e.g. 2s, 500ms).
    #[arg(long, default_value = "2s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Session config from a JSON file, or defaults.
pub fn load_config(path: Option<&Path>) -> CliResult<SessionConfig> {
    let Some(path) = path else {
        return Ok(SessionConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .map_err(|err| io_error(&format!("failed reading {}", path.display()), err))?;
    let config: SessionConfig = serde_json::from_str(&text).map_err(|err| {
        CliError::new(
            DATA_INVALID,
            format!("invalid config {}: {err}", path.display()),
        )
    })?;
    config
        .validate()
        .map_err(|err| session_error(&format!("invalid config {}", path.display()), err))?;
    Ok(config)
}

pub fn config_path(path: Option<PathBuf>) -> Option<PathBuf> {
    path.or_else(|| std::env::var_os("TURRETCTL_CONFIG").map(PathBuf::from))
}

/// Connect and wait until the opening status query has been answered,
/// so the interlock has fresh telemetry to judge by.
pub fn connect_settled(address: &str, config: SessionConfig) -> CliResult<TurretClient> {
    let wait = config.await_result_timeout;
    let client =
        TurretClient::connect(address, config).map_err(|err| session_error("connect failed", err))?;

    let deadline = Instant::now() + wait;
    loop {
        if client.current_state().is_some() && client.pending_commands() == 0 {
            return Ok(client);
        }
        if Instant::now() >= deadline {
            client.close();
            return Err(CliError::new(
                TIMEOUT,
                format!("no telemetry from {address} within {wait:?}"),
            ));
        }
        std::thread::sleep(Duration::from_millis(10));
    }
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;
    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}
