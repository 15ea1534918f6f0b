use std::net::{SocketAddr, ToSocketAddrs};

use turretctl_session::{discover, DiscoveryConfig};
use turretctl_transport::broadcast_target;

use crate::cmd::{parse_duration, DiscoverArgs};
use crate::exit::{session_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_discovery, OutputFormat};

pub fn run(args: DiscoverArgs, format: OutputFormat) -> CliResult<i32> {
    let config = DiscoveryConfig {
        target: discovery_target(&args)?,
        timeout: parse_duration(&args.timeout)?,
    };

    let endpoint = discover(&config).map_err(|err| session_error("discovery failed", err))?;
    print_discovery(endpoint, format);
    Ok(SUCCESS)
}

fn discovery_target(args: &DiscoverArgs) -> CliResult<SocketAddr> {
    let Some(target) = &args.target else {
        return Ok(broadcast_target(args.port));
    };
    target
        .to_socket_addrs()
        .ok()
        .and_then(|mut addrs| addrs.next())
        .ok_or_else(|| CliError::new(USAGE, format!("invalid discovery target: {target}")))
}
