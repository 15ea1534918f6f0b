use std::io::IsTerminal;
use std::net::SocketAddr;
use std::time::Instant;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use turretctl_proto::TargetSighting;
use turretctl_session::{CommandHandle, Outcome, TelemetrySnapshot};

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TelemetryOutput {
    pub session_id: u64,
    pub sequence_ack: Option<u32>,
    pub azimuth_deg: f64,
    pub elevation_deg: f64,
    pub ammo_remaining: u16,
    pub target: Option<TargetSighting>,
    pub interlock_fault: Option<u16>,
    pub age_ms: u64,
}

impl TelemetryOutput {
    pub fn from_snapshot(snapshot: &TelemetrySnapshot) -> Self {
        let telemetry = &snapshot.telemetry;
        Self {
            session_id: snapshot.session_id,
            sequence_ack: telemetry.sequence_ack.map(|seq| seq.get()),
            azimuth_deg: telemetry.orientation.azimuth.degrees(),
            elevation_deg: telemetry.orientation.elevation.degrees(),
            ammo_remaining: telemetry.ammo_remaining,
            target: telemetry.target,
            interlock_fault: telemetry.interlock_fault,
            age_ms: u64::try_from(snapshot.age(Instant::now()).as_millis()).unwrap_or(u64::MAX),
        }
    }

    fn target_text(&self) -> String {
        match &self.target {
            Some(target) => format!("{} ({}%)", target.position, target.confidence),
            None => "-".to_string(),
        }
    }

    fn fault_text(&self) -> String {
        match self.interlock_fault {
            Some(code) => format!("{code:#06x}"),
            None => "clear".to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CommandOutput {
    pub command: String,
    pub seq: u32,
    pub outcome: &'static str,
    pub telemetry: Option<TelemetryOutput>,
}

impl CommandOutput {
    pub fn new(handle: &CommandHandle, outcome: &Outcome) -> Self {
        let telemetry = match outcome {
            Outcome::Acknowledged(snapshot) => Some(TelemetryOutput::from_snapshot(snapshot)),
            _ => None,
        };
        Self {
            command: handle.intent().to_string(),
            seq: handle.seq().get(),
            outcome: outcome.name(),
            telemetry,
        }
    }
}

#[derive(Debug, Serialize)]
struct DiscoveryOutput {
    endpoint: String,
    host: String,
    port: u16,
}

pub fn print_telemetry(out: &TelemetryOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec![
                    "SESSION",
                    "AZIMUTH",
                    "ELEVATION",
                    "AMMO",
                    "TARGET",
                    "INTERLOCK",
                    "AGE",
                ])
                .add_row(vec![
                    out.session_id.to_string(),
                    format!("{:.3}°", out.azimuth_deg),
                    format!("{:.3}°", out.elevation_deg),
                    out.ammo_remaining.to_string(),
                    out.target_text(),
                    out.fault_text(),
                    format!("{}ms", out.age_ms),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "az={:.3}° el={:.3}° ammo={} target={} interlock={} age={}ms",
                out.azimuth_deg,
                out.elevation_deg,
                out.ammo_remaining,
                out.target_text(),
                out.fault_text(),
                out.age_ms
            );
        }
    }
}

pub fn print_command(out: &CommandOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["SEQ", "COMMAND", "OUTCOME", "AMMO"])
                .add_row(vec![
                    out.seq.to_string(),
                    out.command.clone(),
                    out.outcome.to_string(),
                    out.telemetry
                        .as_ref()
                        .map(|t| t.ammo_remaining.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("#{} {}: {}", out.seq, out.command, out.outcome);
            if let Some(telemetry) = &out.telemetry {
                print_telemetry(telemetry, OutputFormat::Pretty);
            }
        }
    }
}

pub fn print_discovery(endpoint: SocketAddr, format: OutputFormat) {
    let out = DiscoveryOutput {
        endpoint: endpoint.to_string(),
        host: endpoint.ip().to_string(),
        port: endpoint.port(),
    };
    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("Turret controller: {}", out.endpoint);
        }
    }
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}
