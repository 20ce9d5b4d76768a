pub mod decode;
pub mod devices;
pub mod run;

use std::error::Error;

use clap::{Parser, Subcommand, ValueEnum};
use decode::handle_decode;
use devices::handle_devices;
use run::handle_run;

use crate::drivers::apple_trackpad::{parser::PacketProtocol, report::TouchReport};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Read multitouch reports from a hidraw device
    Run {
        /// Path to the hidraw device (e.g. "/dev/hidraw3")
        path: String,
        /// Device config to use instead of looking one up by device id
        #[arg(long)]
        config: Option<String>,
        /// Stop after this many reports
        #[arg(long)]
        count: Option<usize>,
        /// Print reports as JSON
        #[arg(long)]
        json: bool,
    },
    /// Decode a raw packet given as hex
    Decode {
        /// Packet bytes (e.g. "31 01 04 00 ...")
        packet: String,
        #[arg(long, value_enum, default_value_t = ProtocolArg::MagicTrackpad2)]
        protocol: ProtocolArg,
        /// Device config providing the calibration
        #[arg(long)]
        config: Option<String>,
        /// Time since the previous report, in microseconds
        #[arg(long, default_value_t = 0)]
        elapsed_us: u64,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// List known device configs
    Devices {
        /// Print the configs as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolArg {
    MagicTrackpad2,
    Spi,
}

impl From<ProtocolArg> for PacketProtocol {
    fn from(value: ProtocolArg) -> Self {
        match value {
            ProtocolArg::MagicTrackpad2 => PacketProtocol::MagicTrackpad2,
            ProtocolArg::Spi => PacketProtocol::Spi,
        }
    }
}

pub async fn main_cli(args: Args) -> Result<(), Box<dyn Error>> {
    match args.cmd {
        Commands::Run {
            path,
            config,
            count,
            json,
        } => handle_run(path, config, count, json).await?,
        Commands::Decode {
            packet,
            protocol,
            config,
            elapsed_us,
            json,
        } => handle_decode(packet, protocol.into(), config, elapsed_us, json)?,
        Commands::Devices { json } => handle_devices(json)?,
    }

    Ok(())
}

/// Print the given report to stdout
pub fn print_report(report: &TouchReport, json: bool) -> Result<(), Box<dyn Error>> {
    if json {
        let value = serde_json::json!({
            "report_id": report.report_id,
            "button_clicked": report.button_clicked,
            "scan_time": report.scan_time,
            "contact_count": report.contact_count(),
            "contacts": report.contacts(),
        });
        println!("{}", serde_json::to_string(&value)?);
        return Ok(());
    }

    println!(
        "Report {:#04x}: {} contact(s), button: {}, scan time: {}",
        report.report_id,
        report.contact_count(),
        report.button_clicked,
        report.scan_time
    );
    for contact in report.contacts() {
        println!(
            "  Contact {}: ({}, {}) tip: {} confidence: {}",
            contact.contact_id, contact.x, contact.y, contact.tip_switch, contact.confidence
        );
    }

    Ok(())
}
