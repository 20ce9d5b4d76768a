use std::{error::Error, time::Duration};

use crate::{
    config::{load_device_configs, DeviceConfig},
    drivers::apple_trackpad::{
        parser::{parse, PacketProtocol, ParseContext},
        report::Calibration,
    },
};

use super::print_report;

/// Decode a single packet without a device and print the resulting report
pub fn handle_decode(
    packet: String,
    protocol: PacketProtocol,
    config: Option<String>,
    elapsed_us: u64,
    json: bool,
) -> Result<(), Box<dyn Error>> {
    let bytes = parse_hex(packet.as_str())?;
    let calibration = match config {
        Some(path) => DeviceConfig::from_yaml_file(path)?.calibration,
        None => default_calibration(protocol),
    };
    let context = ParseContext {
        calibration,
        since_last_report: Duration::from_micros(elapsed_us),
    };

    let report = parse(protocol, bytes.as_slice(), &context)?;
    print_report(&report, json)?;
    if !json {
        let packed = report.pack()?;
        println!("Packed: {}", to_hex(&packed));
    }

    Ok(())
}

/// Calibration of the first known device speaking the given protocol
fn default_calibration(protocol: PacketProtocol) -> Calibration {
    let found = load_device_configs()
        .into_iter()
        .find(|(_, config)| config.protocol == protocol);
    let Some((path, config)) = found else {
        log::warn!("No device config found for {protocol:?}. Positions are not calibrated.");
        return Calibration::default();
    };
    log::debug!("Using calibration from {path:?}");
    config.calibration
}

/// Parse a hex string into bytes. Whitespace, ':' separators and "0x"
/// prefixes are ignored.
pub fn parse_hex(value: &str) -> Result<Vec<u8>, Box<dyn Error>> {
    let digits: String = value
        .split(|c: char| c.is_whitespace() || c == ':' || c == ',')
        .map(|part| part.trim_start_matches("0x").trim_start_matches("0X"))
        .collect();
    if digits.len() % 2 != 0 {
        return Err(format!("Odd number of hex digits in '{value}'").into());
    }

    let mut bytes = Vec::with_capacity(digits.len() / 2);
    for i in (0..digits.len()).step_by(2) {
        let pair = digits.get(i..i + 2).ok_or("Invalid hex string")?;
        bytes.push(u8::from_str_radix(pair, 16)?);
    }

    Ok(bytes)
}

fn to_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<String>>()
        .join(" ")
}
