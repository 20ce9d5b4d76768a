//! Decoding of raw trackpad packets into [TouchReport]s.
//!
//! Parsing is pure: the same bytes and [ParseContext] always produce the same
//! report. Everything that depends on device state (calibration, time since
//! the previous report) is passed in by the caller.
use std::time::Duration;

use packed_struct::prelude::*;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{
    hid_report::{
        Mt2Finger, Mt2ReportHeader, SpiFinger, SpiPacketHeader, MAX_CONTACTS, MOUSE_REPORT_SIZE,
        MT2_FINGER_SIZE, MT2_HEADER_SIZE, REPORT_KIND_BATTERY, REPORT_KIND_DUAL_PACKET,
        REPORT_KIND_MOUSE, REPORT_KIND_MT2, REPORT_KIND_SPLIT_PART_ONE,
        REPORT_KIND_SPLIT_PART_TWO, SPI_FINGER_SIZE, SPI_HEADER_SIZE,
    },
    report::{Calibration, Contact, TouchReport},
};

/// Maximum number of mouse report prefixes stripped from a single packet
pub const MAX_NESTED_REPORTS: usize = 4;
/// Scan time ceiling for SPI packets, in 100us units
pub const SPI_SCAN_TIME_MAX: u16 = 0xff;
/// Magic Trackpad 2 timestamps are scaled by this factor to get the scan time
const MT2_SCAN_TIME_SCALE: u32 = 10;

/// Packet layout spoken by a transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PacketProtocol {
    /// Report-id framed packets from a Magic Trackpad 2 (USB or Bluetooth)
    MagicTrackpad2,
    /// Fixed layout packets from an SPI attached MacBook trackpad
    Spi,
}

/// Device state the parser needs to produce a report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseContext {
    pub calibration: Calibration,
    pub since_last_report: Duration,
}

/// Possible reasons a packet does not produce a report
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("received an empty packet")]
    Empty,
    #[error("packet too short: {length} < {minimum}")]
    TooShort { length: usize, minimum: usize },
    #[error("malformed input received. Length = {0}")]
    MalformedLength(usize),
    #[error("mouse packet of length {0} carries no multitouch report")]
    NoEmbeddedReport(usize),
    #[error("more than {0} nested mouse reports")]
    NestingTooDeep(usize),
    #[error("unhandled packet (report id: {0:#04x})")]
    UnsupportedKind(u8),
    #[error("failed to unpack packet: {0}")]
    Unpack(#[from] PackingError),
}

/// Decode the given packet using the layout of the given protocol
pub fn parse(
    protocol: PacketProtocol,
    buf: &[u8],
    context: &ParseContext,
) -> Result<TouchReport, ParseError> {
    match protocol {
        PacketProtocol::MagicTrackpad2 => parse_framed(buf, context),
        PacketProtocol::Spi => parse_spi(buf, context),
    }
}

/// Dispatch on the report kind in the first byte. USB devices prepend a mouse
/// report, which is skipped to get to the next input report.
fn parse_framed(buf: &[u8], context: &ParseContext) -> Result<TouchReport, ParseError> {
    let mut buf = buf;
    let mut depth = 0;
    loop {
        let Some(&kind) = buf.first() else {
            return Err(ParseError::Empty);
        };

        match kind {
            REPORT_KIND_MOUSE => {
                if buf.len() <= MOUSE_REPORT_SIZE {
                    return Err(ParseError::NoEmbeddedReport(buf.len()));
                }
                if depth == MAX_NESTED_REPORTS {
                    return Err(ParseError::NestingTooDeep(MAX_NESTED_REPORTS));
                }
                depth += 1;
                buf = &buf[MOUSE_REPORT_SIZE..];
            }
            REPORT_KIND_MT2 => return parse_mt2(buf, context),
            // Dual, split and battery packets carry no decodable touch data
            REPORT_KIND_DUAL_PACKET
            | REPORT_KIND_SPLIT_PART_ONE
            | REPORT_KIND_SPLIT_PART_TWO
            | REPORT_KIND_BATTERY => return Err(ParseError::UnsupportedKind(kind)),
            _ => return Err(ParseError::UnsupportedKind(kind)),
        }
    }
}

/// Decode a Magic Trackpad 2 multitouch report
fn parse_mt2(buf: &[u8], context: &ParseContext) -> Result<TouchReport, ParseError> {
    // The response size should be a header followed by whole finger records
    let length = buf.len();
    if length < MT2_HEADER_SIZE || (length - MT2_HEADER_SIZE) % MT2_FINGER_SIZE != 0 {
        return Err(ParseError::MalformedLength(length));
    }

    let header = Mt2ReportHeader::unpack_from_slice(&buf[..MT2_HEADER_SIZE])?;
    let scan_time = header
        .timestamp()
        .saturating_mul(MT2_SCAN_TIME_SCALE)
        .min(u16::MAX as u32) as u16;
    let mut report = TouchReport::new(header.button, scan_time);

    let calibration = &context.calibration;
    let fingers = buf[MT2_HEADER_SIZE..]
        .chunks_exact(MT2_FINGER_SIZE)
        .take(MAX_CONTACTS);
    for chunk in fingers {
        let finger = Mt2Finger::unpack_from_slice(chunk)?;
        let contact = Contact {
            contact_id: finger.id.to_primitive(),
            x: clamp_axis(finger.x().saturating_sub(calibration.x_min)),
            y: clamp_axis(finger.y().saturating_sub(calibration.y_min)),
            tip_switch: finger.is_touching(),
            confidence: finger.is_confident(),
        };
        log::trace!(
            "MT2 contact {}: raw ({}, {}) state {:#x} type {} -> ({}, {})",
            contact.contact_id,
            finger.x(),
            finger.y(),
            finger.state(),
            finger.finger_type(),
            contact.x,
            contact.y
        );
        report.push_contact(contact);
    }

    Ok(report)
}

/// Decode an SPI trackpad packet
fn parse_spi(buf: &[u8], context: &ParseContext) -> Result<TouchReport, ParseError> {
    let length = buf.len();
    if length < SPI_HEADER_SIZE {
        return Err(ParseError::TooShort {
            length,
            minimum: SPI_HEADER_SIZE,
        });
    }

    let header = SpiPacketHeader::unpack_from_slice(&buf[..SPI_HEADER_SIZE])?;
    let available = (length - SPI_HEADER_SIZE) / SPI_FINGER_SIZE;
    let count = (header.finger_count as usize).min(MAX_CONTACTS);
    if count > available {
        log::warn!(
            "SPI packet claims {} fingers but only carries {available}",
            header.finger_count
        );
    }

    let mut report = TouchReport::new(
        header.click_occurred != 0,
        spi_scan_time(context.since_last_report),
    );

    let calibration = &context.calibration;
    let fingers = buf[SPI_HEADER_SIZE..]
        .chunks_exact(SPI_FINGER_SIZE)
        .take(count);
    for (index, chunk) in fingers.enumerate() {
        let finger = SpiFinger::unpack_from_slice(chunk)?;
        let x = finger.x.to_primitive() as i32;
        let y = finger.y.to_primitive() as i32;
        let contact = Contact {
            contact_id: index as u8,
            x: clamp_axis(x.saturating_sub(calibration.x_min)),
            y: clamp_axis(calibration.y_max.saturating_sub(y)),
            tip_switch: finger.is_touching(),
            confidence: finger.is_confident(),
        };
        log::trace!(
            "SPI contact {index}: OX {}, OY {}, X {x}, Y {y}",
            finger.original_x.to_primitive(),
            finger.original_y.to_primitive()
        );
        report.push_contact(contact);
    }

    Ok(report)
}

/// Convert an elapsed duration into 100us scan time units
fn spi_scan_time(elapsed: Duration) -> u16 {
    let ticks = elapsed.as_micros() / 100;
    ticks.min(SPI_SCAN_TIME_MAX as u128) as u16
}

/// Clamp a calibrated position into the unsigned output range
fn clamp_axis(value: i32) -> u16 {
    value.clamp(0, u16::MAX as i32) as u16
}
