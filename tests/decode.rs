use std::error::Error;
use std::time::Duration;

use ptpbridge::config::find_device_config;
use ptpbridge::drivers::apple_trackpad::parser::{parse, PacketProtocol, ParseContext, ParseError};
use ptpbridge::drivers::apple_trackpad::report::TouchReport;

// Bluetooth Magic Trackpad 2 report with one finger resting near the center
const MT2_ONE_FINGER: [u8; 13] = [
    0x31, 0x29, 0x12, 0x00, 0x64, 0x80, 0x7f, 0x88, 0x20, 0x19, 0x10, 0x30, 0x07,
];

#[tokio::test]
async fn test_decode_packaged_profile() -> Result<(), Box<dyn Error>> {
    let config = find_device_config(0x004c, 0x0265).ok_or("missing Bluetooth profile")?;
    assert_eq!(config.protocol, PacketProtocol::MagicTrackpad2);

    let context = ParseContext {
        calibration: config.calibration,
        since_last_report: Duration::from_millis(8),
    };
    let report = parse(config.protocol, &MT2_ONE_FINGER, &context)?;
    assert_eq!(report.contact_count(), 1);
    assert!(report.button_clicked);
    assert_eq!(report.scan_time, ((0x12 << 5) | 5) * 10);

    let contact = report.contacts()[0];
    assert_eq!(contact.contact_id, 7);
    assert_eq!(contact.x, (100 + 3678) as u16);
    assert_eq!(contact.y, (-1020 + 2478) as u16);
    assert!(contact.tip_switch);
    assert!(contact.confidence);

    // The packed report reads back to the same contacts
    let packed = report.pack()?;
    assert_eq!(packed.len(), 35);
    assert_eq!(TouchReport::unpack(&packed)?, report);

    Ok(())
}

#[tokio::test]
async fn test_decode_rejects_truncated_report() -> Result<(), Box<dyn Error>> {
    let context = ParseContext {
        calibration: Default::default(),
        since_last_report: Duration::ZERO,
    };
    let result = parse(
        PacketProtocol::MagicTrackpad2,
        &MT2_ONE_FINGER[..12],
        &context,
    );
    assert_eq!(result, Err(ParseError::MalformedLength(12)));

    Ok(())
}
