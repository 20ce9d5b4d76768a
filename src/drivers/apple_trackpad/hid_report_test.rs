use std::error::Error;

use packed_struct::{
    types::{Integer, SizedInteger},
    PackedStruct, PackedStructSlice,
};

use crate::drivers::apple_trackpad::{
    hid_report::{
        Mt2Finger, Mt2ReportHeader, PackedPtpReport, SpiFinger, SpiPacketHeader, MAX_CONTACTS,
        MT2_STATE_CONTACT, MT2_STATE_FLOATING, MT2_STATE_TRANSITION, PTP_REPORT_SIZE,
    },
    report::{Contact, TouchReport},
};

// ReportID: 5 | Contact Count: 1 | Button: 0 | Scan Time: 120
//   Contact Id: 3 | X: 3678 | Y: 2479 | Tip Switch: 1 | Confidence: 1
#[tokio::test]
async fn test_pack_ptp_report() -> Result<(), Box<dyn Error>> {
    let mut report = TouchReport::new(false, 120);
    report.push_contact(Contact {
        contact_id: 3,
        x: 3678,
        y: 2479,
        tip_switch: true,
        confidence: true,
    });

    let expected: [u8; 35] = [
        0x05, 0x01, 0x00, 0x78, 0x00, 0x03, 0x5e, 0x0e, 0xaf, 0x09, 0x03, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00,
    ];
    let packed = report.pack()?;
    assert_eq!(expected, packed);

    let unpacked = TouchReport::unpack(&packed)?;
    assert_eq!(report, unpacked);

    Ok(())
}

#[tokio::test]
async fn test_pack_contact_flags() -> Result<(), Box<dyn Error>> {
    let mut report = PackedPtpReport::default();
    report.contact_count = 2;
    report.button_clicked = 1;
    report.contacts[0].tip_switch = true;
    report.contacts[1].confidence = true;
    report.contacts[1].contact_id = 7;
    report.contacts[1].x = Integer::from_primitive(0x1234);

    let packed = report.pack()?;
    assert_eq!(packed[2], 0x01, "button should be set");
    assert_eq!(packed[10], 0x01, "first contact should only have tip switch");
    assert_eq!(packed[11], 7);
    assert_eq!(&packed[12..=13], &[0x34, 0x12]);
    assert_eq!(packed[16], 0x02, "second contact should only have confidence");

    Ok(())
}

#[tokio::test]
async fn test_pack_every_contact_slot() -> Result<(), Box<dyn Error>> {
    let mut report = PackedPtpReport::default();
    assert_eq!(report.contacts.len(), MAX_CONTACTS);
    report.contact_count = MAX_CONTACTS as u8;
    for (i, contact) in report.contacts.iter_mut().enumerate() {
        contact.contact_id = i as u8 + 1;
        contact.tip_switch = true;
        contact.y = Integer::from_primitive(0x0100 * (i as u16 + 1));
    }

    let packed = report.pack()?;
    assert_eq!(packed.len(), PTP_REPORT_SIZE);
    // The last slot occupies the final six bytes
    assert_eq!(&packed[29..], &[0x05, 0x00, 0x00, 0x00, 0x05, 0x01]);

    let unpacked = PackedPtpReport::unpack_from_slice(&packed)?;
    assert_eq!(unpacked, report);

    Ok(())
}

// 31 29 12 00
#[tokio::test]
async fn test_unpack_mt2_header() -> Result<(), Box<dyn Error>> {
    let header = Mt2ReportHeader::unpack(&[0x31, 0x29, 0x12, 0x00])?;
    assert_eq!(header.report_id, 0x31);
    assert!(header.button);
    assert_eq!(header.timestamp_low.to_primitive(), 5);
    assert_eq!(header.timestamp(), (0x12 << 5) | 5);

    let mut rebuilt = Mt2ReportHeader {
        report_id: 0x31,
        button: true,
        ..Default::default()
    };
    rebuilt.set_timestamp(header.timestamp());
    assert_eq!(rebuilt.pack()?, [0x31, 0x29, 0x12, 0x00]);

    Ok(())
}

// X: 256 | Y: -256 (sensor) | Type: 2 | State: 0x4 | Major: 32 | Minor: 64
// Size: 16 | Pressure: 48 | Orientation: 4 | Id: 3
// 00 01 e0 8b 20 40 10 30 43
#[tokio::test]
async fn test_unpack_mt2_finger() -> Result<(), Box<dyn Error>> {
    let data = [0x00, 0x01, 0xe0, 0x8b, 0x20, 0x40, 0x10, 0x30, 0x43];
    let finger = Mt2Finger::unpack(&data)?;

    assert_eq!(finger.raw_x(), 0x100);
    assert_eq!(finger.raw_y(), 0x1f00);
    assert_eq!(finger.finger_type(), 2);
    assert_eq!(finger.state(), 4);
    assert_eq!(finger.touch_major, 0x20);
    assert_eq!(finger.touch_minor, 0x40);
    assert_eq!(finger.size, 0x10);
    assert_eq!(finger.pressure, 0x30);
    assert_eq!(finger.orientation.to_primitive(), 4);
    assert_eq!(finger.id.to_primitive(), 3);

    // 0x1f00 is -256 in 13-bit two's complement and the Y axis is flipped
    assert_eq!(finger.x(), 256);
    assert_eq!(finger.y(), 256);
    assert!(finger.is_touching());
    assert!(finger.is_confident());

    Ok(())
}

#[tokio::test]
async fn test_mt2_finger_setters() -> Result<(), Box<dyn Error>> {
    let mut finger = Mt2Finger::default();
    finger.set_raw_x(0x100);
    finger.set_raw_y(0x1f00);
    finger.set_finger_type(2);
    finger.set_state(4);
    finger.touch_major = 0x20;
    finger.touch_minor = 0x40;
    finger.size = 0x10;
    finger.pressure = 0x30;
    finger.orientation = Integer::from_primitive(4);
    finger.id = Integer::from_primitive(3);

    let expected = [0x00, 0x01, 0xe0, 0x8b, 0x20, 0x40, 0x10, 0x30, 0x43];
    assert_eq!(finger.pack()?, expected);

    // Setting a field must not disturb its neighbours
    finger.set_raw_y(0);
    assert_eq!(finger.raw_x(), 0x100);
    assert_eq!(finger.finger_type(), 2);
    assert_eq!(finger.state(), 4);

    Ok(())
}

#[tokio::test]
async fn test_mt2_finger_sign_extension() -> Result<(), Box<dyn Error>> {
    let mut finger = Mt2Finger::default();
    finger.set_raw_x(0x0fff);
    assert_eq!(finger.x(), 4095);
    finger.set_raw_x(0x1000);
    assert_eq!(finger.x(), -4096);
    finger.set_raw_x(0x1fff);
    assert_eq!(finger.x(), -1);

    finger.set_raw_y(0x0001);
    assert_eq!(finger.y(), -1);
    finger.set_raw_y(0x1000);
    assert_eq!(finger.y(), 4096);

    Ok(())
}

#[tokio::test]
async fn test_mt2_finger_touch_state() -> Result<(), Box<dyn Error>> {
    let mut finger = Mt2Finger::default();
    let cases = [
        (0x0, false),
        (MT2_STATE_TRANSITION, false),
        (MT2_STATE_FLOATING, false),
        (MT2_STATE_CONTACT, true),
        (MT2_STATE_CONTACT | MT2_STATE_TRANSITION, true),
        (0x6, false),
        (0x7, false),
    ];
    for (state, touching) in cases {
        finger.set_state(state);
        assert_eq!(finger.is_touching(), touching, "state {state:#x}");
    }

    Ok(())
}

#[tokio::test]
async fn test_unpack_spi_packet() -> Result<(), Box<dyn Error>> {
    let mut data = [0u8; 46];
    data[0] = 0x02;
    data[1] = 0x01;
    data[30] = 3;
    let header = SpiPacketHeader::unpack(&data)?;
    assert_eq!(header.packet_type, 0x02);
    assert_eq!(header.click_occurred, 1);
    assert_eq!(header.finger_count, 3);

    let mut finger = [0u8; 30];
    // X = -1200, Y = 5000, touch major 2499, touch minor 2500, pressure 12
    finger[4..6].copy_from_slice(&(-1200i16).to_le_bytes());
    finger[6..8].copy_from_slice(&5000i16.to_le_bytes());
    finger[18..20].copy_from_slice(&2499i16.to_le_bytes());
    finger[20..22].copy_from_slice(&2500i16.to_le_bytes());
    finger[26..28].copy_from_slice(&12i16.to_le_bytes());
    let finger = SpiFinger::unpack(&finger)?;
    assert_eq!(finger.x.to_primitive(), -1200);
    assert_eq!(finger.y.to_primitive(), 5000);
    assert_eq!(finger.pressure.to_primitive(), 12);
    assert!(finger.is_touching());
    assert!(!finger.is_confident(), "touch minor at the limit is rejected");

    Ok(())
}
