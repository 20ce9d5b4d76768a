//! Wire layouts for Apple trackpad packets and the precision touchpad (PTP)
//! multitouch report they are translated into.
use packed_struct::prelude::*;

/// Report ID of the multitouch input report handed to the host
pub const REPORTID_MULTITOUCH: u8 = 0x05;
/// Number of contact slots in a multitouch report
pub const MAX_CONTACTS: usize = 5;
/// Size of the packed multitouch report
pub const PTP_REPORT_SIZE: usize = 35;

// Report kinds found in the first byte of a Magic Trackpad 2 packet
pub const REPORT_KIND_MOUSE: u8 = 0x02;
pub const REPORT_KIND_MT2: u8 = 0x31;
pub const REPORT_KIND_BATTERY: u8 = 0x90;
pub const REPORT_KIND_DUAL_PACKET: u8 = 0xF7;
pub const REPORT_KIND_SPLIT_PART_ONE: u8 = 0xFC;
pub const REPORT_KIND_SPLIT_PART_TWO: u8 = 0xFE;

/// USB devices prepend a mouse report to every multitouch report
pub const MOUSE_REPORT_SIZE: usize = 8;
pub const MT2_HEADER_SIZE: usize = 4;
pub const MT2_FINGER_SIZE: usize = 9;
pub const SPI_HEADER_SIZE: usize = 46;
pub const SPI_FINGER_SIZE: usize = 30;

// Finger state bits
pub const MT2_STATE_TRANSITION: u8 = 0x1;
pub const MT2_STATE_FLOATING: u8 = 0x2;
pub const MT2_STATE_CONTACT: u8 = 0x4;

/// Finger type reported for a resting palm
pub const MT2_FINGER_TYPE_PALM: u8 = 6;

// ReportID: 5 | Contact Count: 1 | Button: 0 | Scan Time: 120
//   Contact Id: 3 | X: 3678 | Y: 2479 | Tip Switch: 1 | Confidence: 1
// 05 01 00 78 00 03 5e 0e af 09 03 ...
#[derive(PackedStruct, Debug, Copy, Clone, PartialEq)]
#[packed_struct(bit_numbering = "msb0", size_bytes = "35")]
pub struct PackedPtpReport {
    #[packed_field(bytes = "0")]
    pub report_id: u8,
    #[packed_field(bytes = "1")]
    pub contact_count: u8,
    #[packed_field(bytes = "2")]
    pub button_clicked: u8,
    #[packed_field(bytes = "3..=4", endian = "lsb")]
    pub scan_time: Integer<u16, packed_bits::Bits<16>>,
    #[packed_field(bytes = "5..=34", element_size_bytes = "6")]
    pub contacts: [PackedContact; 5],
}

impl Default for PackedPtpReport {
    fn default() -> Self {
        Self {
            report_id: REPORTID_MULTITOUCH,
            contact_count: 0,
            button_clicked: 0,
            scan_time: Integer::from_primitive(0),
            contacts: [PackedContact::default(); MAX_CONTACTS],
        }
    }
}

#[derive(PackedStruct, Debug, Copy, Clone, PartialEq, Default)]
#[packed_struct(bit_numbering = "msb0", size_bytes = "6")]
pub struct PackedContact {
    #[packed_field(bytes = "0")]
    pub contact_id: u8,
    #[packed_field(bytes = "1..=2", endian = "lsb")]
    pub x: Integer<u16, packed_bits::Bits<16>>,
    #[packed_field(bytes = "3..=4", endian = "lsb")]
    pub y: Integer<u16, packed_bits::Bits<16>>,
    #[packed_field(bits = "40..=45", endian = "lsb")]
    pub _unused: Integer<u8, packed_bits::Bits<6>>,
    #[packed_field(bits = "46")]
    pub confidence: bool,
    #[packed_field(bits = "47")]
    pub tip_switch: bool,
}

// Magic Trackpad 2 report header (Bluetooth report 0x31, or the USB report
// after the mouse prefix is stripped).
// 31 01 04 00 | <fingers>
#[derive(PackedStruct, Debug, Copy, Clone, PartialEq, Default)]
#[packed_struct(bit_numbering = "msb0", size_bytes = "4")]
pub struct Mt2ReportHeader {
    #[packed_field(bytes = "0")]
    pub report_id: u8,
    #[packed_field(bits = "8..=12", endian = "lsb")]
    pub timestamp_low: Integer<u8, packed_bits::Bits<5>>,
    #[packed_field(bits = "13..=14", endian = "lsb")]
    pub _unused: Integer<u8, packed_bits::Bits<2>>,
    #[packed_field(bits = "15")]
    pub button: bool,
    #[packed_field(bytes = "2..=3", endian = "lsb")]
    pub timestamp_high: Integer<u16, packed_bits::Bits<16>>,
}

impl Mt2ReportHeader {
    /// Returns the sensor timestamp assembled from its split fields
    pub fn timestamp(&self) -> u32 {
        let high = self.timestamp_high.to_primitive() as u32;
        let low = self.timestamp_low.to_primitive() as u32;
        (high << 5) | low
    }

    pub fn set_timestamp(&mut self, timestamp: u32) {
        self.timestamp_low = Integer::from_primitive((timestamp & 0x1f) as u8);
        self.timestamp_high = Integer::from_primitive(((timestamp >> 5) & 0xffff) as u16);
    }
}

// A single finger record. The first four bytes are a little-endian bitfield:
//   bits 0..13  absolute X (13-bit signed)
//   bits 13..26 absolute Y (13-bit signed, axis inverted)
//   bits 26..29 finger type (1 = thumb, 2 = index, ... 6 = palm)
//   bits 29..32 state
#[derive(PackedStruct, Debug, Copy, Clone, PartialEq, Default)]
#[packed_struct(bit_numbering = "msb0", size_bytes = "9")]
pub struct Mt2Finger {
    #[packed_field(bytes = "0..=3", endian = "lsb")]
    pub position: Integer<u32, packed_bits::Bits<32>>,
    #[packed_field(bytes = "4")]
    pub touch_major: u8,
    #[packed_field(bytes = "5")]
    pub touch_minor: u8,
    #[packed_field(bytes = "6")]
    pub size: u8,
    #[packed_field(bytes = "7")]
    pub pressure: u8,
    #[packed_field(bits = "64..=67", endian = "lsb")]
    pub orientation: Integer<u8, packed_bits::Bits<4>>,
    #[packed_field(bits = "68..=71", endian = "lsb")]
    pub id: Integer<u8, packed_bits::Bits<4>>,
}

impl Mt2Finger {
    fn position_bits(&self, shift: u32, mask: u32) -> u32 {
        (self.position.to_primitive() >> shift) & mask
    }

    fn set_position_bits(&mut self, shift: u32, mask: u32, value: u32) {
        let position = self.position.to_primitive() & !(mask << shift);
        self.position = Integer::from_primitive(position | ((value & mask) << shift));
    }

    pub fn raw_x(&self) -> u16 {
        self.position_bits(0, 0x1fff) as u16
    }

    pub fn set_raw_x(&mut self, value: u16) {
        self.set_position_bits(0, 0x1fff, value as u32);
    }

    pub fn raw_y(&self) -> u16 {
        self.position_bits(13, 0x1fff) as u16
    }

    pub fn set_raw_y(&mut self, value: u16) {
        self.set_position_bits(13, 0x1fff, value as u32);
    }

    pub fn finger_type(&self) -> u8 {
        self.position_bits(26, 0x7) as u8
    }

    pub fn set_finger_type(&mut self, value: u8) {
        self.set_position_bits(26, 0x7, value as u32);
    }

    pub fn state(&self) -> u8 {
        self.position_bits(29, 0x7) as u8
    }

    pub fn set_state(&mut self, value: u8) {
        self.set_position_bits(29, 0x7, value as u32);
    }

    /// Sign-extended X position in sensor space
    pub fn x(&self) -> i32 {
        sign_extend_13(self.raw_x())
    }

    /// Sign-extended Y position, flipped so that it grows downwards like the
    /// host coordinate space.
    pub fn y(&self) -> i32 {
        -sign_extend_13(self.raw_y())
    }

    /// A finger is touching when it reports contact and is not hovering
    pub fn is_touching(&self) -> bool {
        let state = self.state();
        state & MT2_STATE_CONTACT != 0 && state & MT2_STATE_FLOATING == 0
    }

    /// Rejects large contact areas and palms. The 345 threshold sits above
    /// the 25mm suggested for precision touchpads.
    pub fn is_confident(&self) -> bool {
        let valid_size = (self.touch_minor as u16) << 1 < 345;
        let valid_finger = self.finger_type() != MT2_FINGER_TYPE_PALM;
        valid_size && valid_finger
    }
}

/// Sign extend a 13-bit value by shifting it into the top of an i16
fn sign_extend_13(raw: u16) -> i32 {
    (((raw << 3) as i16) >> 3) as i32
}

// SPI trackpad packet header as found on MacBooks with an SPI attached
// trackpad.
#[derive(PackedStruct, Debug, Copy, Clone, PartialEq, Default)]
#[packed_struct(bit_numbering = "msb0", size_bytes = "46")]
pub struct SpiPacketHeader {
    #[packed_field(bytes = "0")]
    pub packet_type: u8,
    #[packed_field(bytes = "1")]
    pub click_occurred: u8,
    #[packed_field(bytes = "2..=6")]
    pub _reserved0: [u8; 5],
    #[packed_field(bytes = "7")]
    pub is_finger: u8,
    #[packed_field(bytes = "8..=23")]
    pub _reserved1: [u8; 16],
    #[packed_field(bytes = "24")]
    pub finger_data_length: u8,
    #[packed_field(bytes = "25..=29")]
    pub _reserved2: [u8; 5],
    #[packed_field(bytes = "30")]
    pub finger_count: u8,
    #[packed_field(bytes = "31")]
    pub click_occurred2: u8,
    #[packed_field(bytes = "32")]
    pub state1: u8,
    #[packed_field(bytes = "33")]
    pub state2: u8,
    #[packed_field(bytes = "34")]
    pub state3: u8,
    #[packed_field(bytes = "35")]
    pub padding: u8,
    #[packed_field(bytes = "36..=45")]
    pub _reserved3: [u8; 10],
}

#[derive(PackedStruct, Debug, Copy, Clone, PartialEq, Default)]
#[packed_struct(bit_numbering = "msb0", size_bytes = "30")]
pub struct SpiFinger {
    #[packed_field(bytes = "0..=1", endian = "lsb")]
    pub original_x: Integer<i16, packed_bits::Bits<16>>,
    #[packed_field(bytes = "2..=3", endian = "lsb")]
    pub original_y: Integer<i16, packed_bits::Bits<16>>,
    #[packed_field(bytes = "4..=5", endian = "lsb")]
    pub x: Integer<i16, packed_bits::Bits<16>>,
    #[packed_field(bytes = "6..=7", endian = "lsb")]
    pub y: Integer<i16, packed_bits::Bits<16>>,
    #[packed_field(bytes = "8..=9", endian = "lsb")]
    pub horizontal_accel: Integer<i16, packed_bits::Bits<16>>,
    #[packed_field(bytes = "10..=11", endian = "lsb")]
    pub vertical_accel: Integer<i16, packed_bits::Bits<16>>,
    #[packed_field(bytes = "12..=13", endian = "lsb")]
    pub tool_major: Integer<i16, packed_bits::Bits<16>>,
    #[packed_field(bytes = "14..=15", endian = "lsb")]
    pub tool_minor: Integer<i16, packed_bits::Bits<16>>,
    #[packed_field(bytes = "16..=17", endian = "lsb")]
    pub orientation: Integer<i16, packed_bits::Bits<16>>,
    #[packed_field(bytes = "18..=19", endian = "lsb")]
    pub touch_major: Integer<i16, packed_bits::Bits<16>>,
    #[packed_field(bytes = "20..=21", endian = "lsb")]
    pub touch_minor: Integer<i16, packed_bits::Bits<16>>,
    #[packed_field(bytes = "22..=23", endian = "lsb")]
    pub _reserved1: Integer<i16, packed_bits::Bits<16>>,
    #[packed_field(bytes = "24..=25", endian = "lsb")]
    pub _reserved2: Integer<i16, packed_bits::Bits<16>>,
    #[packed_field(bytes = "26..=27", endian = "lsb")]
    pub pressure: Integer<i16, packed_bits::Bits<16>>,
    #[packed_field(bytes = "28..=29", endian = "lsb")]
    pub _reserved3: Integer<i16, packed_bits::Bits<16>>,
}

impl SpiFinger {
    pub fn is_touching(&self) -> bool {
        self.pressure.to_primitive() > 0
    }

    // S = pi * r^2 with r^2 = (major * minor) / 4, approximated by bounding
    // both axes.
    pub fn is_confident(&self) -> bool {
        self.touch_major.to_primitive() < 2500 && self.touch_minor.to_primitive() < 2500
    }
}
