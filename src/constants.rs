/// Name used for configuration directories and logging
pub const APP_NAME: &str = "ptpbridge";

/// Apple vendor id on the USB bus
pub const VID_APPLE_USB: u16 = 0x05ac;
/// Apple vendor id on the Bluetooth bus
pub const VID_APPLE_BT: u16 = 0x004c;

/// Vendor ids the pipeline knows how to decode packets for
pub const SUPPORTED_VENDOR_IDS: &[u16] = &[VID_APPLE_USB, VID_APPLE_BT];
