use std::fs::File;
use std::io::Write;

use ptpbridge::config::DeviceConfig;
use schemars::schema_for;

fn main() {
    let device_schema = schema_for!(DeviceConfig);
    let mut file = File::create("./rootfs/usr/share/ptpbridge/schema/device_v1.json")
        .expect("Failed to create schema file");
    write!(
        file,
        "{}",
        serde_json::to_string_pretty(&device_schema).unwrap()
    )
    .expect("Failed to write schema");
}
