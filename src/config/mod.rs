pub mod path;


use std::{io, path::Path, path::PathBuf};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::drivers::apple_trackpad::{parser::PacketProtocol, report::Calibration};

use path::{get_devices_paths, get_multidir_sorted_files};

/// Represents all possible errors loading a [DeviceConfig]
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Could not read: {0}")]
    IoError(#[from] io::Error),
    #[error("Unable to deserialize: {0}")]
    DeserializeError(#[from] serde_yaml::Error),
}

/// Describes a supported trackpad and how its packets are decoded
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub struct DeviceConfig {
    pub version: u32,
    pub name: String,
    pub protocol: PacketProtocol,
    pub vendor_id: u16,
    pub product_id: u16,
    /// Axis bounds reported by the sensor
    pub calibration: Calibration,
    /// Feature report that puts the device into multitouch mode. Re-sent
    /// whenever the device recovers from a transport failure.
    pub multitouch_mode_report: Option<Vec<u8>>,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// Tuning for the request pipeline
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub struct PipelineConfig {
    /// Delay before the device is reconfigured after a failure
    #[serde(default = "default_recovery_delay_ms")]
    pub recovery_delay_ms: u64,
    /// Number of transport buffers available to the device
    #[serde(default = "default_pool_capacity")]
    pub pool_capacity: usize,
    /// Size of each transport buffer in bytes
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    /// Maximum number of upstream requests waiting for a report
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Timeout for a single hidraw read. A read that times out is reissued.
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: i32,
}

fn default_recovery_delay_ms() -> u64 {
    3000
}

fn default_pool_capacity() -> usize {
    4
}

fn default_buffer_size() -> usize {
    512
}

fn default_queue_capacity() -> usize {
    64
}

fn default_read_timeout_ms() -> i32 {
    1000
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            recovery_delay_ms: default_recovery_delay_ms(),
            pool_capacity: default_pool_capacity(),
            buffer_size: default_buffer_size(),
            queue_capacity: default_queue_capacity(),
            read_timeout_ms: default_read_timeout_ms(),
        }
    }
}

impl DeviceConfig {
    /// Load a [DeviceConfig] from the given YAML string
    pub fn from_yaml(content: String) -> Result<DeviceConfig, LoadError> {
        let device: DeviceConfig = serde_yaml::from_str(content.as_str())?;
        Ok(device)
    }

    /// Load a [DeviceConfig] from the given YAML file
    pub fn from_yaml_file(path: String) -> Result<DeviceConfig, LoadError> {
        Self::from_yaml_path(Path::new(&path))
    }

    /// Load a [DeviceConfig] from the given YAML file path
    pub fn from_yaml_path(path: &Path) -> Result<DeviceConfig, LoadError> {
        let file = std::fs::File::open(path)?;
        let device: DeviceConfig = serde_yaml::from_reader(file)?;
        Ok(device)
    }

    /// Returns true if this config describes the given device
    pub fn matches(&self, vendor_id: u16, product_id: u16) -> bool {
        self.vendor_id == vendor_id && self.product_id == product_id
    }
}

/// Load every device config found in the config directories, in load order.
/// Files that fail to parse are logged and skipped.
pub fn load_device_configs() -> Vec<(PathBuf, DeviceConfig)> {
    let paths = get_devices_paths();
    let files = get_multidir_sorted_files(paths.as_slice(), |entry| {
        entry.path().extension().is_some_and(|ext| ext == "yaml")
    });

    files
        .into_iter()
        .filter_map(|file| match DeviceConfig::from_yaml_path(&file) {
            Ok(config) => Some((file, config)),
            Err(e) => {
                log::warn!("Failed to load config {file:?}: {e}");
                None
            }
        })
        .collect()
}

/// Returns the first device config matching the given ids
pub fn find_device_config(vendor_id: u16, product_id: u16) -> Option<DeviceConfig> {
    load_device_configs()
        .into_iter()
        .map(|(_, config)| config)
        .find(|config| config.matches(vendor_id, product_id))
}
