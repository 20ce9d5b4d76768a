//! Module for searching for ptpbridge config files

use std::{
    fs::{self, DirEntry},
    path::PathBuf,
};

use crate::constants::APP_NAME;

/// Base system fallback path to use if one cannot be found with XDG
const FALLBACK_BASE_PATH: &str = "/usr/share/ptpbridge";

/// Returns the base path for configuration data
pub fn get_base_path() -> PathBuf {
    let Ok(base_dirs) = xdg::BaseDirectories::with_prefix(APP_NAME) else {
        log::warn!("Unable to determine config base path. Using fallback path.");
        return PathBuf::from(FALLBACK_BASE_PATH);
    };

    // Get the data directories in preference order
    let data_dirs = base_dirs.get_data_dirs();
    for dir in data_dirs {
        if dir.exists() {
            return dir;
        }
    }

    log::warn!("Config base path not found. Using fallback path.");
    PathBuf::from(FALLBACK_BASE_PATH)
}

/// Returns a list of directories in load order to find device configurations.
/// E.g. ["/etc/ptpbridge/devices.d", "/usr/share/ptpbridge/devices"]
pub fn get_devices_paths() -> Vec<PathBuf> {
    vec![
        PathBuf::from("/etc/ptpbridge/devices.d"),
        get_base_path().join("devices"),
        PathBuf::from("./rootfs/usr/share/ptpbridge/devices"),
    ]
}

/// Returns a list of file paths for the given directories sorted by filename.
/// When the same filename exists in more than one directory, only the one
/// from the earliest directory is kept, so files in "/etc" override the
/// packaged ones. The filter argument should return `true` for any files that
/// should be included.
pub fn get_multidir_sorted_files<F>(paths: &[PathBuf], filter: F) -> Vec<PathBuf>
where
    F: Fn(&DirEntry) -> bool,
{
    let mut files = std::collections::BTreeMap::new();
    for path in paths {
        log::trace!("Checking {path:?} for files");
        let entries = match fs::read_dir(path) {
            Ok(entries) => entries,
            Err(e) => {
                log::debug!("Unable to read directory: {path:?}: {e}");
                continue;
            }
        };
        for entry in entries.flatten() {
            if !filter(&entry) {
                continue;
            }
            files.entry(entry.file_name()).or_insert_with(|| entry.path());
        }
    }
    log::trace!("Got sorted entries: {files:?}");

    files.into_values().collect()
}
