//! Application settings persistence using dconf
//!
//! Settings are stored in dconf under `/com/voxmemo/recorder/`

use crate::session::RecordPermission;
use log::error;
use std::path::PathBuf;

const DCONF_PATH: &str = "/com/voxmemo/recorder/";

/// Keys for dconf settings
mod keys {
    pub const RECORDINGS_DIR: &str = "recordings-dir";
    pub const MICROPHONE_PERMISSION: &str = "microphone-permission";
}

fn key(name: &str) -> String {
    format!("{}{}", DCONF_PATH, name)
}

/// Directory new recordings are written to
///
/// Falls back to `<data dir>/voxmemo/recordings` when unset.
pub fn get_recordings_dir() -> PathBuf {
    dconf_rs::get_string(&key(keys::RECORDINGS_DIR))
        .ok()
        .filter(|dir| !dir.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(default_recordings_dir)
}

pub fn default_recordings_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("voxmemo")
        .join("recordings")
}

/// Stored answer to the microphone prompt
pub fn get_microphone_permission() -> RecordPermission {
    dconf_rs::get_string(&key(keys::MICROPHONE_PERMISSION))
        .map(|value| RecordPermission::from_setting(&value))
        .unwrap_or_default()
}

pub fn set_microphone_permission(permission: RecordPermission) {
    if let Err(e) = dconf_rs::set_string(&key(keys::MICROPHONE_PERMISSION), permission.as_setting())
    {
        error!("Failed to save microphone permission to dconf: {}", e);
    }
}
