//! Microphone permission gate

use crate::settings;
use log::info;

/// Whether the user allowed microphone capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordPermission {
    #[default]
    Undetermined,
    Denied,
    Granted,
}

impl RecordPermission {
    /// Parse the stored setting; anything unknown counts as undetermined
    pub fn from_setting(value: &str) -> Self {
        match value.trim() {
            "granted" => RecordPermission::Granted,
            "denied" => RecordPermission::Denied,
            _ => RecordPermission::Undetermined,
        }
    }

    pub fn as_setting(self) -> &'static str {
        match self {
            RecordPermission::Undetermined => "",
            RecordPermission::Denied => "denied",
            RecordPermission::Granted => "granted",
        }
    }
}

/// Source of truth for the microphone permission
pub trait PermissionGate {
    fn status(&self) -> RecordPermission;
    /// Remember the user's answer to a prompt
    fn store(&mut self, granted: bool);
}

/// Permission kept in dconf so the answer survives restarts
#[derive(Debug, Default)]
pub struct DconfPermissionGate;

impl PermissionGate for DconfPermissionGate {
    fn status(&self) -> RecordPermission {
        settings::get_microphone_permission()
    }

    fn store(&mut self, granted: bool) {
        let permission = if granted {
            RecordPermission::Granted
        } else {
            RecordPermission::Denied
        };
        info!("Storing microphone permission: {:?}", permission);
        settings::set_microphone_permission(permission);
    }
}
