//! Notification severity levels, modelled after logging levels: an ordered,
//! integer-backed scale so threshold checks are one numeric comparison and
//! display attributes are lookups, never per-channel conditionals.

use serde::{Deserialize, Serialize};

use wattwatch_core::types::RunStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyLevel {
    Debug = 10,
    Info = 20,
    Success = 25,
    Warning = 30,
    Error = 40,
    Critical = 50,
}

impl NotifyLevel {
    /// Parse a config string. Unknown strings fall back to Info.
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "debug" => NotifyLevel::Debug,
            "info" => NotifyLevel::Info,
            "success" => NotifyLevel::Success,
            "warning" => NotifyLevel::Warning,
            "error" => NotifyLevel::Error,
            "critical" => NotifyLevel::Critical,
            _ => NotifyLevel::Info,
        }
    }

    /// Pure outcome-status to severity mapping.
    pub fn for_status(status: RunStatus) -> Self {
        match status {
            RunStatus::Success => NotifyLevel::Success,
            RunStatus::Partial => NotifyLevel::Warning,
            RunStatus::Error => NotifyLevel::Error,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            NotifyLevel::Debug => "DEBUG",
            NotifyLevel::Info => "INFO",
            NotifyLevel::Success => "SUCCESS",
            NotifyLevel::Warning => "WARNING",
            NotifyLevel::Error => "ERROR",
            NotifyLevel::Critical => "CRITICAL",
        }
    }

    /// Embed color, shared by every channel that can show one.
    pub fn color(self) -> u32 {
        match self {
            NotifyLevel::Debug => 0x888888,    // Gray
            NotifyLevel::Info => 0x0099FF,     // Blue
            NotifyLevel::Success => 0x00FF00,  // Green
            NotifyLevel::Warning => 0xFFAA00,  // Orange
            NotifyLevel::Error => 0xFF0000,    // Red
            NotifyLevel::Critical => 0x990000, // Dark red
        }
    }

    /// Message prefix glyph, shared by every text-only channel.
    pub fn glyph(self) -> &'static str {
        match self {
            NotifyLevel::Debug => "🔎",
            NotifyLevel::Info => "ℹ️",
            NotifyLevel::Success => "✅",
            NotifyLevel::Warning => "🟡",
            NotifyLevel::Error => "🔴",
            NotifyLevel::Critical => "🚨",
        }
    }
}
