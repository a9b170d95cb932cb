//! Utility functions for the settings engine
//!
//! Common helper functions used throughout the crate.

use serde::Serialize;

use super::error::SettingsResult;

/// Generate a time-ordered UUID (v7)
pub fn generate_uuid() -> uuid::Uuid {
    uuid::Uuid::now_v7()
}

/// Calculate BLAKE3 hash of raw content
pub fn hash_content(content: &[u8]) -> String {
    let hash = blake3::hash(content);
    hash.to_hex().to_string()
}

/// Fingerprint of a serializable value, taken over its canonical JSON bytes
pub fn fingerprint<T: Serialize>(value: &T) -> SettingsResult<String> {
    let bytes = serde_json::to_vec(value)?;
    Ok(hash_content(&bytes))
}

/// Best-effort human readable name of the current machine
pub fn device_name() -> String {
    ["HOSTNAME", "COMPUTERNAME"]
        .iter()
        .find_map(|var| std::env::var(var).ok().filter(|v| !v.trim().is_empty()))
        .unwrap_or_else(|| "unknown-device".to_string())
}

/// Format a byte count for display
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
