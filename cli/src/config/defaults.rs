//! All setting definitions with their default values.

use std::collections::HashMap;
use std::sync::LazyLock;

type DefTuple = (&'static str, &'static str, &'static str);

const DEFS: &[DefTuple] = &[
    ("PRINTER_NAME", "", "Advertised name of the printer to select"),
    ("PRINTER_ADDRESS", "", "MAC address or platform UUID of the printer"),
    (
        "PRINTER_SERVICES",
        "",
        "Extra service IDs (comma separated) probed after the built-in table",
    ),
    ("SCAN_TIMEOUT_SECS", "10", "Device selection scan window in seconds"),
    ("FRAME_SIZE", "180", "Maximum bytes per BLE write"),
    ("INTER_FRAME_DELAY_MS", "10", "Pause between frames in milliseconds"),
    ("RETRY_BACKOFF_MS", "30", "Wait before retrying a failed frame"),
    ("TARGET_WIDTH", "384", "Canvas width in dots"),
    ("TARGET_HEIGHT", "256", "Canvas height in dots"),
    ("FEED_LINES", "2", "Line feeds after the image"),
    ("LOGO_PATH", "", "Image stacked above every photo"),
];

/// A single setting definition.
#[derive(Debug, Clone)]
pub struct SettingDef {
    pub key: &'static str,
    pub default: &'static str,
    pub description: &'static str,
}

/// Global setting definitions indexed by key.
pub static DEFAULT_SETTINGS: LazyLock<HashMap<&'static str, SettingDef>> = LazyLock::new(|| {
    DEFS.iter()
        .map(|&(key, default, description)| {
            (
                key,
                SettingDef {
                    key,
                    default,
                    description,
                },
            )
        })
        .collect()
});

/// Get the default value for a setting key, or `None` if not defined.
pub fn get_default(key: &str) -> Option<&'static str> {
    DEFAULT_SETTINGS.get(key).map(|d| d.default)
}

/// Setting definitions in declaration order.
pub fn all() -> impl Iterator<Item = &'static SettingDef> {
    DEFS.iter().filter_map(|(key, _, _)| DEFAULT_SETTINGS.get(key))
}
