//! Setting value validation.

use ble_printer::gatt::parse_service_id;
use regex::Regex;
use std::sync::LazyLock;

static RE_MAC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9A-Fa-f]{2}[:\-]){5}([0-9A-Fa-f]{2})$").unwrap());
static RE_UUID_NO_HYPHEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9A-Fa-f]{32}$").unwrap());
static RE_UUID_HYPHEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9A-Fa-f]{8}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{12}$")
        .unwrap()
});

/// Validate a setting value. Returns `Ok(())` if valid, or an error message.
pub fn validate_setting(key: &str, value: &str) -> Result<(), String> {
    match key {
        "PRINTER_NAME" => {
            if value.len() > 248 {
                return Err("name must be at most 248 bytes".into());
            }
        }
        "PRINTER_ADDRESS" => {
            if !value.is_empty()
                && !RE_MAC.is_match(value)
                && !RE_UUID_NO_HYPHEN.is_match(value)
                && !RE_UUID_HYPHEN.is_match(value)
            {
                return Err("invalid address format (expected MAC or UUID)".into());
            }
        }
        "PRINTER_SERVICES" => {
            for id in split_list(value) {
                if parse_service_id(id).is_none() {
                    return Err(format!("invalid service ID '{id}' (expected ffe0 or a UUID)"));
                }
            }
        }
        "SCAN_TIMEOUT_SECS" => validate_int_range(value, 1, 120)?,
        "FRAME_SIZE" => validate_int_range(value, 20, 512)?,
        "INTER_FRAME_DELAY_MS" | "RETRY_BACKOFF_MS" => validate_int_range(value, 0, 1000)?,
        "TARGET_WIDTH" => validate_dots(value, 2048)?,
        "TARGET_HEIGHT" => validate_dots(value, 4096)?,
        "FEED_LINES" => validate_int_range(value, 0, 16)?,
        _ => {}
    }
    Ok(())
}

/// Split a comma separated list, dropping blanks.
pub fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn validate_int_range(value: &str, min: i64, max: i64) -> Result<(), String> {
    let v: i64 = value.parse().map_err(|_| "must be an integer")?;
    if v < min || v > max {
        return Err(format!("must be between {min} and {max}"));
    }
    Ok(())
}

/// Raster rows are whole bytes, so canvas edges must be multiples of 8.
fn validate_dots(value: &str, max: i64) -> Result<(), String> {
    validate_int_range(value, 8, max)?;
    let v: i64 = value.parse().map_err(|_| "must be an integer")?;
    if v % 8 != 0 {
        return Err("must be a multiple of 8".into());
    }
    Ok(())
}
