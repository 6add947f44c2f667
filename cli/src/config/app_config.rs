//! Runtime configuration loaded from the environment with built-in defaults.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, bail};
use ble_printer::PrinterOptions;
use ble_printer::gatt::parse_service_id;
use image_processor::{TargetSize, load_image};
use uuid::Uuid;

use super::defaults::get_default;
use super::validation::{split_list, validate_setting};

/// Runtime configuration for one invocation.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub printer_name: String,
    pub printer_address: String,
    pub printer_services: Vec<Uuid>,
    pub scan_timeout_secs: u64,
    pub frame_size: usize,
    pub inter_frame_delay_ms: u64,
    pub retry_backoff_ms: u64,
    pub target_width: u32,
    pub target_height: u32,
    pub feed_lines: u16,
    pub logo_path: Option<PathBuf>,
}

impl AppConfig {
    /// Load configuration from process environment variables.
    pub fn load() -> Result<Self, anyhow::Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from `lookup`, falling back to defaults.
    ///
    /// Every value is validated; the first invalid one aborts loading.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, anyhow::Error> {
        let g = |key: &str| -> Result<String, anyhow::Error> {
            let value = lookup(key)
                .map(|v| v.trim().to_string())
                .unwrap_or_else(|| get_default(key).unwrap_or_default().to_string());
            if let Err(e) = validate_setting(key, &value) {
                bail!("{key}={value:?}: {e}");
            }
            Ok(value)
        };

        let printer_services = split_list(&g("PRINTER_SERVICES")?)
            .filter_map(parse_service_id)
            .collect();
        let logo_path = Some(g("LOGO_PATH")?)
            .filter(|p| !p.is_empty())
            .map(PathBuf::from);

        Ok(Self {
            printer_name: g("PRINTER_NAME")?,
            printer_address: g("PRINTER_ADDRESS")?,
            printer_services,
            scan_timeout_secs: g("SCAN_TIMEOUT_SECS")?.parse()?,
            frame_size: g("FRAME_SIZE")?.parse()?,
            inter_frame_delay_ms: g("INTER_FRAME_DELAY_MS")?.parse()?,
            retry_backoff_ms: g("RETRY_BACKOFF_MS")?.parse()?,
            target_width: g("TARGET_WIDTH")?.parse()?,
            target_height: g("TARGET_HEIGHT")?.parse()?,
            feed_lines: g("FEED_LINES")?.parse()?,
            logo_path,
        })
    }

    pub fn scan_timeout(&self) -> Duration {
        Duration::from_secs(self.scan_timeout_secs)
    }

    /// Build session options, loading the logo if one is configured.
    pub fn printer_options(&self) -> Result<PrinterOptions, anyhow::Error> {
        let target = TargetSize::new(self.target_width, self.target_height)?;
        let mut options = PrinterOptions::new()
            .with_extra_services(self.printer_services.iter().copied())
            .with_scan_timeout(self.scan_timeout())
            .with_target(target)
            .with_feed_lines(self.feed_lines)
            .with_frame_size(self.frame_size)
            .with_inter_frame_delay(Duration::from_millis(self.inter_frame_delay_ms))
            .with_retry_backoff(Duration::from_millis(self.retry_backoff_ms));

        if !self.printer_name.is_empty() {
            options = options.with_name(&self.printer_name);
        }
        if !self.printer_address.is_empty() {
            options = options.with_address(&self.printer_address);
        }
        if let Some(path) = &self.logo_path {
            let logo = load_image(path)
                .with_context(|| format!("failed to load logo {}", path.display()))?;
            options = options.with_header(logo);
        }
        Ok(options)
    }
}
