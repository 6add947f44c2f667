//! Printer service helpers (BLE scan, print, offline preview).

use std::path::Path;

use anyhow::Context;
use ble_printer::btle::DiscoveredDevice;
use ble_printer::{BtleHost, PrinterError, PrinterSession, TransportReport};
use image_processor::{RasterBitmap, load_image, prepare_frame};
use tracing::{info, warn};

use crate::config::AppConfig;

/// List nearby BLE devices, named ones first.
pub async fn scan_bluetooth_printers(config: &AppConfig) -> anyhow::Result<()> {
    let host = BtleHost::new().await?;
    let mut devices = host.scan_devices(config.scan_timeout()).await?;
    sort_devices(&mut devices);

    if devices.is_empty() {
        println!("No devices found.");
        return Ok(());
    }
    for d in &devices {
        let name = if d.name.is_empty() { "(unnamed)" } else { d.name.as_str() };
        let services: Vec<String> = d.services.iter().map(ToString::to_string).collect();
        println!("{name:<24} {:<38} {}", d.id, services.join(","));
    }
    Ok(())
}

fn sort_devices(devices: &mut [DiscoveredDevice]) {
    devices.sort_by(|a, b| {
        a.name
            .is_empty()
            .cmp(&b.name.is_empty())
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Print one photo. Ctrl-C aborts the job and releases the printer.
pub async fn print_photo(config: &AppConfig, path: &Path) -> anyhow::Result<()> {
    let photo = load_image(path).with_context(|| format!("failed to load {}", path.display()))?;
    let options = config.printer_options()?;
    let host = BtleHost::new().await?;
    let mut session = PrinterSession::new(host, options);

    let outcome = tokio::select! {
        res = session.print(&photo) => Some(res),
        _ = tokio::signal::ctrl_c() => None,
    };

    if let Err(e) = session.disconnect().await {
        warn!(error = %e, "Failed to disconnect printer");
    }

    match outcome {
        Some(Ok(report)) => {
            log_report(&report);
            Ok(())
        }
        Some(Err(e)) => Err(explain(e)),
        None => {
            info!("Interrupted, printer released");
            Ok(())
        }
    }
}

fn log_report(report: &TransportReport) {
    info!(
        frames = report.frames,
        bytes = report.bytes,
        retries = report.retries,
        "Print job sent"
    );
}

fn explain(err: PrinterError) -> anyhow::Error {
    let hint = match &err {
        PrinterError::AdapterUnavailable(_) => Some(
            "turn Bluetooth on and allow this terminal to use it \
             (macOS: Privacy & Security > Bluetooth)",
        ),
        PrinterError::DeviceSelectionCancelled(_) => {
            Some("is the printer powered on and in range? try `photo-printer scan`")
        }
        PrinterError::ChannelNotFound { .. } => {
            Some("add the printer's service ID to PRINTER_SERVICES if it uses a custom one")
        }
        _ => None,
    };
    match hint {
        Some(hint) => anyhow::Error::new(err).context(hint),
        None => err.into(),
    }
}

/// Render exactly what would be printed to a PNG, without any BLE I/O.
pub fn preview(config: &AppConfig, path: &Path, output: &Path) -> anyhow::Result<()> {
    let photo = load_image(path).with_context(|| format!("failed to load {}", path.display()))?;
    let options = config.printer_options()?;

    let gray = prepare_frame(&photo, options.target, options.header.as_ref());
    let bitmap = RasterBitmap::encode(&gray);
    bitmap
        .to_gray_image()
        .save(output)
        .with_context(|| format!("failed to write {}", output.display()))?;

    info!(
        width = bitmap.width(),
        height = bitmap.height(),
        bytes = bitmap.data().len(),
        output = %output.display(),
        "Preview written"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explain_adds_hint() {
        let err = explain(PrinterError::AdapterUnavailable("no adapter found".into()));
        assert!(err.to_string().contains("turn Bluetooth on"));
        assert!(format!("{err:#}").contains("no adapter found"));

        let err = explain(PrinterError::NotConnected);
        assert_eq!(err.to_string(), "Not connected to any device");
    }
}
