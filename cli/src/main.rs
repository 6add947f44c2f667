//! # photo-printer
//!
//! Prints photos on BLE thermal receipt printers.
//!
//! ```bash
//! # List nearby devices
//! photo-printer scan
//!
//! # Print to the first printer that exposes a writable channel
//! photo-printer print photo.jpg
//!
//! # Pick a printer and stack a logo above the photo
//! photo-printer print --name MTP-II --logo logo.png photo.jpg
//!
//! # Write the dithered bitmap instead of printing
//! photo-printer preview photo.jpg --output preview.png
//! ```

mod bootstrap;
mod config;
mod services;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use config::AppConfig;

/// Thermal photo printer over Bluetooth LE
#[derive(Parser, Debug)]
#[command(name = "photo-printer")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List nearby BLE devices
    Scan {
        /// Scan window in seconds
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..=120))]
        timeout: Option<u64>,
    },

    /// Print a photo
    Print {
        /// Image file to print
        image: PathBuf,

        /// Advertised printer name
        #[arg(long)]
        name: Option<String>,

        /// Printer MAC address or platform UUID
        #[arg(long)]
        address: Option<String>,

        /// Image stacked above the photo
        #[arg(long, value_name = "FILE")]
        logo: Option<PathBuf>,

        /// Maximum bytes per write
        #[arg(long, value_parser = clap::value_parser!(u16).range(20..=512))]
        frame_size: Option<u16>,
    },

    /// Write the print-ready bitmap to a PNG
    Preview {
        /// Image file to render
        image: PathBuf,

        /// Output PNG path
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,

        /// Image stacked above the photo
        #[arg(long, value_name = "FILE")]
        logo: Option<PathBuf>,
    },

    /// Show the effective settings
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    bootstrap::load_dotenv();
    if let Commands::Config = cli.command {
        config::print_settings();
        return Ok(());
    }
    let mut config = AppConfig::load()?;

    match cli.command {
        Commands::Scan { timeout } => {
            if let Some(secs) = timeout {
                config.scan_timeout_secs = secs;
            }
            services::printer::scan_bluetooth_printers(&config).await
        }
        Commands::Print {
            image,
            name,
            address,
            logo,
            frame_size,
        } => {
            if let Some(name) = name {
                config.printer_name = name;
            }
            if let Some(address) = address {
                config.printer_address = address;
            }
            if logo.is_some() {
                config.logo_path = logo;
            }
            if let Some(size) = frame_size {
                config.frame_size = size.into();
            }
            services::printer::print_photo(&config, &image).await
        }
        Commands::Preview {
            image,
            output,
            logo,
        } => {
            if logo.is_some() {
                config.logo_path = logo;
            }
            services::printer::preview(&config, &image, &output)
        }
        Commands::Config => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_scan_timeout_range() {
        let cli = Cli::try_parse_from(["photo-printer", "scan", "--timeout", "30"]).unwrap();
        assert!(matches!(cli.command, Commands::Scan { timeout: Some(30) }));

        assert!(Cli::try_parse_from(["photo-printer", "scan", "--timeout", "0"]).is_err());
        assert!(Cli::try_parse_from(["photo-printer", "scan", "--timeout", "121"]).is_err());
    }

    #[test]
    fn test_frame_size_range() {
        let ok = Cli::try_parse_from(["photo-printer", "print", "a.jpg", "--frame-size", "20"]);
        assert!(ok.is_ok());
        let low = Cli::try_parse_from(["photo-printer", "print", "a.jpg", "--frame-size", "19"]);
        assert!(low.is_err());
    }
}
