//! Logitech G-series Keyboard CLI
//!
//! Command-line control for the LCD, backlight, LEDs and macro keys.

use anyhow::Result;
use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use g15_driver::DriverConfig;

// CLI definitions
mod cli;
use cli::{Cli, Commands};

// Command handlers
mod commands;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    let config_path = cli.config.clone().unwrap_or_else(DriverConfig::default_path);
    debug!("Loading config from {:?}", config_path);
    let config = DriverConfig::load(&config_path)?;

    match cli.command {
        // === Query Commands ===
        None | Some(Commands::Info) => commands::query::info(&config)?,
        Some(Commands::List) => commands::query::list(&config)?,

        // === Set Commands ===
        Some(Commands::Brightness { level }) => commands::set::brightness(&config, level)?,
        Some(Commands::Backlight { level }) => commands::set::backlight(&config, level)?,
        Some(Commands::Contrast { level }) => commands::set::contrast(&config, level)?,
        Some(Commands::Leds { mask }) => commands::set::leds(&config, mask)?,
        Some(Commands::Color { r, g, b }) => commands::set::color(&config, r, g, b)?,
        Some(Commands::G110Color { hue, brightness }) => {
            commands::set::g110_color(&config, hue, brightness)?
        }

        // === LCD Commands ===
        Some(Commands::Draw {
            image,
            threshold,
            invert,
            nearest,
            preview,
        }) => commands::display::draw(&config, &image, threshold, invert, nearest, preview)?,
        Some(Commands::Clear) => commands::display::clear(&config)?,

        // === Keys ===
        Some(Commands::Keys { timeout }) => commands::keys::watch(&config, timeout)?,
    }

    Ok(())
}

fn init_logging(cli: &Cli) {
    let level = match cli.verbose {
        0 => cli.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
