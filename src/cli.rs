// CLI definitions using clap

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "g15ctl")]
#[command(author, version, about = "Logitech G15/G13/G510 keyboard and LCD control")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Config file path (default: ~/.config/g15/driver.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace); RUST_LOG takes precedence
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    /// More logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    // === Query Commands ===
    /// List supported models and count the connected ones
    #[command(visible_alias = "ls")]
    List,

    /// Open the keyboard and show model, capabilities and endpoints
    #[command(visible_alias = "i")]
    Info,

    // === Set Commands ===
    /// Set LCD backlight brightness (0-2)
    Brightness {
        #[arg(value_parser = clap::value_parser!(u8).range(0..=2))]
        level: u8,
    },

    /// Set key backlight brightness (0-2)
    Backlight {
        #[arg(value_parser = clap::value_parser!(u8).range(0..=2))]
        level: u8,
    },

    /// Set LCD contrast (0-2)
    Contrast {
        #[arg(value_parser = clap::value_parser!(u8).range(0..=2))]
        level: u8,
    },

    /// Set M-key LEDs (M1=1, M2=2, M3=4, MR=8; decimal or 0x hex)
    Leds {
        #[arg(value_parser = parse_mask)]
        mask: u8,
    },

    /// Set the RGB key backlight (G510)
    Color { r: u8, g: u8, b: u8 },

    /// Set the key backlight colour (G110; hue 0 = red .. 255 = blue)
    G110Color {
        hue: u8,
        /// Brightness (the hardware uses 0-14)
        brightness: u8,
    },

    // === LCD Commands ===
    /// Show an image on the LCD
    Draw {
        /// Image file (PNG, JPEG or BMP)
        image: PathBuf,

        /// Luma threshold below which a pixel is lit (default from config)
        #[arg(short, long)]
        threshold: Option<u8>,

        /// Invert the image
        #[arg(short, long)]
        invert: bool,

        /// Nearest-neighbour scaling (sharper for pixel art)
        #[arg(long)]
        nearest: bool,

        /// Write the converted frame to a PNG instead of the device
        #[arg(long, value_name = "PNG")]
        preview: Option<PathBuf>,
    },

    /// Clear the LCD
    Clear,

    // === Keys ===
    /// Print G/M/L key presses until Ctrl-C
    Keys {
        /// Poll timeout in milliseconds (default from config)
        #[arg(short, long)]
        timeout: Option<u64>,
    },
}

/// Parse an LED mask given in decimal or 0x-prefixed hex
pub fn parse_mask(s: &str) -> Result<u8, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => s.parse::<u8>(),
    };
    parsed.map_err(|e| format!("invalid LED mask '{s}': {e}"))
}
