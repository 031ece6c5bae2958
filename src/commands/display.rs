//! LCD command handlers.

use super::{with_keyboard, CommandResult};
use anyhow::Context;
use g15_driver::{frame_to_image, load_frame, BitmapOptions, DriverConfig};
use std::path::{Path, PathBuf};

/// Convert an image and show it on the LCD (or write a preview PNG)
pub fn draw(
    config: &DriverConfig,
    image: &Path,
    threshold: Option<u8>,
    invert: bool,
    nearest: bool,
    preview: Option<PathBuf>,
) -> CommandResult {
    let opts = BitmapOptions {
        threshold: threshold.unwrap_or(config.threshold),
        invert,
        nearest,
    };
    let frame = load_frame(image, &opts)?;

    if let Some(path) = preview {
        frame_to_image(&frame)
            .save(&path)
            .with_context(|| format!("Failed to write preview {}", path.display()))?;
        println!("Preview written to {}", path.display());
        return Ok(());
    }

    with_keyboard(config, |keyboard| {
        keyboard.write_display(&frame)?;
        println!("Image sent ({} pixels lit)", frame.lit_pixels());
        Ok(())
    })
}

/// Clear the LCD
pub fn clear(config: &DriverConfig) -> CommandResult {
    with_keyboard(config, |keyboard| {
        keyboard.clear_display()?;
        println!("Display cleared");
        Ok(())
    })
}
