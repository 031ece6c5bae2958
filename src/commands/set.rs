//! Set (write) command handlers.

use super::{with_keyboard, CommandResult};
use g15_driver::keyboard::{LedMask, Level, RgbColor};
use g15_driver::DriverConfig;

/// Set LCD backlight brightness
pub fn brightness(config: &DriverConfig, level: u8) -> CommandResult {
    let level = Level::try_from(level)?;
    with_keyboard(config, |keyboard| {
        keyboard.set_display_brightness(level)?;
        println!("LCD brightness set to {}", level.as_u8());
        Ok(())
    })
}

/// Set key backlight brightness
pub fn backlight(config: &DriverConfig, level: u8) -> CommandResult {
    let level = Level::try_from(level)?;
    with_keyboard(config, |keyboard| {
        keyboard.set_keyboard_backlight(level)?;
        println!("Key backlight set to {}", level.as_u8());
        Ok(())
    })
}

/// Set LCD contrast
pub fn contrast(config: &DriverConfig, level: u8) -> CommandResult {
    let level = Level::try_from(level)?;
    with_keyboard(config, |keyboard| {
        keyboard.set_display_contrast(level)?;
        println!("LCD contrast set to {}", level.as_u8());
        Ok(())
    })
}

/// Set M-key LEDs
pub fn leds(config: &DriverConfig, mask: u8) -> CommandResult {
    let leds = LedMask::from_bits_retain(mask);
    with_keyboard(config, |keyboard| {
        keyboard.set_leds(leds)?;
        println!("LEDs set to {leds:?}");
        Ok(())
    })
}

/// Set G510 RGB backlight
pub fn color(config: &DriverConfig, r: u8, g: u8, b: u8) -> CommandResult {
    with_keyboard(config, |keyboard| {
        keyboard.set_rgb_color(RgbColor::new(r, g, b))?;
        println!("Backlight colour set to #{r:02x}{g:02x}{b:02x}");
        Ok(())
    })
}

/// Set G110 backlight colour
pub fn g110_color(config: &DriverConfig, hue: u8, brightness: u8) -> CommandResult {
    with_keyboard(config, |keyboard| {
        keyboard.set_g110_color(hue, brightness)?;
        println!("Backlight hue {hue}, brightness {brightness}");
        Ok(())
    })
}
