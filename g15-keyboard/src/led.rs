//! Backlight, contrast and LED command payloads
//!
//! All commands are HID SET_REPORT control transfers. The G110 uses its own
//! report numbers and payload shapes for the M-key LEDs and backlight colour.

use bitflags::bitflags;
use g15_transport::protocol::control;
use g15_transport::ControlRequest;

use crate::error::KeyboardError;

/// Three-step setting used by brightness, backlight and contrast
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Level {
    #[default]
    Off,
    Medium,
    Bright,
}

impl Level {
    pub fn as_u8(&self) -> u8 {
        match self {
            Level::Off => 0,
            Level::Medium => 1,
            Level::Bright => 2,
        }
    }
}

impl TryFrom<u8> for Level {
    type Error = KeyboardError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Level::Off),
            1 => Ok(Level::Medium),
            2 => Ok(Level::Bright),
            _ => Err(KeyboardError::InvalidParameter(format!(
                "level must be 0, 1 or 2, got {value}"
            ))),
        }
    }
}

bitflags! {
    /// M-key indicator LEDs
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct LedMask: u8 {
        const M1 = 0x01;
        const M2 = 0x02;
        const M3 = 0x04;
        const MR = 0x08;
    }
}

/// RGB color value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RgbColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl RgbColor {
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// A ready-to-send control transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlCommand {
    pub request: ControlRequest,
    pub payload: Vec<u8>,
}

impl ControlCommand {
    fn set_report(value: u16, index: u16, payload: Vec<u8>) -> Self {
        Self {
            request: ControlRequest {
                request_type: control::REQUEST_TYPE,
                request: control::SET_REPORT,
                value,
                index,
            },
            payload,
        }
    }
}

/// LCD contrast
pub fn contrast_command(level: Level) -> ControlCommand {
    let value = match level {
        Level::Off => 18,
        Level::Medium => 22,
        Level::Bright => 26,
    };
    ControlCommand::set_report(control::FEATURE_REPORT_2, 0, vec![2, 32, 129, value])
}

/// LCD backlight brightness
pub fn display_brightness_command(level: Level) -> ControlCommand {
    let value = match level {
        Level::Off => 0x00,
        Level::Medium => 0x10,
        Level::Bright => 0x20,
    };
    ControlCommand::set_report(control::FEATURE_REPORT_2, 0, vec![2, 2, value, 0])
}

/// Key backlight brightness
pub fn keyboard_backlight_command(level: Level) -> ControlCommand {
    ControlCommand::set_report(control::FEATURE_REPORT_2, 0, vec![2, 1, level.as_u8(), 0])
}

/// M-key LEDs; the G110 takes the mask as is, other models want it inverted
pub fn leds_command(leds: LedMask, g110: bool) -> ControlCommand {
    if g110 {
        ControlCommand::set_report(control::FEATURE_REPORT_3, 0, vec![3, leds.bits()])
    } else {
        ControlCommand::set_report(control::FEATURE_REPORT_2, 0, vec![2, 4, !leds.bits(), 0])
    }
}

/// G510 key backlight colour
pub fn rgb_command(color: RgbColor) -> ControlCommand {
    ControlCommand::set_report(
        control::FEATURE_REPORT_5,
        control::G510_RGB_INDEX,
        vec![4, color.r, color.g, color.b],
    )
}

/// G110 key backlight colour
///
/// `hue` runs from red (0x00) to blue (0xff); the hardware uses brightness
/// values 0x00 to 0x0e.
pub fn g110_color_command(hue: u8, brightness: u8) -> ControlCommand {
    ControlCommand::set_report(
        control::FEATURE_REPORT_7,
        0,
        vec![7, hue, 0, 0, brightness],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_conversion() {
        assert_eq!(Level::try_from(2).unwrap(), Level::Bright);
        assert_eq!(Level::Medium.as_u8(), 1);
        assert!(matches!(
            Level::try_from(3),
            Err(KeyboardError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_contrast_payloads() {
        let cmd = contrast_command(Level::Medium);
        assert_eq!(cmd.request.value, 0x302);
        assert_eq!(cmd.request.request_type, 0x21);
        assert_eq!(cmd.request.request, 0x09);
        assert_eq!(cmd.payload, vec![2, 32, 129, 22]);
        assert_eq!(contrast_command(Level::Off).payload[3], 18);
        assert_eq!(contrast_command(Level::Bright).payload[3], 26);
    }

    #[test]
    fn test_brightness_and_backlight_payloads() {
        assert_eq!(
            display_brightness_command(Level::Bright).payload,
            vec![2, 2, 0x20, 0]
        );
        assert_eq!(
            keyboard_backlight_command(Level::Medium).payload,
            vec![2, 1, 1, 0]
        );
    }

    #[test]
    fn test_led_payloads() {
        let leds = LedMask::M1 | LedMask::MR;
        let cmd = leds_command(leds, false);
        assert_eq!(cmd.request.value, 0x302);
        assert_eq!(cmd.payload, vec![2, 4, 0xF6, 0]);

        let cmd = leds_command(leds, true);
        assert_eq!(cmd.request.value, 0x303);
        assert_eq!(cmd.payload, vec![3, 0x09]);
    }

    #[test]
    fn test_rgb_payload() {
        let cmd = rgb_command(RgbColor::new(255, 128, 0));
        assert_eq!(cmd.request.value, 0x305);
        assert_eq!(cmd.request.index, 1);
        assert_eq!(cmd.payload, vec![4, 255, 128, 0]);
    }

    #[test]
    fn test_g110_color_payload() {
        let cmd = g110_color_command(0x4F, 200);
        assert_eq!(cmd.request.value, 0x307);
        assert_eq!(cmd.payload, vec![7, 0x4F, 0, 0, 200]);
    }
}
