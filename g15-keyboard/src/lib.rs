//! High-level interface for Logitech G-series keyboards
//!
//! [`Keyboard`] owns a [`UsbSession`] and exposes the device features:
//! the LCD, key polling, backlight, contrast and indicator LEDs.
//!
//! Settings that go through control transfers are refused on devices shared
//! with another driver (Z-10, Gamepanel, G510), since they would interfere
//! with the co-owning driver.

pub mod display;
pub mod error;
pub mod keys;
pub mod led;

use std::time::Duration;

use tracing::{debug, info};

pub use display::{decode, encode, DisplayFrame, LcdBuffer, LCD_HEIGHT, LCD_WIDTH};
pub use error::KeyboardError;
pub use keys::{decode_report, KeyReport, KeyState, ReportLayout, KEY_READ_LENGTH};
pub use led::{ControlCommand, LedMask, Level, RgbColor};

pub use g15_transport::{
    Capabilities, DeviceModel, RusbBackend, SessionConfig, SessionInfo, TransportError,
    UsbBackend, UsbSession,
};

/// A Logitech keyboard with (optionally) an LCD
pub struct Keyboard<B: UsbBackend> {
    session: UsbSession<B>,
}

impl Keyboard<RusbBackend> {
    /// Keyboard on the system libusb, not yet opened
    pub fn with_libusb(config: SessionConfig) -> Result<Self, KeyboardError> {
        Ok(Self::new(RusbBackend::new()?, config))
    }
}

impl<B: UsbBackend> Keyboard<B> {
    pub fn new(backend: B, config: SessionConfig) -> Self {
        Self {
            session: UsbSession::new(backend, config),
        }
    }

    pub fn session(&self) -> &UsbSession<B> {
        &self.session
    }

    /// Open the first supported device
    pub fn open(&self) -> Result<&'static DeviceModel, KeyboardError> {
        Ok(self.session.open()?)
    }

    pub fn close(&self) -> Result<(), KeyboardError> {
        Ok(self.session.close()?)
    }

    /// Close if open, then open again (after `DeviceGone`)
    pub fn reopen(&self) -> Result<&'static DeviceModel, KeyboardError> {
        if self.session.is_open() {
            self.session.close()?;
        }
        info!("Reopening keyboard session");
        self.open()
    }

    pub fn is_open(&self) -> bool {
        self.session.is_open()
    }

    pub fn model(&self) -> Option<&'static DeviceModel> {
        self.session.model()
    }

    /// Capabilities of the open device
    pub fn capabilities(&self) -> Result<Capabilities, KeyboardError> {
        self.session
            .capabilities()
            .ok_or(KeyboardError::Transport(TransportError::NotOpen))
    }

    /// Number of supported devices on the bus
    pub fn connected_device_count(&self) -> Result<usize, KeyboardError> {
        Ok(self.session.connected_device_count()?)
    }

    pub fn set_display_brightness(&self, level: Level) -> Result<(), KeyboardError> {
        self.require_exclusive("display brightness")?;
        self.send(led::display_brightness_command(level))
    }

    pub fn set_keyboard_backlight(&self, level: Level) -> Result<(), KeyboardError> {
        self.require_exclusive("keyboard backlight")?;
        self.send(led::keyboard_backlight_command(level))
    }

    pub fn set_display_contrast(&self, level: Level) -> Result<(), KeyboardError> {
        self.require_exclusive("display contrast")?;
        self.send(led::contrast_command(level))
    }

    /// Set the M-key indicator LEDs
    pub fn set_leds(&self, leds: LedMask) -> Result<(), KeyboardError> {
        let caps = self.require_exclusive("M-key LEDs")?;
        self.send(led::leds_command(leds, caps.is_g110()))
    }

    /// Set the RGB key backlight (G510)
    pub fn set_rgb_color(&self, color: RgbColor) -> Result<(), KeyboardError> {
        let caps = self.require_exclusive("RGB backlight")?;
        if !caps.is_g510() {
            return Err(KeyboardError::Unsupported(
                "RGB backlight is only available on the G510".to_string(),
            ));
        }
        self.send(led::rgb_command(color))
    }

    /// Set the key backlight colour (G110)
    pub fn set_g110_color(&self, hue: u8, brightness: u8) -> Result<(), KeyboardError> {
        let caps = self.require_exclusive("backlight colour")?;
        if !caps.is_g110() {
            return Err(KeyboardError::Unsupported(
                "backlight colour is only available on the G110".to_string(),
            ));
        }
        self.send(led::g110_color_command(hue, brightness))
    }

    /// Show a frame on the LCD
    ///
    /// If the bus runs out of bandwidth during a full-buffer write, the
    /// session switches to chunked writes and the frame is sent again once.
    pub fn write_display(&self, frame: &DisplayFrame) -> Result<(), KeyboardError> {
        let caps = self.capabilities()?;
        if !caps.has_display() {
            return Err(KeyboardError::Unsupported("device has no display".to_string()));
        }
        let endpoint = self
            .session
            .display_endpoint()
            .ok_or(TransportError::NoEndpoint("display"))?;
        let buffer = display::encode(frame);

        if self.session.in_slowdown() {
            self.session.write_chunked(endpoint, buffer.as_bytes())?;
            return Ok(());
        }
        match self.session.write(endpoint, buffer.as_bytes()) {
            Ok(_) => Ok(()),
            Err(TransportError::BusSaturated) => {
                debug!("Resending frame in chunks");
                self.session.write_chunked(endpoint, buffer.as_bytes())?;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Turn every pixel off
    pub fn clear_display(&self) -> Result<(), KeyboardError> {
        self.write_display(&DisplayFrame::blank())
    }

    /// Wait up to `timeout` for a key report
    ///
    /// Returns the complete set of held keys, or `None` when the read carried
    /// no recognisable report. `KeyboardError::TryAgain` means the device had
    /// nothing to send yet.
    pub fn poll_keys(&self, timeout: Duration) -> Result<Option<KeyState>, KeyboardError> {
        let caps = self.capabilities()?;
        let endpoint = self
            .session
            .keys_endpoint()
            .ok_or(TransportError::NoEndpoint("keys"))?;

        let report = match self.session.read(endpoint, KEY_READ_LENGTH, timeout) {
            Ok(report) => report,
            Err(TransportError::BusSaturated) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match decode_report(&report, caps) {
            KeyReport::Keys(keys) => Ok(Some(keys)),
            KeyReport::NoChange => Ok(None),
            KeyReport::TryAgain => Err(KeyboardError::TryAgain),
        }
    }

    fn require_exclusive(&self, feature: &str) -> Result<Capabilities, KeyboardError> {
        let caps = self.capabilities()?;
        if caps.is_shared() {
            return Err(KeyboardError::Unsupported(format!(
                "{feature} is not available on a device shared with another driver"
            )));
        }
        Ok(caps)
    }

    fn send(&self, command: ControlCommand) -> Result<(), KeyboardError> {
        debug!(
            "Control write {:#05x}: {:02x?}",
            command.request.value, command.payload
        );
        self.session
            .control_write(command.request, &command.payload)?;
        Ok(())
    }
}
