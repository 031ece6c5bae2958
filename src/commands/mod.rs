//! Command handlers for the CLI application.
//!
//! This module organizes command handlers by category:
//! - `query`: Read-only commands (list, info)
//! - `set`: Setting commands (brightness, backlight, contrast, leds, colours)
//! - `display`: LCD commands (draw, clear)
//! - `keys`: Macro key monitor

pub mod display;
pub mod keys;
pub mod query;
pub mod set;

use anyhow::Context;
use g15_driver::keyboard::{Keyboard, KeyboardError, RusbBackend, TransportError};
use g15_driver::DriverConfig;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result type for command handlers
pub type CommandResult = anyhow::Result<()>;

/// Open the first supported keyboard
pub fn open_keyboard(config: &DriverConfig) -> anyhow::Result<Keyboard<RusbBackend>> {
    let keyboard = Keyboard::with_libusb(config.session.clone())?;
    let model = keyboard
        .open()
        .context("Cannot open a supported keyboard")?;
    info!("Using {}", model.name);
    Ok(keyboard)
}

/// Open a keyboard, run a closure with it and close it again
pub fn with_keyboard<F>(config: &DriverConfig, f: F) -> CommandResult
where
    F: FnOnce(&Keyboard<RusbBackend>) -> CommandResult,
{
    let keyboard = open_keyboard(config)?;
    let result = f(&keyboard);
    close_keyboard(&keyboard);
    result
}

/// Close the session, tolerating one that was already torn down
pub fn close_keyboard(keyboard: &Keyboard<RusbBackend>) {
    match keyboard.close() {
        Ok(()) => {}
        Err(KeyboardError::Transport(TransportError::NotOpen)) => {
            debug!("Session already closed")
        }
        Err(e) => warn!("Closing keyboard failed: {e}"),
    }
}

/// Set up a Ctrl-C handler that sets the given flag to false when triggered.
/// Returns the Arc<AtomicBool> for use in the main loop.
pub fn setup_interrupt_handler() -> Arc<AtomicBool> {
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);

    if let Err(e) = ctrlc::set_handler(move || {
        running_clone.store(false, Ordering::SeqCst);
    }) {
        eprintln!("Warning: Could not set Ctrl+C handler: {e}");
    }

    running
}
