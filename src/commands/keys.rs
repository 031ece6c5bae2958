//! Macro key monitor.

use super::{close_keyboard, open_keyboard, setup_interrupt_handler, CommandResult};
use anyhow::bail;
use g15_driver::keyboard::{KeyState, KeyboardError};
use g15_driver::DriverConfig;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// Wait between reopen attempts after the device went away
const REOPEN_INTERVAL: Duration = Duration::from_secs(1);

/// Print key presses and releases until Ctrl-C
pub fn watch(config: &DriverConfig, timeout_ms: Option<u64>) -> CommandResult {
    let keyboard = open_keyboard(config)?;
    let caps = keyboard.capabilities()?;
    if !caps.has_keys() {
        bail!("This device has no macro keys");
    }

    let timeout = timeout_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| config.poll_timeout());
    let running = setup_interrupt_handler();
    let mut held = KeyState::empty();

    println!("Watching keys (Ctrl+C to stop)");
    while running.load(Ordering::SeqCst) {
        match keyboard.poll_keys(timeout) {
            Ok(Some(keys)) => {
                let pressed = keys.pressed_since(held);
                let released = keys.released_since(held);
                if !pressed.is_empty() {
                    println!("down  {pressed}");
                }
                if !released.is_empty() {
                    println!("up    {released}");
                }
                held = keys;
            }
            Ok(None) | Err(KeyboardError::TryAgain) => {}
            Err(e) if e.is_device_gone() => {
                warn!("Keyboard went away, waiting for it to come back");
                held = KeyState::empty();
                while running.load(Ordering::SeqCst) {
                    match keyboard.reopen() {
                        Ok(model) => {
                            println!("Reconnected to {}", model.name);
                            break;
                        }
                        Err(e) => {
                            debug!("Reopen failed: {e}");
                            thread::sleep(REOPEN_INTERVAL);
                        }
                    }
                }
            }
            Err(e) if e.is_retryable() => debug!("{e}"),
            Err(e) => {
                close_keyboard(&keyboard);
                return Err(e.into());
            }
        }
    }

    close_keyboard(&keyboard);
    Ok(())
}
