//! Query (read-only) command handlers.

use super::{with_keyboard, CommandResult};
use g15_driver::keyboard::{Keyboard, RusbBackend};
use g15_driver::transport::{Capabilities, SUPPORTED_DEVICES};
use g15_driver::DriverConfig;

/// List supported models and count the connected ones
pub fn list(config: &DriverConfig) -> CommandResult {
    println!("Supported devices (probe order):");
    for model in SUPPORTED_DEVICES {
        println!(
            "  {:04x}:{:04x}  {:<20} {}",
            model.vendor_id,
            model.product_id,
            model.name,
            describe_capabilities(model.capabilities)
        );
    }

    let keyboard = Keyboard::<RusbBackend>::with_libusb(config.session.clone())?;
    println!("Connected: {}", keyboard.connected_device_count()?);
    Ok(())
}

/// Show the open device
pub fn info(config: &DriverConfig) -> CommandResult {
    with_keyboard(config, |keyboard| {
        let Some(info) = keyboard.session().info() else {
            println!("No device open");
            return Ok(());
        };
        println!(
            "Device:       {} ({:04x}:{:04x})",
            info.model.name, info.model.vendor_id, info.model.product_id
        );
        println!(
            "Capabilities: {}",
            describe_capabilities(info.model.capabilities)
        );
        println!("Interfaces:   {:?}", info.interfaces);
        println!("Keys EP:      {}", format_endpoint(info.keys_endpoint));
        println!("Display EP:   {}", format_endpoint(info.display_endpoint));
        if info.shared {
            println!("Shared:       yes (backlight, contrast and LED settings unavailable)");
        }
        Ok(())
    })
}

fn format_endpoint(endpoint: Option<u8>) -> String {
    endpoint
        .map(|ep| format!("{ep:#04x}"))
        .unwrap_or_else(|| "-".to_string())
}

fn describe_capabilities(caps: Capabilities) -> String {
    let mut parts = Vec::new();
    if caps.has_display() {
        parts.push("lcd");
    }
    if caps.has_keys() {
        parts.push("keys");
    }
    if caps.is_shared() {
        parts.push("shared");
    }
    if caps.uses_five_byte_report() {
        parts.push("5-byte-report");
    }
    if caps.is_g13() {
        parts.push("g13");
    }
    if caps.is_g110() {
        parts.push("g110");
    }
    if caps.is_g510() {
        parts.push("g510");
    }
    parts.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_capabilities() {
        let caps = Capabilities::DISPLAY | Capabilities::KEYS | Capabilities::SHARED;
        assert_eq!(describe_capabilities(caps), "lcd, keys, shared");
        assert_eq!(describe_capabilities(Capabilities::empty()), "");
    }

    #[test]
    fn test_format_endpoint() {
        assert_eq!(format_endpoint(Some(0x81)), "0x81");
        assert_eq!(format_endpoint(None), "-");
    }
}
