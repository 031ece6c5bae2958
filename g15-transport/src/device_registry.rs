//! Device registry - the static table of supported keyboards
//!
//! Registry order is probe order: `UsbSession::open` tries each entry in turn
//! and the first one that opens wins.

use bitflags::bitflags;

/// Logitech vendor ID
pub const VENDOR_ID: u16 = 0x046d;

/// Interface number of the G510's boot keyboard function (never claimed)
pub const G510_STANDARD_KEYBOARD_INTERFACE: u8 = 0;

bitflags! {
    /// Capability flags of a supported device
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capabilities: u32 {
        /// Monochrome auxiliary display
        const DISPLAY          = 0b0000_0001;
        /// Macro keys (G/M/L keys)
        const KEYS             = 0b0000_0010;
        /// Another driver owns part of the device (e.g. audio)
        const SHARED           = 0b0000_0100;
        /// Key reports use the 5-byte layout
        const FIVE_BYTE_REPORT = 0b0000_1000;
        const MODEL_G13        = 0b0001_0000;
        const MODEL_G110       = 0b0010_0000;
        const MODEL_G510       = 0b0100_0000;
    }
}

impl Capabilities {
    #[inline]
    pub fn has_display(&self) -> bool {
        self.contains(Self::DISPLAY)
    }

    #[inline]
    pub fn has_keys(&self) -> bool {
        self.contains(Self::KEYS)
    }

    #[inline]
    pub fn is_shared(&self) -> bool {
        self.contains(Self::SHARED)
    }

    #[inline]
    pub fn uses_five_byte_report(&self) -> bool {
        self.contains(Self::FIVE_BYTE_REPORT)
    }

    #[inline]
    pub fn is_g13(&self) -> bool {
        self.contains(Self::MODEL_G13)
    }

    #[inline]
    pub fn is_g110(&self) -> bool {
        self.contains(Self::MODEL_G110)
    }

    #[inline]
    pub fn is_g510(&self) -> bool {
        self.contains(Self::MODEL_G510)
    }
}

/// Device definition with capabilities
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceModel {
    pub name: &'static str,
    pub vendor_id: u16,
    pub product_id: u16,
    pub capabilities: Capabilities,
}

impl DeviceModel {
    const fn new(
        name: &'static str,
        vendor_id: u16,
        product_id: u16,
        capabilities: Capabilities,
    ) -> Self {
        Self {
            name,
            vendor_id,
            product_id,
            capabilities,
        }
    }

    /// Check a VID/PID pair against this model
    #[inline]
    pub fn matches(&self, vendor_id: u16, product_id: u16) -> bool {
        self.vendor_id == vendor_id && self.product_id == product_id
    }
}

const LCD_KEYS: Capabilities = Capabilities::DISPLAY.union(Capabilities::KEYS);

/// All supported devices, in probe order
pub const SUPPORTED_DEVICES: &[DeviceModel] = &[
    DeviceModel::new("Logitech G15", VENDOR_ID, 0xc222, LCD_KEYS),
    DeviceModel::new("Logitech G11", VENDOR_ID, 0xc225, Capabilities::KEYS),
    DeviceModel::new(
        "Logitech Z-10",
        VENDOR_ID,
        0x0a07,
        LCD_KEYS.union(Capabilities::SHARED),
    ),
    DeviceModel::new(
        "Logitech G15 v2",
        VENDOR_ID,
        0xc227,
        LCD_KEYS.union(Capabilities::FIVE_BYTE_REPORT),
    ),
    DeviceModel::new(
        "Logitech Gamepanel",
        VENDOR_ID,
        0xc251,
        LCD_KEYS.union(Capabilities::SHARED),
    ),
    DeviceModel::new(
        "Logitech G13",
        VENDOR_ID,
        0xc21c,
        LCD_KEYS.union(Capabilities::MODEL_G13),
    ),
    DeviceModel::new(
        "Logitech G110",
        VENDOR_ID,
        0xc22b,
        Capabilities::KEYS.union(Capabilities::MODEL_G110),
    ),
    // Audio disabled
    DeviceModel::new(
        "Logitech G510",
        VENDOR_ID,
        0xc22d,
        LCD_KEYS
            .union(Capabilities::SHARED)
            .union(Capabilities::MODEL_G510),
    ),
    // Audio enabled
    DeviceModel::new(
        "Logitech G510",
        VENDOR_ID,
        0xc22e,
        LCD_KEYS
            .union(Capabilities::SHARED)
            .union(Capabilities::MODEL_G510),
    ),
];

/// Find device definition by VID/PID
pub fn lookup(vendor_id: u16, product_id: u16) -> Option<&'static DeviceModel> {
    SUPPORTED_DEVICES
        .iter()
        .find(|d| d.matches(vendor_id, product_id))
}

/// Number of registry entries matching a VID/PID pair
pub fn match_count(vendor_id: u16, product_id: u16) -> usize {
    SUPPORTED_DEVICES
        .iter()
        .filter(|d| d.matches(vendor_id, product_id))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_known_models() {
        let g15 = lookup(0x046d, 0xc222).unwrap();
        assert_eq!(g15.name, "Logitech G15");
        assert!(g15.capabilities.has_display());
        assert!(g15.capabilities.has_keys());
        assert!(!g15.capabilities.is_shared());

        let g11 = lookup(0x046d, 0xc225).unwrap();
        assert!(!g11.capabilities.has_display());
    }

    #[test]
    fn test_shared_devices() {
        for pid in [0x0a07, 0xc251, 0xc22d, 0xc22e] {
            assert!(lookup(VENDOR_ID, pid).unwrap().capabilities.is_shared());
        }
        assert!(!lookup(VENDOR_ID, 0xc21c).unwrap().capabilities.is_shared());
    }

    #[test]
    fn test_model_flags() {
        assert!(lookup(VENDOR_ID, 0xc227).unwrap().capabilities.uses_five_byte_report());
        assert!(lookup(VENDOR_ID, 0xc21c).unwrap().capabilities.is_g13());
        assert!(lookup(VENDOR_ID, 0xc22b).unwrap().capabilities.is_g110());
        assert!(lookup(VENDOR_ID, 0xc22e).unwrap().capabilities.is_g510());
    }

    #[test]
    fn test_unknown_device() {
        assert!(lookup(0x3151, 0x5030).is_none());
        assert_eq!(match_count(VENDOR_ID, 0x0000), 0);
    }

    #[test]
    fn test_every_model_matches_one_entry() {
        for model in SUPPORTED_DEVICES {
            assert_eq!(match_count(model.vendor_id, model.product_id), 1);
        }
    }

    #[test]
    fn test_probe_order_starts_with_g15() {
        assert_eq!(SUPPORTED_DEVICES[0].product_id, 0xc222);
        assert_eq!(SUPPORTED_DEVICES.len(), 9);
    }
}
