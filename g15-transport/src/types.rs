//! Common types for the transport layer
//!
//! Descriptor snapshots are plain owned data so the session logic does not
//! depend on any particular USB stack.

/// USB interface class code for HID
pub const CLASS_HID: u8 = 0x03;

/// Direction bit of an endpoint address (set = device-to-host)
pub const ENDPOINT_DIR_IN: u8 = 0x80;

/// Configuration value selected on non-shared devices
pub const DEFAULT_CONFIGURATION: u8 = 1;

/// Device descriptor fields the session needs for matching and probing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceDescriptor {
    /// USB Vendor ID
    pub vendor_id: u16,
    /// USB Product ID
    pub product_id: u16,
    /// Number of configurations the device reports
    pub num_configurations: u8,
}

/// One configuration of a device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigDescriptor {
    /// bConfigurationValue
    pub number: u8,
    /// Interfaces in descriptor order
    pub interfaces: Vec<InterfaceDescriptor>,
}

/// One interface and all of its alternate settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceDescriptor {
    /// bInterfaceNumber
    pub number: u8,
    /// Alternate settings in descriptor order
    pub alt_settings: Vec<AltSetting>,
}

/// An alternate setting of an interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AltSetting {
    /// bAlternateSetting
    pub setting: u8,
    /// bInterfaceClass
    pub class_code: u8,
    /// Endpoints of this alternate setting
    pub endpoints: Vec<EndpointDescriptor>,
}

impl AltSetting {
    /// Check if this alternate setting belongs to a HID function
    pub fn is_hid(&self) -> bool {
        self.class_code == CLASS_HID
    }
}

/// Endpoint descriptor fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointDescriptor {
    /// bEndpointAddress (bit 7 = direction)
    pub address: u8,
    /// wMaxPacketSize
    pub max_packet_size: u16,
}

impl EndpointDescriptor {
    /// Device-to-host endpoint (key reports)
    #[inline]
    pub fn is_in(&self) -> bool {
        self.address & ENDPOINT_DIR_IN != 0
    }

    /// Endpoint number without the direction bit
    #[inline]
    pub fn number(&self) -> u8 {
        self.address & 0x0F
    }
}

/// Setup fields of a host-to-device control transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlRequest {
    /// bmRequestType
    pub request_type: u8,
    /// bRequest
    pub request: u8,
    /// wValue (command code)
    pub value: u16,
    /// wIndex
    pub index: u16,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_direction() {
        let keys = EndpointDescriptor {
            address: 0x81,
            max_packet_size: 8,
        };
        let lcd = EndpointDescriptor {
            address: 0x02,
            max_packet_size: 32,
        };
        assert!(keys.is_in());
        assert_eq!(keys.number(), 1);
        assert!(!lcd.is_in());
        assert_eq!(lcd.number(), 2);
    }
}
