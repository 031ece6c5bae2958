//! USB transport layer for Logitech G-series keyboards with auxiliary displays
//!
//! This crate owns everything between the USB stack and the keyboard protocol:
//!
//! - the static registry of supported models and their capabilities
//! - `UsbSession`: open/claim/close and serialized transfers
//! - fault classification and recovery (stall, disconnect, bus saturation)
//!
//! The USB stack sits behind the [`UsbBackend`] trait. [`RusbBackend`] talks
//! to libusb; the `mock` feature provides a scriptable in-memory backend.

pub mod config;
pub mod device_registry;
pub mod error;
pub mod protocol;
pub mod recovery;
pub mod types;

mod rusb_backend;
mod session;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use config::SessionConfig;
pub use device_registry::{lookup, Capabilities, DeviceModel, SUPPORTED_DEVICES, VENDOR_ID};
pub use error::{TransientKind, TransportError, TransportFault, UsbStatus};
pub use recovery::{recover, Recovery, RecoveryTarget};
pub use rusb_backend::{RusbBackend, RusbDevice, RusbHandle};
pub use session::{SessionInfo, UsbSession};
pub use types::{
    AltSetting, ConfigDescriptor, ControlRequest, DeviceDescriptor, EndpointDescriptor,
    InterfaceDescriptor,
};

use std::time::Duration;

/// Entry point into a USB stack
pub trait UsbBackend: Send + Sync {
    type Device: UsbDevice<Handle = Self::Handle>;
    type Handle: UsbHandle;

    /// Enumerate every device currently on the bus
    fn devices(&self) -> Result<Vec<Self::Device>, UsbStatus>;
}

/// An enumerated, not yet opened device
pub trait UsbDevice {
    type Handle: UsbHandle;

    fn descriptor(&self) -> Result<DeviceDescriptor, UsbStatus>;

    /// Configuration descriptor by index (not by configuration value)
    fn config_descriptor(&self, index: u8) -> Result<ConfigDescriptor, UsbStatus>;

    fn open(&self) -> Result<Self::Handle, UsbStatus>;
}

/// An opened device. Dropping the handle closes it.
pub trait UsbHandle: Send {
    fn kernel_driver_active(&self, interface: u8) -> Result<bool, UsbStatus>;
    fn detach_kernel_driver(&mut self, interface: u8) -> Result<(), UsbStatus>;
    fn attach_kernel_driver(&mut self, interface: u8) -> Result<(), UsbStatus>;
    fn set_active_configuration(&mut self, config: u8) -> Result<(), UsbStatus>;
    fn claim_interface(&mut self, interface: u8) -> Result<(), UsbStatus>;
    fn release_interface(&mut self, interface: u8) -> Result<(), UsbStatus>;

    /// Interrupt IN transfer, returns bytes read
    fn read_interrupt(
        &self,
        endpoint: u8,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<usize, UsbStatus>;

    /// Interrupt OUT transfer, returns bytes written
    fn write_interrupt(
        &self,
        endpoint: u8,
        data: &[u8],
        timeout: Duration,
    ) -> Result<usize, UsbStatus>;

    /// Host-to-device control transfer, returns bytes written
    fn write_control(
        &self,
        request: ControlRequest,
        data: &[u8],
        timeout: Duration,
    ) -> Result<usize, UsbStatus>;

    fn reset(&mut self) -> Result<(), UsbStatus>;
    fn clear_halt(&mut self, endpoint: u8) -> Result<(), UsbStatus>;
}
