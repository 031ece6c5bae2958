//! libusb backend via rusb

use std::time::Duration;

use rusb::UsbContext;

use crate::error::{TransportError, UsbStatus};
use crate::types::{
    AltSetting, ConfigDescriptor, ControlRequest, DeviceDescriptor, EndpointDescriptor,
    InterfaceDescriptor,
};
use crate::{UsbBackend, UsbDevice, UsbHandle};

/// Backend backed by a private libusb context
pub struct RusbBackend {
    context: rusb::Context,
}

impl RusbBackend {
    pub fn new() -> Result<Self, TransportError> {
        let context = rusb::Context::new().map_err(|e| TransportError::Backend(e.into()))?;
        Ok(Self { context })
    }
}

impl UsbBackend for RusbBackend {
    type Device = RusbDevice;
    type Handle = RusbHandle;

    fn devices(&self) -> Result<Vec<RusbDevice>, UsbStatus> {
        let list = self.context.devices()?;
        Ok(list.iter().map(|device| RusbDevice { device }).collect())
    }
}

/// Enumerated libusb device
pub struct RusbDevice {
    device: rusb::Device<rusb::Context>,
}

impl UsbDevice for RusbDevice {
    type Handle = RusbHandle;

    fn descriptor(&self) -> Result<DeviceDescriptor, UsbStatus> {
        let desc = self.device.device_descriptor()?;
        Ok(DeviceDescriptor {
            vendor_id: desc.vendor_id(),
            product_id: desc.product_id(),
            num_configurations: desc.num_configurations(),
        })
    }

    fn config_descriptor(&self, index: u8) -> Result<ConfigDescriptor, UsbStatus> {
        let config = self.device.config_descriptor(index)?;
        let interfaces = config
            .interfaces()
            .map(|interface| InterfaceDescriptor {
                number: interface.number(),
                alt_settings: interface
                    .descriptors()
                    .map(|alt| AltSetting {
                        setting: alt.setting_number(),
                        class_code: alt.class_code(),
                        endpoints: alt
                            .endpoint_descriptors()
                            .map(|ep| EndpointDescriptor {
                                address: ep.address(),
                                max_packet_size: ep.max_packet_size(),
                            })
                            .collect(),
                    })
                    .collect(),
            })
            .collect();
        Ok(ConfigDescriptor {
            number: config.number(),
            interfaces,
        })
    }

    fn open(&self) -> Result<RusbHandle, UsbStatus> {
        let handle = self.device.open()?;
        Ok(RusbHandle { handle })
    }
}

/// Opened libusb device; libusb closes it on drop
pub struct RusbHandle {
    handle: rusb::DeviceHandle<rusb::Context>,
}

impl UsbHandle for RusbHandle {
    fn kernel_driver_active(&self, interface: u8) -> Result<bool, UsbStatus> {
        Ok(self.handle.kernel_driver_active(interface)?)
    }

    fn detach_kernel_driver(&mut self, interface: u8) -> Result<(), UsbStatus> {
        Ok(self.handle.detach_kernel_driver(interface)?)
    }

    fn attach_kernel_driver(&mut self, interface: u8) -> Result<(), UsbStatus> {
        Ok(self.handle.attach_kernel_driver(interface)?)
    }

    fn set_active_configuration(&mut self, config: u8) -> Result<(), UsbStatus> {
        Ok(self.handle.set_active_configuration(config)?)
    }

    fn claim_interface(&mut self, interface: u8) -> Result<(), UsbStatus> {
        Ok(self.handle.claim_interface(interface)?)
    }

    fn release_interface(&mut self, interface: u8) -> Result<(), UsbStatus> {
        Ok(self.handle.release_interface(interface)?)
    }

    fn read_interrupt(
        &self,
        endpoint: u8,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<usize, UsbStatus> {
        Ok(self.handle.read_interrupt(endpoint, buf, timeout)?)
    }

    fn write_interrupt(
        &self,
        endpoint: u8,
        data: &[u8],
        timeout: Duration,
    ) -> Result<usize, UsbStatus> {
        Ok(self.handle.write_interrupt(endpoint, data, timeout)?)
    }

    fn write_control(
        &self,
        request: ControlRequest,
        data: &[u8],
        timeout: Duration,
    ) -> Result<usize, UsbStatus> {
        Ok(self.handle.write_control(
            request.request_type,
            request.request,
            request.value,
            request.index,
            data,
            timeout,
        )?)
    }

    fn reset(&mut self) -> Result<(), UsbStatus> {
        Ok(self.handle.reset()?)
    }

    fn clear_halt(&mut self, endpoint: u8) -> Result<(), UsbStatus> {
        Ok(self.handle.clear_halt(endpoint)?)
    }
}
