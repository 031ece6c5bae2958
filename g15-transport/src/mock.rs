//! Scriptable in-memory USB backend
//!
//! Every handle operation is recorded as a [`MockCall`]. Transfer results are
//! popped from per-kind queues; an empty queue means success (reads time out).
//! Clones share state, so a test keeps one clone to inspect what a session did
//! with the other.
//!
//! Transfers, resets and halt clears are also counted while in flight, so a
//! test can check that a session never overlaps two of them.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::UsbStatus;
use crate::types::{
    AltSetting, ConfigDescriptor, ControlRequest, DeviceDescriptor, EndpointDescriptor,
    InterfaceDescriptor, CLASS_HID,
};
use crate::{UsbBackend, UsbDevice, UsbHandle};

/// One recorded backend operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    Open { vendor_id: u16, product_id: u16 },
    DetachKernelDriver(u8),
    AttachKernelDriver(u8),
    SetConfiguration(u8),
    ClaimInterface(u8),
    ReleaseInterface(u8),
    ReadInterrupt { endpoint: u8 },
    WriteInterrupt { endpoint: u8, data: Vec<u8> },
    WriteControl { request: ControlRequest, data: Vec<u8> },
    Reset,
    ClearHalt(u8),
    Close,
}

/// Shape and behaviour of one simulated device
#[derive(Debug, Clone)]
pub struct MockDeviceSpec {
    pub descriptor: DeviceDescriptor,
    /// Indexed by configuration index; `Err` makes the descriptor unreadable
    pub configs: Vec<Result<ConfigDescriptor, UsbStatus>>,
    pub kernel_driver_active: bool,
    pub open_error: Option<UsbStatus>,
    /// Claims that fail with `Busy` before one succeeds
    pub claim_failures: u32,
}

impl MockDeviceSpec {
    /// Device with one configuration and one HID interface (keys 0x81, display 0x02)
    pub fn new(vendor_id: u16, product_id: u16) -> Self {
        Self {
            descriptor: DeviceDescriptor {
                vendor_id,
                product_id,
                num_configurations: 1,
            },
            configs: vec![Ok(ConfigDescriptor {
                number: 1,
                interfaces: vec![Self::hid_interface(0, &[0x81, 0x02])],
            })],
            kernel_driver_active: false,
            open_error: None,
            claim_failures: 0,
        }
    }

    /// HID interface with a single alternate setting
    pub fn hid_interface(number: u8, endpoints: &[u8]) -> InterfaceDescriptor {
        Self::interface(number, CLASS_HID, endpoints)
    }

    /// Interface of an arbitrary class with a single alternate setting
    pub fn interface(number: u8, class_code: u8, endpoints: &[u8]) -> InterfaceDescriptor {
        InterfaceDescriptor {
            number,
            alt_settings: vec![AltSetting {
                setting: 0,
                class_code,
                endpoints: endpoints
                    .iter()
                    .map(|&address| EndpointDescriptor {
                        address,
                        max_packet_size: 32,
                    })
                    .collect(),
            }],
        }
    }

    /// Replace the interfaces of the first configuration
    pub fn with_interfaces(mut self, interfaces: Vec<InterfaceDescriptor>) -> Self {
        self.configs = vec![Ok(ConfigDescriptor {
            number: 1,
            interfaces,
        })];
        self.descriptor.num_configurations = 1;
        self
    }

    /// Replace all configurations
    pub fn with_configs(mut self, configs: Vec<Result<ConfigDescriptor, UsbStatus>>) -> Self {
        self.descriptor.num_configurations = configs.len() as u8;
        self.configs = configs;
        self
    }

    pub fn with_kernel_driver(mut self) -> Self {
        self.kernel_driver_active = true;
        self
    }

    pub fn failing_open(mut self, status: UsbStatus) -> Self {
        self.open_error = Some(status);
        self
    }

    pub fn failing_claims(mut self, count: u32) -> Self {
        self.claim_failures = count;
        self
    }
}

#[derive(Default)]
struct MockState {
    calls: Vec<MockCall>,
    reads: VecDeque<Result<Vec<u8>, UsbStatus>>,
    writes: VecDeque<Result<usize, UsbStatus>>,
    controls: VecDeque<Result<usize, UsbStatus>>,
    resets: VecDeque<Result<(), UsbStatus>>,
    configurations: VecDeque<Result<(), UsbStatus>>,
    transfer_delay: Duration,
}

/// Handle operations currently executing, and the most ever seen at once
#[derive(Default)]
struct Traffic {
    current: AtomicUsize,
    peak: AtomicUsize,
}

/// Marks one handle operation as in flight until dropped
struct InFlight<'a>(&'a Traffic);

impl<'a> InFlight<'a> {
    fn begin(traffic: &'a Traffic, delay: Duration) -> Self {
        let now = traffic.current.fetch_add(1, Ordering::SeqCst) + 1;
        traffic.peak.fetch_max(now, Ordering::SeqCst);
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        Self(traffic)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.current.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MockState {
    fn record(&mut self, call: MockCall) {
        self.calls.push(call);
    }
}

/// In-memory backend
#[derive(Clone, Default)]
pub struct MockBackend {
    devices: Arc<Mutex<Vec<MockDeviceSpec>>>,
    state: Arc<Mutex<MockState>>,
    traffic: Arc<Traffic>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a simulated device to the bus
    pub fn with_device(self, spec: MockDeviceSpec) -> Self {
        self.devices.lock().push(spec);
        self
    }

    /// Make every handle operation take `delay` before it completes
    pub fn with_transfer_delay(self, delay: Duration) -> Self {
        self.state.lock().transfer_delay = delay;
        self
    }

    /// Most handle operations that were ever in flight at the same time
    pub fn peak_in_flight(&self) -> usize {
        self.traffic.peak.load(Ordering::SeqCst)
    }

    /// Remove every simulated device from the bus
    pub fn unplug_all(&self) {
        self.devices.lock().clear();
    }

    /// Script the next interrupt read
    pub fn push_read(&self, result: Result<Vec<u8>, UsbStatus>) {
        self.state.lock().reads.push_back(result);
    }

    /// Script the next interrupt write (Ok = bytes reported written)
    pub fn push_write(&self, result: Result<usize, UsbStatus>) {
        self.state.lock().writes.push_back(result);
    }

    /// Script the next control transfer
    pub fn push_control(&self, result: Result<usize, UsbStatus>) {
        self.state.lock().controls.push_back(result);
    }

    /// Script the next device reset
    pub fn push_reset(&self, result: Result<(), UsbStatus>) {
        self.state.lock().resets.push_back(result);
    }

    /// Script the next set-configuration request
    pub fn push_set_configuration(&self, result: Result<(), UsbStatus>) {
        self.state.lock().configurations.push_back(result);
    }

    /// All calls recorded so far
    pub fn calls(&self) -> Vec<MockCall> {
        self.state.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    /// Number of recorded calls matching a predicate
    pub fn count_calls(&self, pred: impl Fn(&MockCall) -> bool) -> usize {
        self.state.lock().calls.iter().filter(|c| pred(c)).count()
    }

    /// Payloads of all interrupt writes, in order
    pub fn written(&self) -> Vec<Vec<u8>> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                MockCall::WriteInterrupt { data, .. } => Some(data.clone()),
                _ => None,
            })
            .collect()
    }

    /// Requests and payloads of all control transfers, in order
    pub fn control_transfers(&self) -> Vec<(ControlRequest, Vec<u8>)> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                MockCall::WriteControl { request, data } => Some((*request, data.clone())),
                _ => None,
            })
            .collect()
    }
}

impl UsbBackend for MockBackend {
    type Device = MockDevice;
    type Handle = MockHandle;

    fn devices(&self) -> Result<Vec<MockDevice>, UsbStatus> {
        Ok(self
            .devices
            .lock()
            .iter()
            .cloned()
            .map(|spec| MockDevice {
                spec,
                state: Arc::clone(&self.state),
                traffic: Arc::clone(&self.traffic),
            })
            .collect())
    }
}

/// Enumerated simulated device
pub struct MockDevice {
    spec: MockDeviceSpec,
    state: Arc<Mutex<MockState>>,
    traffic: Arc<Traffic>,
}

impl UsbDevice for MockDevice {
    type Handle = MockHandle;

    fn descriptor(&self) -> Result<DeviceDescriptor, UsbStatus> {
        Ok(self.spec.descriptor)
    }

    fn config_descriptor(&self, index: u8) -> Result<ConfigDescriptor, UsbStatus> {
        self.spec
            .configs
            .get(index as usize)
            .cloned()
            .unwrap_or(Err(UsbStatus::NotFound))
    }

    fn open(&self) -> Result<MockHandle, UsbStatus> {
        self.state.lock().record(MockCall::Open {
            vendor_id: self.spec.descriptor.vendor_id,
            product_id: self.spec.descriptor.product_id,
        });
        if let Some(status) = self.spec.open_error {
            return Err(status);
        }
        Ok(MockHandle {
            kernel_driver_active: self.spec.kernel_driver_active,
            detached: HashSet::new(),
            claim_failures_left: self.spec.claim_failures,
            state: Arc::clone(&self.state),
            traffic: Arc::clone(&self.traffic),
        })
    }
}

/// Opened simulated device; records `Close` on drop
pub struct MockHandle {
    kernel_driver_active: bool,
    detached: HashSet<u8>,
    claim_failures_left: u32,
    state: Arc<Mutex<MockState>>,
    traffic: Arc<Traffic>,
}

impl MockHandle {
    fn begin(&self) -> InFlight<'_> {
        let delay = self.state.lock().transfer_delay;
        InFlight::begin(&self.traffic, delay)
    }
}

impl UsbHandle for MockHandle {
    fn kernel_driver_active(&self, interface: u8) -> Result<bool, UsbStatus> {
        Ok(self.kernel_driver_active && !self.detached.contains(&interface))
    }

    fn detach_kernel_driver(&mut self, interface: u8) -> Result<(), UsbStatus> {
        self.state
            .lock()
            .record(MockCall::DetachKernelDriver(interface));
        self.detached.insert(interface);
        Ok(())
    }

    fn attach_kernel_driver(&mut self, interface: u8) -> Result<(), UsbStatus> {
        self.state
            .lock()
            .record(MockCall::AttachKernelDriver(interface));
        self.detached.remove(&interface);
        Ok(())
    }

    fn set_active_configuration(&mut self, config: u8) -> Result<(), UsbStatus> {
        let mut state = self.state.lock();
        state.record(MockCall::SetConfiguration(config));
        state.configurations.pop_front().unwrap_or(Ok(()))
    }

    fn claim_interface(&mut self, interface: u8) -> Result<(), UsbStatus> {
        self.state.lock().record(MockCall::ClaimInterface(interface));
        if self.claim_failures_left > 0 {
            self.claim_failures_left -= 1;
            return Err(UsbStatus::Busy);
        }
        Ok(())
    }

    fn release_interface(&mut self, interface: u8) -> Result<(), UsbStatus> {
        self.state
            .lock()
            .record(MockCall::ReleaseInterface(interface));
        Ok(())
    }

    fn read_interrupt(
        &self,
        endpoint: u8,
        buf: &mut [u8],
        _timeout: Duration,
    ) -> Result<usize, UsbStatus> {
        let _in_flight = self.begin();
        let mut state = self.state.lock();
        state.record(MockCall::ReadInterrupt { endpoint });
        let report = state.reads.pop_front().unwrap_or(Err(UsbStatus::Timeout))?;
        let len = report.len().min(buf.len());
        buf[..len].copy_from_slice(&report[..len]);
        Ok(len)
    }

    fn write_interrupt(
        &self,
        endpoint: u8,
        data: &[u8],
        _timeout: Duration,
    ) -> Result<usize, UsbStatus> {
        let _in_flight = self.begin();
        let mut state = self.state.lock();
        state.record(MockCall::WriteInterrupt {
            endpoint,
            data: data.to_vec(),
        });
        state.writes.pop_front().unwrap_or(Ok(data.len()))
    }

    fn write_control(
        &self,
        request: ControlRequest,
        data: &[u8],
        _timeout: Duration,
    ) -> Result<usize, UsbStatus> {
        let _in_flight = self.begin();
        let mut state = self.state.lock();
        state.record(MockCall::WriteControl {
            request,
            data: data.to_vec(),
        });
        state.controls.pop_front().unwrap_or(Ok(data.len()))
    }

    fn reset(&mut self) -> Result<(), UsbStatus> {
        let _in_flight = self.begin();
        let mut state = self.state.lock();
        state.record(MockCall::Reset);
        state.resets.pop_front().unwrap_or(Ok(()))
    }

    fn clear_halt(&mut self, endpoint: u8) -> Result<(), UsbStatus> {
        let _in_flight = self.begin();
        self.state.lock().record(MockCall::ClearHalt(endpoint));
        Ok(())
    }
}

impl Drop for MockHandle {
    fn drop(&mut self) {
        self.state.lock().record(MockCall::Close);
    }
}
