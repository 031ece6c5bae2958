//! USB session: device discovery, interface claiming and serialized transfers
//!
//! A session is created closed. `open()` probes the registry in order, claims
//! the HID interfaces of the first model that opens and records its endpoints.
//! All transfers, halt clearing and resets go through one mutex, which makes
//! a chunked display write atomic with respect to key reads on other threads.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::device_registry::{
    match_count, Capabilities, DeviceModel, G510_STANDARD_KEYBOARD_INTERFACE, SUPPORTED_DEVICES,
};
use crate::error::{TransientKind, TransportError, TransportFault, UsbStatus};
use crate::recovery::{recover, RecoveryTarget};
use crate::types::{ControlRequest, DeviceDescriptor, DEFAULT_CONFIGURATION};
use crate::{UsbBackend, UsbDevice, UsbHandle};

#[derive(Debug, Clone, Copy)]
struct InterfaceClaim {
    number: u8,
    kernel_driver_detached: bool,
    claimed: bool,
}

/// Everything acquired by a successful open
struct OpenDevice<H> {
    handle: H,
    /// Distinguishes this open from earlier and later ones on the same session
    generation: u64,
    model: &'static DeviceModel,
    interfaces: Vec<InterfaceClaim>,
    keys_endpoint: Option<u8>,
    display_endpoint: Option<u8>,
    shared: bool,
}

impl<H> OpenDevice<H> {
    fn is_claimed(&self, number: u8) -> bool {
        self.interfaces.iter().any(|i| i.number == number && i.claimed)
    }

    fn has_all_endpoints(&self) -> bool {
        self.keys_endpoint.is_some() && self.display_endpoint.is_some()
    }

    fn has_any_endpoint(&self) -> bool {
        self.keys_endpoint.is_some() || self.display_endpoint.is_some()
    }
}

/// Snapshot of an open session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub model: &'static DeviceModel,
    pub interfaces: Vec<u8>,
    pub keys_endpoint: Option<u8>,
    pub display_endpoint: Option<u8>,
    pub shared: bool,
    pub slowdown: bool,
}

/// A session with at most one supported keyboard
pub struct UsbSession<B: UsbBackend> {
    backend: B,
    config: SessionConfig,
    device: Mutex<Option<OpenDevice<B::Handle>>>,
    slowdown: AtomicBool,
    generations: AtomicU64,
}

impl<B: UsbBackend> UsbSession<B> {
    /// Create a closed session
    pub fn new(backend: B, config: SessionConfig) -> Self {
        Self {
            backend,
            config,
            device: Mutex::new(None),
            slowdown: AtomicBool::new(false),
            generations: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Number of attached supported devices
    ///
    /// A device is counted once for every registry entry it matches.
    pub fn connected_device_count(&self) -> Result<usize, TransportError> {
        let devices = self.backend.devices().map_err(TransportError::Backend)?;
        Ok(devices
            .iter()
            .filter_map(|d| d.descriptor().ok())
            .map(|desc| match_count(desc.vendor_id, desc.product_id))
            .sum())
    }

    /// Open the first supported device, in registry order
    ///
    /// An already open session is closed first.
    pub fn open(&self) -> Result<&'static DeviceModel, TransportError> {
        let mut guard = self.device.lock();
        if let Some(previous) = guard.take() {
            debug!("Session already open on {}, closing it first", previous.model.name);
            self.release(previous, true);
        }
        self.slowdown.store(false, Ordering::SeqCst);

        let open = self.find_and_open()?;
        let model = open.model;
        info!(
            "Opened {} (keys endpoint {:?}, display endpoint {:?})",
            model.name, open.keys_endpoint, open.display_endpoint
        );
        *guard = Some(open);
        Ok(model)
    }

    /// Release the interfaces, reattach kernel drivers and close the handle
    pub fn close(&self) -> Result<(), TransportError> {
        let open = self.device.lock().take().ok_or(TransportError::NotOpen)?;
        info!("Closing {}", open.model.name);
        self.release(open, true);
        self.slowdown.store(false, Ordering::SeqCst);
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.device.lock().is_some()
    }

    pub fn model(&self) -> Option<&'static DeviceModel> {
        self.device.lock().as_ref().map(|open| open.model)
    }

    pub fn capabilities(&self) -> Option<Capabilities> {
        self.model().map(|model| model.capabilities)
    }

    pub fn keys_endpoint(&self) -> Option<u8> {
        self.device.lock().as_ref().and_then(|open| open.keys_endpoint)
    }

    pub fn display_endpoint(&self) -> Option<u8> {
        self.device
            .lock()
            .as_ref()
            .and_then(|open| open.display_endpoint)
    }

    pub fn is_shared(&self) -> bool {
        self.device.lock().as_ref().is_some_and(|open| open.shared)
    }

    /// Display writes are being sent in chunks
    pub fn in_slowdown(&self) -> bool {
        self.slowdown.load(Ordering::SeqCst)
    }

    pub fn info(&self) -> Option<SessionInfo> {
        self.device.lock().as_ref().map(|open| SessionInfo {
            model: open.model,
            interfaces: open
                .interfaces
                .iter()
                .filter(|i| i.claimed)
                .map(|i| i.number)
                .collect(),
            keys_endpoint: open.keys_endpoint,
            display_endpoint: open.display_endpoint,
            shared: open.shared,
            slowdown: self.in_slowdown(),
        })
    }

    /// Interrupt read of up to `max_len` bytes
    pub fn read(
        &self,
        endpoint: u8,
        max_len: usize,
        timeout: Duration,
    ) -> Result<Vec<u8>, TransportError> {
        let guard = self.device.lock();
        let open = guard.as_ref().ok_or(TransportError::NotOpen)?;
        let generation = open.generation;
        let mut buf = vec![0u8; max_len];
        let result = open.handle.read_interrupt(endpoint, &mut buf, timeout);
        drop(guard);

        match result {
            Ok(n) => {
                buf.truncate(n);
                Ok(buf)
            }
            Err(status) => Err(self.fail(generation, TransportFault::classify(status), "read")),
        }
    }

    /// Interrupt write of the whole buffer in one transfer
    pub fn write(&self, endpoint: u8, data: &[u8]) -> Result<usize, TransportError> {
        let guard = self.device.lock();
        let open = guard.as_ref().ok_or(TransportError::NotOpen)?;
        let generation = open.generation;
        let result = expect_full(
            open.handle
                .write_interrupt(endpoint, data, self.config.write_timeout()),
            data.len(),
        );
        drop(guard);

        result.map_err(|fault| self.fail(generation, fault, "write"))
    }

    /// Interrupt write in `chunk_size` pieces with a pause between them
    ///
    /// The transfer guard is held for the whole buffer.
    pub fn write_chunked(&self, endpoint: u8, data: &[u8]) -> Result<usize, TransportError> {
        let chunk_size = self.config.chunk_size.max(1);
        let guard = self.device.lock();
        let open = guard.as_ref().ok_or(TransportError::NotOpen)?;
        let generation = open.generation;

        let mut written = 0;
        let mut result = Ok(());
        for chunk in data.chunks(chunk_size) {
            match expect_full(
                open.handle
                    .write_interrupt(endpoint, chunk, self.config.write_timeout()),
                chunk.len(),
            ) {
                Ok(n) => written += n,
                Err(fault) => {
                    result = Err(fault);
                    break;
                }
            }
            thread::sleep(self.config.chunk_pause());
        }
        drop(guard);

        match result {
            Ok(()) => Ok(written),
            Err(fault) => Err(self.fail(generation, fault, "chunked write")),
        }
    }

    /// Host-to-device control transfer
    pub fn control_write(
        &self,
        request: ControlRequest,
        data: &[u8],
    ) -> Result<usize, TransportError> {
        let guard = self.device.lock();
        let open = guard.as_ref().ok_or(TransportError::NotOpen)?;
        let generation = open.generation;
        let result = expect_full(
            open.handle
                .write_control(request, data, self.config.control_timeout()),
            data.len(),
        );
        drop(guard);

        result.map_err(|fault| self.fail(generation, fault, "control write"))
    }

    /// Run recovery against the device the failed transfer was issued on
    fn fail(&self, generation: u64, fault: TransportFault, context: &str) -> TransportError {
        let target = SessionRecovery {
            session: self,
            generation,
        };
        recover(fault, context, &target, self.config.max_recovery_steps).into_error()
    }

    fn find_and_open(&self) -> Result<OpenDevice<B::Handle>, TransportError> {
        let devices = self.backend.devices().map_err(TransportError::Backend)?;
        let candidates: Vec<(B::Device, DeviceDescriptor)> = devices
            .into_iter()
            .filter_map(|device| {
                let desc = device.descriptor().ok()?;
                Some((device, desc))
            })
            .collect();

        let mut last_error = None;
        for model in SUPPORTED_DEVICES {
            debug!("Trying to find {}", model.name);
            for (device, desc) in candidates
                .iter()
                .filter(|(_, desc)| model.matches(desc.vendor_id, desc.product_id))
            {
                info!("Found {}, trying to open it", model.name);
                match self.open_device(model, device, desc) {
                    Ok(open) => return Ok(open),
                    Err(e) => {
                        warn!("{}", e);
                        last_error = Some(e);
                    }
                }
            }
        }

        Err(last_error.unwrap_or(TransportError::NoSupportedDevice))
    }

    fn open_device(
        &self,
        model: &'static DeviceModel,
        device: &B::Device,
        desc: &DeviceDescriptor,
    ) -> Result<OpenDevice<B::Handle>, TransportError> {
        let handle = device.open().map_err(|status| TransportError::CannotOpen {
            model: model.name,
            status,
        })?;
        debug!(
            "Device has {} possible configurations",
            desc.num_configurations
        );
        thread::sleep(self.config.settle_delay());

        let mut open = OpenDevice {
            handle,
            generation: self.generations.fetch_add(1, Ordering::SeqCst) + 1,
            model,
            interfaces: Vec::new(),
            keys_endpoint: None,
            display_endpoint: None,
            shared: model.capabilities.is_shared(),
        };

        if let Err(e) = self.claim_hid_interfaces(&mut open, device, desc.num_configurations) {
            self.release(open, true);
            return Err(e);
        }
        if !open.has_any_endpoint() {
            self.release(open, true);
            return Err(TransportError::CannotClaim {
                model: model.name,
                reason: "no HID interface with usable endpoints".to_string(),
            });
        }

        Ok(open)
    }

    fn claim_hid_interfaces(
        &self,
        open: &mut OpenDevice<B::Handle>,
        device: &B::Device,
        num_configurations: u8,
    ) -> Result<(), TransportError> {
        'configs: for index in 0..num_configurations {
            let config = match device.config_descriptor(index) {
                Ok(config) => config,
                Err(status) => {
                    debug!("Skipping configuration {}: {}", index, status);
                    continue;
                }
            };

            for interface in &config.interfaces {
                if open.model.capabilities.is_g510()
                    && interface.number == G510_STANDARD_KEYBOARD_INTERFACE
                {
                    debug!("Skipping standard keyboard interface {}", interface.number);
                    continue;
                }
                debug!(
                    "Interface {} has {} alternate settings",
                    interface.number,
                    interface.alt_settings.len()
                );

                for alt in interface.alt_settings.iter().filter(|alt| alt.is_hid()) {
                    if !open.is_claimed(interface.number) {
                        self.claim_interface(open, interface.number)?;
                    }
                    for endpoint in &alt.endpoints {
                        if endpoint.is_in() {
                            debug!("Found keys endpoint {:#04x}", endpoint.address);
                            open.keys_endpoint = Some(endpoint.address);
                        } else {
                            debug!("Found display endpoint {:#04x}", endpoint.address);
                            open.display_endpoint = Some(endpoint.address);
                        }
                    }
                }

                if open.has_all_endpoints() {
                    break 'configs;
                }
            }
        }
        Ok(())
    }

    fn claim_interface(
        &self,
        open: &mut OpenDevice<B::Handle>,
        number: u8,
    ) -> Result<(), TransportError> {
        let model = open.model.name;
        let cannot_claim = |reason: String| TransportError::CannotClaim { model, reason };

        let detached = match open.handle.kernel_driver_active(number) {
            Ok(true) => {
                info!("Kernel driver active on interface {}, detaching it", number);
                open.handle.detach_kernel_driver(number).map_err(|status| {
                    cannot_claim(format!(
                        "cannot detach kernel driver from interface {number}: {status}"
                    ))
                })?;
                true
            }
            Ok(false) => false,
            Err(status) => {
                debug!(
                    "Cannot query kernel driver of interface {}: {}",
                    number, status
                );
                false
            }
        };
        open.interfaces.push(InterfaceClaim {
            number,
            kernel_driver_detached: detached,
            claimed: false,
        });

        if !open.shared {
            open.handle
                .set_active_configuration(DEFAULT_CONFIGURATION)
                .map_err(|status| {
                    cannot_claim(format!(
                        "cannot set configuration {DEFAULT_CONFIGURATION}: {status}"
                    ))
                })?;
        }
        thread::sleep(self.config.settle_delay());

        let mut attempt = 0;
        loop {
            match open.handle.claim_interface(number) {
                Ok(()) => break,
                Err(status) if attempt < self.config.claim_retries => {
                    attempt += 1;
                    debug!(
                        "Claiming interface {} failed ({}), retry {}",
                        number, status, attempt
                    );
                    thread::sleep(self.config.claim_backoff());
                }
                Err(status) => {
                    return Err(cannot_claim(format!(
                        "cannot claim interface {number}: {status}"
                    )));
                }
            }
        }

        if let Some(claim) = open.interfaces.iter_mut().find(|i| i.number == number) {
            claim.claimed = true;
        }
        info!("Claimed interface {}", number);
        Ok(())
    }

    /// Undo everything `open_device` did; dropping the handle closes it
    fn release(&self, mut open: OpenDevice<B::Handle>, reattach: bool) {
        for claim in open.interfaces.iter().rev() {
            if claim.claimed && self.config.release_on_close {
                if let Err(status) = open.handle.release_interface(claim.number) {
                    warn!("Cannot release interface {}: {}", claim.number, status);
                }
                thread::sleep(self.config.settle_delay());
            }
            if reattach && claim.kernel_driver_detached {
                match open.handle.attach_kernel_driver(claim.number) {
                    Ok(()) => debug!("Reattached kernel driver to interface {}", claim.number),
                    Err(status) => warn!(
                        "Cannot reattach kernel driver to interface {}: {}",
                        claim.number, status
                    ),
                }
            }
        }
    }
}

/// Recovery side effects bound to one open of a session
///
/// The transfer lock is released before recovery runs, so another thread may
/// have reopened the session meanwhile. Effects only touch the device when it
/// is still the one the failed transfer was issued on.
struct SessionRecovery<'a, B: UsbBackend> {
    session: &'a UsbSession<B>,
    generation: u64,
}

impl<B: UsbBackend> SessionRecovery<'_, B> {
    fn current<'g>(
        &self,
        guard: &'g mut Option<OpenDevice<B::Handle>>,
    ) -> Option<&'g mut OpenDevice<B::Handle>> {
        match guard.as_mut() {
            Some(open) if open.generation == self.generation => Some(open),
            Some(_) => {
                debug!("Session was reopened, skipping recovery for the old device");
                None
            }
            None => None,
        }
    }
}

impl<B: UsbBackend> RecoveryTarget for SessionRecovery<'_, B> {
    fn clear_keys_halt(&self) -> Result<(), UsbStatus> {
        let mut guard = self.session.device.lock();
        match self.current(&mut guard) {
            Some(open) => match open.keys_endpoint {
                Some(endpoint) => open.handle.clear_halt(endpoint),
                None => Ok(()),
            },
            None => Ok(()),
        }
    }

    fn reset_device(&self) -> Result<(), UsbStatus> {
        let mut guard = self.session.device.lock();
        if guard.is_none() {
            return Err(UsbStatus::NotFound);
        }
        match self.current(&mut guard) {
            Some(open) => open.handle.reset(),
            // A newer open already replaced the failed device
            None => Ok(()),
        }
    }

    fn tear_down(&self) {
        let open = {
            let mut guard = self.session.device.lock();
            if self.current(&mut guard).is_none() {
                return;
            }
            guard.take()
        };
        if let Some(open) = open {
            info!("Tearing down session on {}", open.model.name);
            self.session.release(open, false);
            self.session.slowdown.store(false, Ordering::SeqCst);
        }
    }

    fn enter_slowdown(&self) {
        let mut guard = self.session.device.lock();
        if self.current(&mut guard).is_some() {
            self.session.slowdown.store(true, Ordering::SeqCst);
        }
    }
}

impl<B: UsbBackend> Drop for UsbSession<B> {
    fn drop(&mut self) {
        if let Some(open) = self.device.get_mut().take() {
            debug!("Session dropped while open, closing {}", open.model.name);
            self.release(open, true);
        }
    }
}

fn expect_full(result: Result<usize, UsbStatus>, expected: usize) -> Result<usize, TransportFault> {
    match result {
        Ok(n) if n == expected => Ok(n),
        Ok(n) => {
            debug!("Transferred {} of {} bytes", n, expected);
            Err(TransportFault::Transient(TransientKind::SizeMismatch))
        }
        Err(status) => Err(TransportFault::classify(status)),
    }
}
