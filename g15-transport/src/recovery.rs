//! Fault recovery policy
//!
//! Every failed transfer is classified once and handed to [`recover`], which
//! performs the side effects (clear halt, reset, teardown, slowdown) and
//! reports what the caller should tell its own caller. Reclassification after
//! a failed reset is an explicit loop with a step bound, so a device that keeps
//! failing its reset ends the session instead of spinning.

use tracing::{debug, info, warn};

use crate::error::{TransientKind, TransportError, TransportFault, UsbStatus};

/// Side effects the recovery policy may request
pub trait RecoveryTarget {
    /// Clear a halt condition on the key (input) endpoint
    fn clear_keys_halt(&self) -> Result<(), UsbStatus>;

    /// Reset the USB device
    fn reset_device(&self) -> Result<(), UsbStatus>;

    /// Release the interface, close the handle and forget the endpoints
    fn tear_down(&self);

    /// Switch display writes to chunked mode
    fn enter_slowdown(&self);
}

/// Outcome of handling one fault
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Nothing changed, the operation may be retried
    Retry(TransportFault),
    /// Slowdown mode entered
    Degraded,
    /// Device was reset and is usable again
    Reconnected,
    /// Session was torn down
    SessionLost,
}

impl Recovery {
    /// Error reported to the caller of the failed operation
    pub fn into_error(self) -> TransportError {
        match self {
            Recovery::Retry(fault) => TransportError::Retryable(fault),
            Recovery::Degraded => TransportError::BusSaturated,
            Recovery::Reconnected => TransportError::Reconnected,
            Recovery::SessionLost => TransportError::DeviceGone,
        }
    }
}

/// Handle a classified fault raised by `context` (e.g. "read", "display write")
pub fn recover<T: RecoveryTarget + ?Sized>(
    fault: TransportFault,
    context: &str,
    target: &T,
    max_steps: u32,
) -> Recovery {
    let mut fault = fault;

    for step in 0..max_steps.max(1) {
        match fault {
            TransportFault::Timeout => {
                debug!("Timeout during {}", context);
                return Recovery::Retry(fault);
            }
            TransportFault::BusSaturation => {
                warn!(
                    "Usb bandwidth exhausted during {}, switching to slowdown mode",
                    context
                );
                target.enter_slowdown();
                return Recovery::Degraded;
            }
            TransportFault::Disconnected => {
                info!("Device disconnected during {}, resetting it", context);
                match target.reset_device() {
                    Ok(()) => {
                        info!("Device reset succeeded");
                        return Recovery::Reconnected;
                    }
                    Err(UsbStatus::NotFound) => {
                        warn!("Device is gone, closing session");
                        target.tear_down();
                        return Recovery::SessionLost;
                    }
                    Err(status) => {
                        debug!(step, "Reset failed with {}, reclassifying", status);
                        fault = TransportFault::classify(status);
                    }
                }
            }
            TransportFault::Stalled => {
                warn!("Endpoint stalled during {}, clearing halt", context);
                if let Err(status) = target.clear_keys_halt() {
                    warn!("Clearing halt failed: {}", status);
                }
                return Recovery::Retry(fault);
            }
            TransportFault::Transient(kind) => {
                match kind {
                    TransientKind::InvalidRequest => {
                        warn!("Invalid request during {}", context)
                    }
                    TransientKind::HostController => {
                        warn!("Host controller error during {}", context)
                    }
                    TransientKind::Interrupted => warn!("{} interrupted, try again", context),
                    TransientKind::SizeMismatch => warn!("Short transfer during {}", context),
                }
                return Recovery::Retry(fault);
            }
            TransportFault::Unrecognized(status) => {
                warn!("Unknown usb error {} during {}", status, context);
                return Recovery::Retry(fault);
            }
        }
    }

    warn!(
        "Recovery did not settle within {} steps, closing session",
        max_steps
    );
    target.tear_down();
    Recovery::SessionLost
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;

    #[derive(Default)]
    struct FakeTarget {
        resets: RefCell<VecDeque<Result<(), UsbStatus>>>,
        reset_calls: Cell<u32>,
        clear_halts: Cell<u32>,
        teardowns: Cell<u32>,
        slowdown: Cell<bool>,
    }

    impl FakeTarget {
        fn with_resets(results: &[Result<(), UsbStatus>]) -> Self {
            Self {
                resets: RefCell::new(results.iter().copied().collect()),
                ..Default::default()
            }
        }
    }

    impl RecoveryTarget for FakeTarget {
        fn clear_keys_halt(&self) -> Result<(), UsbStatus> {
            self.clear_halts.set(self.clear_halts.get() + 1);
            Ok(())
        }

        fn reset_device(&self) -> Result<(), UsbStatus> {
            self.reset_calls.set(self.reset_calls.get() + 1);
            self.resets.borrow_mut().pop_front().unwrap_or(Ok(()))
        }

        fn tear_down(&self) {
            self.teardowns.set(self.teardowns.get() + 1);
        }

        fn enter_slowdown(&self) {
            self.slowdown.set(true);
        }
    }

    #[test]
    fn test_timeout_is_retry_without_side_effects() {
        let target = FakeTarget::default();
        let outcome = recover(TransportFault::Timeout, "read", &target, 4);
        assert_eq!(outcome, Recovery::Retry(TransportFault::Timeout));
        assert_eq!(target.reset_calls.get(), 0);
        assert_eq!(target.clear_halts.get(), 0);
        assert!(!target.slowdown.get());
    }

    #[test]
    fn test_saturation_enters_slowdown() {
        let target = FakeTarget::default();
        let outcome = recover(TransportFault::BusSaturation, "display write", &target, 4);
        assert_eq!(outcome, Recovery::Degraded);
        assert!(target.slowdown.get());
    }

    #[test]
    fn test_stall_clears_halt_once() {
        let target = FakeTarget::default();
        let outcome = recover(TransportFault::Stalled, "read", &target, 4);
        assert_eq!(outcome, Recovery::Retry(TransportFault::Stalled));
        assert_eq!(target.clear_halts.get(), 1);
        assert_eq!(target.teardowns.get(), 0);
    }

    #[test]
    fn test_disconnect_reset_succeeds() {
        let target = FakeTarget::with_resets(&[Ok(())]);
        let outcome = recover(TransportFault::Disconnected, "read", &target, 4);
        assert_eq!(outcome, Recovery::Reconnected);
        assert_eq!(target.reset_calls.get(), 1);
        assert_eq!(target.teardowns.get(), 0);
    }

    #[test]
    fn test_disconnect_device_not_found_tears_down() {
        let target = FakeTarget::with_resets(&[Err(UsbStatus::NotFound)]);
        let outcome = recover(TransportFault::Disconnected, "read", &target, 4);
        assert_eq!(outcome, Recovery::SessionLost);
        assert_eq!(target.teardowns.get(), 1);
    }

    #[test]
    fn test_reset_failure_is_reclassified() {
        let target = FakeTarget::with_resets(&[Err(UsbStatus::Pipe)]);
        let outcome = recover(TransportFault::Disconnected, "read", &target, 4);
        assert_eq!(outcome, Recovery::Retry(TransportFault::Stalled));
        assert_eq!(target.clear_halts.get(), 1);
    }

    #[test]
    fn test_repeated_disconnect_is_bounded() {
        let target = FakeTarget::with_resets(&[Err(UsbStatus::NoDevice); 8]);
        let outcome = recover(TransportFault::Disconnected, "read", &target, 3);
        assert_eq!(outcome, Recovery::SessionLost);
        assert_eq!(target.reset_calls.get(), 3);
        assert_eq!(target.teardowns.get(), 1);
    }

    #[test]
    fn test_unknown_error_is_retry() {
        let target = FakeTarget::default();
        let fault = TransportFault::Unrecognized(UsbStatus::Access);
        assert_eq!(recover(fault, "read", &target, 4), Recovery::Retry(fault));
    }

    #[test]
    fn test_into_error() {
        assert!(matches!(
            Recovery::Degraded.into_error(),
            TransportError::BusSaturated
        ));
        assert!(Recovery::SessionLost.into_error().is_permanent());
    }
}
