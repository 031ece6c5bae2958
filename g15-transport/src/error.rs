//! Transport error types
//!
//! Raw backend status codes (`UsbStatus`) are classified into a
//! `TransportFault` exactly once, inside the session. Everything above the
//! session only ever sees `TransportError`.

use std::fmt;

use thiserror::Error;

/// Raw status reported by the USB backend (libusb error taxonomy)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UsbStatus {
    Io,
    InvalidParam,
    Access,
    NoDevice,
    NotFound,
    Busy,
    Timeout,
    Overflow,
    Pipe,
    Interrupted,
    NoMem,
    NotSupported,
    Other,
}

impl UsbStatus {
    /// Symbolic name of the status code
    pub fn name(&self) -> &'static str {
        match self {
            UsbStatus::Io => "LIBUSB_ERROR_IO",
            UsbStatus::InvalidParam => "LIBUSB_ERROR_INVALID_PARAM",
            UsbStatus::Access => "LIBUSB_ERROR_ACCESS",
            UsbStatus::NoDevice => "LIBUSB_ERROR_NO_DEVICE",
            UsbStatus::NotFound => "LIBUSB_ERROR_NOT_FOUND",
            UsbStatus::Busy => "LIBUSB_ERROR_BUSY",
            UsbStatus::Timeout => "LIBUSB_ERROR_TIMEOUT",
            UsbStatus::Overflow => "LIBUSB_ERROR_OVERFLOW",
            UsbStatus::Pipe => "LIBUSB_ERROR_PIPE",
            UsbStatus::Interrupted => "LIBUSB_ERROR_INTERRUPTED",
            UsbStatus::NoMem => "LIBUSB_ERROR_NO_MEM",
            UsbStatus::NotSupported => "LIBUSB_ERROR_NOT_SUPPORTED",
            UsbStatus::Other => "LIBUSB_ERROR_OTHER",
        }
    }
}

impl fmt::Display for UsbStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<rusb::Error> for UsbStatus {
    fn from(e: rusb::Error) -> Self {
        match e {
            rusb::Error::Io => UsbStatus::Io,
            rusb::Error::InvalidParam => UsbStatus::InvalidParam,
            rusb::Error::Access => UsbStatus::Access,
            rusb::Error::NoDevice => UsbStatus::NoDevice,
            rusb::Error::NotFound => UsbStatus::NotFound,
            rusb::Error::Busy => UsbStatus::Busy,
            rusb::Error::Timeout => UsbStatus::Timeout,
            rusb::Error::Overflow => UsbStatus::Overflow,
            rusb::Error::Pipe => UsbStatus::Pipe,
            rusb::Error::Interrupted => UsbStatus::Interrupted,
            rusb::Error::NoMem => UsbStatus::NoMem,
            rusb::Error::NotSupported => UsbStatus::NotSupported,
            _ => UsbStatus::Other,
        }
    }
}

/// Transient conditions that are logged and retried without state change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransientKind {
    /// Invalid request (EINVAL)
    InvalidRequest,
    /// Host controller quirk (ENXIO / generic I/O)
    HostController,
    /// Transfer interrupted, try again (EAGAIN)
    Interrupted,
    /// Transferred length differs from the requested length
    SizeMismatch,
}

/// A classified transfer fault
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportFault {
    /// Transfer timed out
    Timeout,
    /// Not enough scheduled bandwidth (overflow / ENOSPC)
    BusSaturation,
    /// Device went away
    Disconnected,
    /// Endpoint halted
    Stalled,
    /// Known transient condition
    Transient(TransientKind),
    /// Anything else
    Unrecognized(UsbStatus),
}

impl TransportFault {
    /// Classify a raw backend status
    pub fn classify(status: UsbStatus) -> Self {
        match status {
            UsbStatus::Timeout => TransportFault::Timeout,
            UsbStatus::Overflow => TransportFault::BusSaturation,
            UsbStatus::NoDevice => TransportFault::Disconnected,
            UsbStatus::Pipe => TransportFault::Stalled,
            UsbStatus::InvalidParam => TransportFault::Transient(TransientKind::InvalidRequest),
            UsbStatus::Io => TransportFault::Transient(TransientKind::HostController),
            UsbStatus::Interrupted => TransportFault::Transient(TransientKind::Interrupted),
            other => TransportFault::Unrecognized(other),
        }
    }
}

impl fmt::Display for TransportFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportFault::Timeout => f.write_str("timeout"),
            TransportFault::BusSaturation => f.write_str("bus bandwidth exhausted"),
            TransportFault::Disconnected => f.write_str("device disconnected"),
            TransportFault::Stalled => f.write_str("endpoint stalled"),
            TransportFault::Transient(TransientKind::InvalidRequest) => {
                f.write_str("invalid request")
            }
            TransportFault::Transient(TransientKind::HostController) => {
                f.write_str("host controller error")
            }
            TransportFault::Transient(TransientKind::Interrupted) => f.write_str("interrupted"),
            TransportFault::Transient(TransientKind::SizeMismatch) => {
                f.write_str("short transfer")
            }
            TransportFault::Unrecognized(status) => write!(f, "unknown usb error {status}"),
        }
    }
}

/// Errors that can occur during transport operations
#[derive(Error, Debug)]
pub enum TransportError {
    // Open-time errors
    #[error("No supported device found")]
    NoSupportedDevice,

    #[error("Could not open {model}: {status} (perhaps you don't have the appropriate permissions)")]
    CannotOpen {
        model: &'static str,
        status: UsbStatus,
    },

    #[error("Could not claim {model}: {reason}")]
    CannotClaim { model: &'static str, reason: String },

    // Misuse
    #[error("No device session is open")]
    NotOpen,

    #[error("Device has no {0} endpoint")]
    NoEndpoint(&'static str),

    // Transfer errors
    #[error("Temporary transfer failure ({0}), retry")]
    Retryable(TransportFault),

    #[error("USB bandwidth exhausted, switched to chunked writes")]
    BusSaturated,

    #[error("Device was reset after a disconnect, retry")]
    Reconnected,

    #[error("Device is gone, session closed")]
    DeviceGone,

    // Backend
    #[error("USB backend error: {0}")]
    Backend(UsbStatus),
}

impl TransportError {
    /// Safe to retry the same operation on the same session
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TransportError::Retryable(_) | TransportError::BusSaturated | TransportError::Reconnected
        )
    }

    /// The session was torn down, the caller must open it again
    pub fn is_permanent(&self) -> bool {
        matches!(self, TransportError::DeviceGone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_table() {
        assert_eq!(
            TransportFault::classify(UsbStatus::Timeout),
            TransportFault::Timeout
        );
        assert_eq!(
            TransportFault::classify(UsbStatus::Overflow),
            TransportFault::BusSaturation
        );
        assert_eq!(
            TransportFault::classify(UsbStatus::NoDevice),
            TransportFault::Disconnected
        );
        assert_eq!(
            TransportFault::classify(UsbStatus::Pipe),
            TransportFault::Stalled
        );
        assert_eq!(
            TransportFault::classify(UsbStatus::InvalidParam),
            TransportFault::Transient(TransientKind::InvalidRequest)
        );
        assert_eq!(
            TransportFault::classify(UsbStatus::Io),
            TransportFault::Transient(TransientKind::HostController)
        );
        assert_eq!(
            TransportFault::classify(UsbStatus::Access),
            TransportFault::Unrecognized(UsbStatus::Access)
        );
    }

    #[test]
    fn test_retry_policy() {
        assert!(TransportError::Retryable(TransportFault::Timeout).is_retryable());
        assert!(TransportError::Reconnected.is_retryable());
        assert!(!TransportError::DeviceGone.is_retryable());
        assert!(TransportError::DeviceGone.is_permanent());
        assert!(!TransportError::NotOpen.is_permanent());
    }

    #[test]
    fn test_status_names() {
        assert_eq!(UsbStatus::Pipe.name(), "LIBUSB_ERROR_PIPE");
        assert_eq!(UsbStatus::NoDevice.to_string(), "LIBUSB_ERROR_NO_DEVICE");
        assert_eq!(UsbStatus::from(rusb::Error::Timeout), UsbStatus::Timeout);
    }
}
