//! Session tuning knobs

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::protocol::timing;

/// Timing and behaviour of a `UsbSession`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Pause after open, before claiming, and after release (ms)
    pub settle_delay_ms: u64,
    /// Additional claim attempts when the interface is busy
    pub claim_retries: u32,
    /// Wait between claim attempts (ms)
    pub claim_backoff_ms: u64,
    /// Interrupt write timeout (ms)
    pub write_timeout_ms: u64,
    /// Control transfer timeout (ms)
    pub control_timeout_ms: u64,
    /// Chunk size used in slowdown mode
    pub chunk_size: usize,
    /// Pause between chunks in slowdown mode (us)
    pub chunk_pause_us: u64,
    /// Release claimed interfaces on close
    pub release_on_close: bool,
    /// Bound on reclassification steps for a single fault
    pub max_recovery_steps: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: timing::SETTLE_DELAY_MS,
            claim_retries: timing::CLAIM_RETRIES,
            claim_backoff_ms: timing::CLAIM_BACKOFF_MS,
            write_timeout_ms: timing::WRITE_TIMEOUT_MS,
            control_timeout_ms: timing::CONTROL_TIMEOUT_MS,
            chunk_size: timing::CHUNK_SIZE,
            chunk_pause_us: timing::CHUNK_PAUSE_US,
            release_on_close: true,
            max_recovery_steps: timing::MAX_RECOVERY_STEPS,
        }
    }
}

impl SessionConfig {
    /// Same behaviour with every pause set to zero (tests, simulations)
    pub fn without_delays() -> Self {
        Self {
            settle_delay_ms: 0,
            claim_backoff_ms: 0,
            chunk_pause_us: 0,
            ..Self::default()
        }
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn claim_backoff(&self) -> Duration {
        Duration::from_millis(self.claim_backoff_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    pub fn control_timeout(&self) -> Duration {
        Duration::from_millis(self.control_timeout_ms)
    }

    pub fn chunk_pause(&self) -> Duration {
        Duration::from_micros(self.chunk_pause_us)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.settle_delay(), Duration::from_millis(50));
        assert_eq!(config.claim_retries, 10);
        assert_eq!(config.chunk_size, 32);
        assert_eq!(config.control_timeout(), Duration::from_secs(10));
        assert!(config.release_on_close);
    }

    #[test]
    fn test_partial_deserialize_keeps_defaults() {
        let config: SessionConfig =
            serde_json::from_str(r#"{"release_on_close": false, "claim_retries": 3}"#).unwrap();
        assert!(!config.release_on_close);
        assert_eq!(config.claim_retries, 3);
        assert_eq!(config.write_timeout_ms, 1000);
    }

    #[test]
    fn test_without_delays() {
        let config = SessionConfig::without_delays();
        assert_eq!(config.settle_delay(), Duration::ZERO);
        assert_eq!(config.chunk_pause(), Duration::ZERO);
        assert_eq!(config.claim_retries, 10);
    }
}
