//! Wire-level constants shared by the session and the keyboard crate

/// HID class SET_REPORT control transfers
pub mod control {
    /// Host-to-device | class | interface
    pub const REQUEST_TYPE: u8 = 0x21;
    /// HID SET_REPORT
    pub const SET_REPORT: u8 = 0x09;

    /// Feature report 2: backlight, contrast, brightness, M-key LEDs
    pub const FEATURE_REPORT_2: u16 = 0x302;
    /// Feature report 3: G110 M-key LEDs
    pub const FEATURE_REPORT_3: u16 = 0x303;
    /// Feature report 5: G510 RGB backlight
    pub const FEATURE_REPORT_5: u16 = 0x305;
    /// Feature report 7: G110 backlight colour
    pub const FEATURE_REPORT_7: u16 = 0x307;

    /// wIndex used by the G510 RGB command
    pub const G510_RGB_INDEX: u16 = 1;
}

/// Session timing defaults
pub mod timing {
    /// Pause after open/claim/release steps (ms)
    pub const SETTLE_DELAY_MS: u64 = 50;
    /// Additional claim attempts after the first one fails
    pub const CLAIM_RETRIES: u32 = 10;
    /// Wait between claim attempts (ms)
    pub const CLAIM_BACKOFF_MS: u64 = 50;
    /// Interrupt write timeout (ms)
    pub const WRITE_TIMEOUT_MS: u64 = 1000;
    /// Control transfer timeout (ms)
    pub const CONTROL_TIMEOUT_MS: u64 = 10000;
    /// Chunk size for saturated-bus display writes
    pub const CHUNK_SIZE: usize = 32;
    /// Pause between chunks (us)
    pub const CHUNK_PAUSE_US: u64 = 100;
    /// Upper bound on recovery steps for one fault
    pub const MAX_RECOVERY_STEPS: u32 = 4;
}
