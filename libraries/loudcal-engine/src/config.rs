//! Engine timing configuration

use std::time::Duration;

/// Default debounce window for setter bursts
pub const DEFAULT_DEBOUNCE_MS: u64 = 50;
/// Default wait for a mute to take effect before swapping
pub const DEFAULT_MUTE_SETTLE_MS: u64 = 100;
/// Default wait after the swap before restoring volume
pub const DEFAULT_RESTORE_DELAY_MS: u64 = 200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Setter calls inside this window collapse into one flush
    pub debounce: Duration,
    pub mute_settle: Duration,
    pub restore_delay: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            mute_settle: Duration::from_millis(DEFAULT_MUTE_SETTLE_MS),
            restore_delay: Duration::from_millis(DEFAULT_RESTORE_DELAY_MS),
        }
    }
}
