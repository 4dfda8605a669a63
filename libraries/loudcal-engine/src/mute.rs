//! Transient mute around filter and gain swaps
//!
//! Swapping the FIR filter and the Liveprog gain is audible as a click, so
//! the music stream is muted for the swap:
//!
//! ```text
//! save level → mute → settle → apply → restore delay → restore level
//! ```
//!
//! Only one sequence owns the mute at a time. A request that arrives while
//! another sequence is muting runs its action immediately and leaves the
//! saved level alone.

use loudcal_core::{AudioStream, VolumeControl};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

pub struct MuteCoordinator {
    volume: Arc<dyn VolumeControl>,
    muting: AtomicBool,
    saved_level: Mutex<Option<u32>>,
    settle: Duration,
    restore_delay: Duration,
}

impl MuteCoordinator {
    pub fn new(volume: Arc<dyn VolumeControl>, settle: Duration, restore_delay: Duration) -> Self {
        Self {
            volume,
            muting: AtomicBool::new(false),
            saved_level: Mutex::new(None),
            settle,
            restore_delay,
        }
    }

    /// Whether a mute sequence currently holds the music stream
    pub fn is_muting(&self) -> bool {
        self.muting.load(Ordering::Acquire)
    }

    /// Run `action` with the music stream muted
    ///
    /// If the task running this future is aborted while muted, the saved
    /// level is restored when the future is dropped.
    pub async fn run_muted<F, T>(&self, action: F) -> T
    where
        F: FnOnce() -> T,
    {
        let guard = self.begin();
        if guard.is_some() {
            tokio::time::sleep(self.settle).await;
        }

        let output = action();

        if let Some(guard) = guard {
            tokio::time::sleep(self.restore_delay).await;
            drop(guard);
        }
        output
    }

    fn begin(&self) -> Option<MuteGuard<'_>> {
        if self
            .muting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Mute already in progress, applying without re-muting");
            return None;
        }

        let level = match self.volume.volume(AudioStream::Music) {
            Ok(level) => level,
            Err(e) => {
                warn!("Cannot read music volume, applying without mute: {}", e);
                self.muting.store(false, Ordering::Release);
                return None;
            }
        };

        if let Ok(mut saved) = self.saved_level.lock() {
            *saved = Some(level);
        }
        if let Err(e) = self.volume.set_volume(AudioStream::Music, 0) {
            warn!("Failed to mute music stream: {}", e);
        }
        debug!("Muted music stream (saved level {})", level);

        Some(MuteGuard { coordinator: self })
    }

    fn restore(&self) {
        let level = self.saved_level.lock().ok().and_then(|mut s| s.take());
        if let Some(level) = level {
            if let Err(e) = self.volume.set_volume(AudioStream::Music, level) {
                warn!("Failed to restore music volume {}: {}", level, e);
            } else {
                debug!("Restored music stream to {}", level);
            }
        }
        self.muting.store(false, Ordering::Release);
    }
}

/// Restores the saved level when dropped
struct MuteGuard<'a> {
    coordinator: &'a MuteCoordinator,
}

impl Drop for MuteGuard<'_> {
    fn drop(&mut self) {
        self.coordinator.restore();
    }
}
