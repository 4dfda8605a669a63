//! Audio device abstractions
//!
//! The engine never talks to a platform mixer directly. Stream volumes go
//! through [`VolumeControl`] (used to mute around filter swaps and by the
//! safe-volume coordinator) and the calibration test tone is written to an
//! [`AudioSink`].

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

/// Platform audio streams with independent volume indices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioStream {
    Music,
    Alarm,
    Ring,
    Notification,
}

impl AudioStream {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Music => "music",
            Self::Alarm => "alarm",
            Self::Ring => "ring",
            Self::Notification => "notification",
        }
    }
}

/// Per-stream integer volume control
pub trait VolumeControl: Send + Sync {
    /// Current volume index of a stream
    fn volume(&self, stream: AudioStream) -> Result<u32>;

    /// Highest volume index of a stream
    fn max_volume(&self, stream: AudioStream) -> Result<u32>;

    /// Set a stream's volume index; values above the maximum are clamped
    fn set_volume(&self, stream: AudioStream, level: u32) -> Result<()>;
}

/// Blocking PCM sink for interleaved `f32` samples
pub trait AudioSink: Send {
    fn sample_rate(&self) -> u32;

    fn channels(&self) -> u16;

    /// Write interleaved samples, blocking until the device accepts them
    fn write(&mut self, samples: &[f32]) -> Result<()>;
}

/// Volume control that only keeps levels in memory
///
/// Used by the daemon when no platform mixer is attached, and by tests.
#[derive(Debug)]
pub struct SoftwareVolume {
    levels: Mutex<HashMap<AudioStream, (u32, u32)>>,
}

impl SoftwareVolume {
    /// Every stream at `level` out of `max`
    pub fn new(level: u32, max: u32) -> Self {
        let level = level.min(max);
        let levels = [
            AudioStream::Music,
            AudioStream::Alarm,
            AudioStream::Ring,
            AudioStream::Notification,
        ]
        .into_iter()
        .map(|s| (s, (level, max)))
        .collect();

        Self {
            levels: Mutex::new(levels),
        }
    }

    /// Override one stream's level and maximum
    pub fn with_stream(self, stream: AudioStream, level: u32, max: u32) -> Self {
        if let Ok(mut levels) = self.levels.lock() {
            levels.insert(stream, (level.min(max), max));
        }
        self
    }

    fn entry(&self, stream: AudioStream) -> Result<(u32, u32)> {
        let levels = self
            .levels
            .lock()
            .map_err(|_| CoreError::audio("volume lock poisoned"))?;
        levels
            .get(&stream)
            .copied()
            .ok_or_else(|| CoreError::audio(format!("unknown stream: {}", stream.as_str())))
    }
}

impl Default for SoftwareVolume {
    fn default() -> Self {
        Self::new(10, 15)
    }
}

impl VolumeControl for SoftwareVolume {
    fn volume(&self, stream: AudioStream) -> Result<u32> {
        Ok(self.entry(stream)?.0)
    }

    fn max_volume(&self, stream: AudioStream) -> Result<u32> {
        Ok(self.entry(stream)?.1)
    }

    fn set_volume(&self, stream: AudioStream, level: u32) -> Result<()> {
        let mut levels = self
            .levels
            .lock()
            .map_err(|_| CoreError::audio("volume lock poisoned"))?;
        let entry = levels
            .get_mut(&stream)
            .ok_or_else(|| CoreError::audio(format!("unknown stream: {}", stream.as_str())))?;
        entry.0 = level.min(entry.1);
        Ok(())
    }
}
