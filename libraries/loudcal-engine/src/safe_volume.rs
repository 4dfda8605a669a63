//! Safe-volume coordination for alarm, ring and notification streams
//!
//! With loudness compensation active the music stream runs at full device
//! volume, so other streams would be startlingly loud. While reduced, each
//! managed stream sits at 15% of its previous level (never below 1); the
//! previous levels are persisted so they survive a restart and are put back
//! on restore.

use crate::error::Result;
use loudcal_core::prefs::keys;
use loudcal_core::{AudioStream, KeyValueStore, Namespace, PreferencesExt, VolumeControl};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const REDUCTION_FACTOR: f32 = 0.15;
pub const MIN_SAFE_VOLUME: u32 = 1;

/// Streams that are reduced
pub const MANAGED_STREAMS: [AudioStream; 3] =
    [AudioStream::Alarm, AudioStream::Ring, AudioStream::Notification];

/// Reduced level for a stream currently at `current` out of `max`
pub fn reduced_volume(current: u32, max: u32) -> u32 {
    let reduced = (current as f32 * REDUCTION_FACTOR).round() as u32;
    reduced.clamp(MIN_SAFE_VOLUME, max.max(MIN_SAFE_VOLUME))
}

/// Per-stream volume report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamVolumeInfo {
    pub stream: AudioStream,
    pub current: u32,
    pub original: Option<u32>,
    pub max: u32,
    pub reduced: bool,
}

pub struct SafeVolumeCoordinator {
    store: Arc<dyn KeyValueStore>,
    volume: Arc<dyn VolumeControl>,
}

impl SafeVolumeCoordinator {
    pub fn new(store: Arc<dyn KeyValueStore>, volume: Arc<dyn VolumeControl>) -> Self {
        Self { store, volume }
    }

    fn original_key(stream: AudioStream) -> String {
        format!("{}{}", keys::SAFE_VOLUME_ORIGINAL_PREFIX, stream.as_str())
    }

    /// Enabled unless explicitly switched off
    pub fn is_enabled(&self) -> bool {
        self.store
            .get_bool(Namespace::App, keys::SAFE_VOLUME_ENABLED)
            .ok()
            .flatten()
            .unwrap_or(true)
    }

    pub fn is_reduced(&self) -> bool {
        self.store
            .get_bool(Namespace::App, keys::SAFE_VOLUME_REDUCED_STATE)
            .ok()
            .flatten()
            .unwrap_or(false)
    }

    /// Enable or disable; disabling restores reduced streams
    pub fn set_enabled(&self, enabled: bool) -> Result<()> {
        self.store
            .set(Namespace::App, keys::SAFE_VOLUME_ENABLED, json!(enabled))?;
        if !enabled && self.is_reduced() {
            self.restore()?;
        }
        Ok(())
    }

    /// Reduce managed streams; returns whether anything changed
    pub fn apply_reduction(&self) -> Result<bool> {
        if !self.is_enabled() {
            debug!("Safe volume disabled, not reducing");
            return Ok(false);
        }
        if self.is_reduced() {
            debug!("Safe volume already applied");
            return Ok(false);
        }

        let mut originals = Vec::new();
        for stream in MANAGED_STREAMS {
            match self.volume.volume(stream) {
                Ok(level) => originals.push((stream, level)),
                Err(e) => warn!("Cannot read {} volume: {}", stream.as_str(), e),
            }
        }

        let saved_keys: Vec<String> = originals
            .iter()
            .map(|(stream, _)| Self::original_key(*stream))
            .collect();
        let entries: Vec<(&str, serde_json::Value)> = saved_keys
            .iter()
            .zip(&originals)
            .map(|(key, (_, level))| (key.as_str(), json!(level)))
            .collect();
        self.store.set_many(Namespace::App, &entries)?;

        for (stream, level) in originals {
            let max = self.volume.max_volume(stream)?;
            let target = reduced_volume(level, max);
            if let Err(e) = self.volume.set_volume(stream, target) {
                warn!("Failed to reduce {} volume: {}", stream.as_str(), e);
            } else {
                debug!("Reduced {} volume {} -> {}", stream.as_str(), level, target);
            }
        }

        self.store
            .set(Namespace::App, keys::SAFE_VOLUME_REDUCED_STATE, json!(true))?;
        info!("Safe volume reduction applied");
        Ok(true)
    }

    /// Put saved levels back; returns whether anything changed
    pub fn restore(&self) -> Result<bool> {
        if !self.is_reduced() {
            return Ok(false);
        }

        for stream in MANAGED_STREAMS {
            let key = Self::original_key(stream);
            let Some(original) = self.store.get_u32(Namespace::App, &key)? else {
                continue;
            };
            let max = self.volume.max_volume(stream)?;
            if let Err(e) = self.volume.set_volume(stream, original.min(max)) {
                warn!("Failed to restore {} volume: {}", stream.as_str(), e);
            }
            self.store.remove(Namespace::App, &key)?;
        }

        self.store
            .set(Namespace::App, keys::SAFE_VOLUME_REDUCED_STATE, json!(false))?;
        info!("Safe volume restored");
        Ok(true)
    }

    /// Re-cap streams that were raised while reduced
    pub fn update_reduction(&self) -> Result<()> {
        if !self.is_enabled() || !self.is_reduced() {
            return Ok(());
        }

        for stream in MANAGED_STREAMS {
            let current = self.volume.volume(stream)?;
            let max = self.volume.max_volume(stream)?;
            let cap = reduced_volume(max, max);
            if current > cap {
                debug!("Capping {} volume {} -> {}", stream.as_str(), current, cap);
                self.volume.set_volume(stream, cap)?;
            }
        }
        Ok(())
    }

    pub fn volume_info(&self) -> Result<Vec<StreamVolumeInfo>> {
        let reduced = self.is_reduced();
        MANAGED_STREAMS
            .into_iter()
            .map(|stream| {
                Ok(StreamVolumeInfo {
                    stream,
                    current: self.volume.volume(stream)?,
                    original: self
                        .store
                        .get_u32(Namespace::App, &Self::original_key(stream))?,
                    max: self.volume.max_volume(stream)?,
                    reduced,
                })
            })
            .collect()
    }
}
