//! Persisted calibration profile
//!
//! One profile per device, stored in the application namespace. Every float
//! is checked on load: non-finite values (corrupted storage) are replaced by
//! the field's default, everything else is clamped into its range.

use crate::error::{EngineError, Result};
use chrono::{DateTime, Utc};
use loudcal_core::prefs::keys;
use loudcal_core::{KeyValueStore, Namespace, PreferencesExt};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::ops::RangeInclusive;
use tracing::warn;

pub const DEFAULT_TARGET_PHON: f32 = 60.0;
pub const DEFAULT_REFERENCE_PHON: f32 = 80.0;
pub const DEFAULT_MAX_SPL: f32 = 125.0;
pub const DEFAULT_CALIBRATION_OFFSET: f32 = 0.0;
pub const DEFAULT_RMS_OFFSET: f32 = 10.0;

/// Domain of target phon values
pub const TARGET_PHON_RANGE: RangeInclusive<f32> = 0.0..=125.0;
/// Range the controller clamps user targets into
pub const TARGET_PHON_USER_RANGE: RangeInclusive<f32> = 40.0..=125.0;
pub const REFERENCE_PHON_RANGE: RangeInclusive<f32> = 75.0..=90.0;
pub const MAX_SPL_RANGE: RangeInclusive<f32> = 60.0..=130.0;
pub const CALIBRATION_OFFSET_RANGE: RangeInclusive<f32> = -30.0..=30.0;
pub const RMS_OFFSET_RANGE: RangeInclusive<f32> = 0.0..=14.0;

/// Numbered profile slots
pub const PROFILE_SLOTS: RangeInclusive<u8> = 1..=3;

/// Clamp into an inclusive range
pub fn clamp_to(value: f32, range: &RangeInclusive<f32>) -> f32 {
    value.clamp(*range.start(), *range.end())
}

/// Device calibration and listening settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationProfile {
    pub target_phon: f32,
    pub reference_phon: f32,
    pub max_spl: f32,
    pub calibration_offset: f32,
    pub rms_offset: f32,
    pub auto_reference_enabled: bool,
    pub fir_compensation_enabled: bool,
    pub loudness_enabled: bool,
}

impl Default for CalibrationProfile {
    fn default() -> Self {
        Self {
            target_phon: DEFAULT_TARGET_PHON,
            reference_phon: DEFAULT_REFERENCE_PHON,
            max_spl: DEFAULT_MAX_SPL,
            calibration_offset: DEFAULT_CALIBRATION_OFFSET,
            rms_offset: DEFAULT_RMS_OFFSET,
            auto_reference_enabled: false,
            fir_compensation_enabled: true,
            loudness_enabled: false,
        }
    }
}

impl CalibrationProfile {
    /// Perceived loudness of program material: target minus RMS headroom
    pub fn actual_phon(&self) -> f32 {
        self.target_phon - self.rms_offset
    }

    /// Replace non-finite fields with defaults and clamp the rest
    pub fn sanitized(self) -> Self {
        Self {
            target_phon: clamp_to(
                finite_or(self.target_phon, DEFAULT_TARGET_PHON, keys::LOUDNESS_TARGET_PHON),
                &TARGET_PHON_RANGE,
            ),
            reference_phon: clamp_to(
                finite_or(
                    self.reference_phon,
                    DEFAULT_REFERENCE_PHON,
                    keys::LOUDNESS_REFERENCE_PHON,
                ),
                &REFERENCE_PHON_RANGE,
            ),
            max_spl: clamp_to(
                finite_or(self.max_spl, DEFAULT_MAX_SPL, keys::LOUDNESS_MAX_SPL),
                &MAX_SPL_RANGE,
            ),
            calibration_offset: clamp_to(
                finite_or(
                    self.calibration_offset,
                    DEFAULT_CALIBRATION_OFFSET,
                    keys::LOUDNESS_CALIBRATION_OFFSET,
                ),
                &CALIBRATION_OFFSET_RANGE,
            ),
            rms_offset: clamp_to(
                finite_or(self.rms_offset, DEFAULT_RMS_OFFSET, keys::LOUDNESS_RMS_OFFSET),
                &RMS_OFFSET_RANGE,
            ),
            ..self
        }
    }

    /// Load from the application namespace, falling back to defaults
    pub fn load(store: &dyn KeyValueStore) -> Result<Self> {
        let defaults = Self::default();
        let ns = Namespace::App;

        let profile = Self {
            target_phon: store
                .get_f32(ns, keys::LOUDNESS_TARGET_PHON)?
                .unwrap_or(defaults.target_phon),
            reference_phon: store
                .get_f32(ns, keys::LOUDNESS_REFERENCE_PHON)?
                .unwrap_or(defaults.reference_phon),
            max_spl: store
                .get_f32(ns, keys::LOUDNESS_MAX_SPL)?
                .unwrap_or(defaults.max_spl),
            calibration_offset: store
                .get_f32(ns, keys::LOUDNESS_CALIBRATION_OFFSET)?
                .unwrap_or(defaults.calibration_offset),
            rms_offset: store
                .get_f32(ns, keys::LOUDNESS_RMS_OFFSET)?
                .unwrap_or(defaults.rms_offset),
            auto_reference_enabled: store
                .get_bool(ns, keys::LOUDNESS_AUTO_REFERENCE)?
                .unwrap_or(defaults.auto_reference_enabled),
            fir_compensation_enabled: store
                .get_bool(ns, keys::LOUDNESS_FIR_COMPENSATION_ENABLED)?
                .unwrap_or(defaults.fir_compensation_enabled),
            loudness_enabled: store
                .get_bool(ns, keys::LOUDNESS_ENABLED)?
                .unwrap_or(defaults.loudness_enabled),
        };

        Ok(profile.sanitized())
    }

    /// Persist every field in one commit
    pub fn save(&self, store: &dyn KeyValueStore) -> Result<()> {
        store.set_many(
            Namespace::App,
            &[
                (keys::LOUDNESS_TARGET_PHON, json!(self.target_phon)),
                (keys::LOUDNESS_REFERENCE_PHON, json!(self.reference_phon)),
                (keys::LOUDNESS_MAX_SPL, json!(self.max_spl)),
                (keys::LOUDNESS_CALIBRATION_OFFSET, json!(self.calibration_offset)),
                (keys::LOUDNESS_RMS_OFFSET, json!(self.rms_offset)),
                (keys::LOUDNESS_AUTO_REFERENCE, json!(self.auto_reference_enabled)),
                (
                    keys::LOUDNESS_FIR_COMPENSATION_ENABLED,
                    json!(self.fir_compensation_enabled),
                ),
                (keys::LOUDNESS_ENABLED, json!(self.loudness_enabled)),
            ],
        )?;
        Ok(())
    }
}

fn finite_or(value: f32, default: f32, key: &str) -> f32 {
    if value.is_finite() {
        value
    } else {
        warn!("Stored {} is not finite ({}), using default {}", key, value, default);
        default
    }
}

/// Snapshot stored in a numbered profile slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileSlot {
    pub target_phon: f32,
    pub reference_phon: f32,
    pub calibration_offset: f32,
    pub max_spl: f32,
    pub saved_at: DateTime<Utc>,
}

impl ProfileSlot {
    /// Capture the slot fields of a profile
    pub fn capture(profile: &CalibrationProfile) -> Self {
        Self {
            target_phon: profile.target_phon,
            reference_phon: profile.reference_phon,
            calibration_offset: profile.calibration_offset,
            max_spl: profile.max_spl,
            saved_at: Utc::now(),
        }
    }

    /// Preference key of a slot
    pub fn key(slot: u8) -> Result<String> {
        if PROFILE_SLOTS.contains(&slot) {
            Ok(format!("{}{}", keys::LOUDNESS_PROFILE_PREFIX, slot))
        } else {
            Err(EngineError::InvalidSlot(slot))
        }
    }

    pub fn save(&self, store: &dyn KeyValueStore, slot: u8) -> Result<()> {
        let key = Self::key(slot)?;
        store.set(Namespace::App, &key, serde_json::to_value(self)?)?;
        Ok(())
    }

    /// Read a slot, `Ok(None)` when nothing has been saved there
    pub fn load(store: &dyn KeyValueStore, slot: u8) -> Result<Option<Self>> {
        let key = Self::key(slot)?;
        match store.get(Namespace::App, &key)? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loudcal_core::MemoryStore;

    #[test]
    fn test_defaults() {
        let profile = CalibrationProfile::default();
        assert_eq!(profile.target_phon, 60.0);
        assert_eq!(profile.reference_phon, 80.0);
        assert_eq!(profile.max_spl, 125.0);
        assert_eq!(profile.rms_offset, 10.0);
        assert!(profile.fir_compensation_enabled);
        assert!(!profile.loudness_enabled);
        assert_eq!(profile.actual_phon(), 50.0);
    }

    #[test]
    fn test_load_empty_store_gives_defaults() {
        let store = MemoryStore::new();
        assert_eq!(
            CalibrationProfile::load(&store).unwrap(),
            CalibrationProfile::default()
        );
    }

    #[test]
    fn test_save_load_round_trip() {
        let store = MemoryStore::new();
        let profile = CalibrationProfile {
            target_phon: 72.5,
            reference_phon: 85.0,
            max_spl: 110.0,
            calibration_offset: -4.5,
            rms_offset: 12.0,
            auto_reference_enabled: true,
            fir_compensation_enabled: false,
            loudness_enabled: true,
        };
        profile.save(&store).unwrap();
        assert_eq!(CalibrationProfile::load(&store).unwrap(), profile);
    }

    #[test]
    fn test_nan_reference_falls_back_to_default() {
        let store = MemoryStore::new();
        store
            .set(Namespace::App, keys::LOUDNESS_REFERENCE_PHON, json!("NaN"))
            .unwrap();
        store
            .set(Namespace::App, keys::LOUDNESS_MAX_SPL, json!("inf"))
            .unwrap();

        let profile = CalibrationProfile::load(&store).unwrap();
        assert_eq!(profile.reference_phon, DEFAULT_REFERENCE_PHON);
        assert_eq!(profile.max_spl, DEFAULT_MAX_SPL);
    }

    #[test]
    fn test_out_of_range_values_are_clamped_on_load() {
        let store = MemoryStore::new();
        store
            .set_many(
                Namespace::App,
                &[
                    (keys::LOUDNESS_MAX_SPL, json!(200.0)),
                    (keys::LOUDNESS_REFERENCE_PHON, json!(60.0)),
                    (keys::LOUDNESS_RMS_OFFSET, json!(-3.0)),
                ],
            )
            .unwrap();

        let profile = CalibrationProfile::load(&store).unwrap();
        assert_eq!(profile.max_spl, 130.0);
        assert_eq!(profile.reference_phon, 75.0);
        assert_eq!(profile.rms_offset, 0.0);
    }

    #[test]
    fn test_slot_round_trip() {
        let store = MemoryStore::new();
        let slot = ProfileSlot::capture(&CalibrationProfile::default());
        slot.save(&store, 2).unwrap();

        assert_eq!(ProfileSlot::load(&store, 2).unwrap(), Some(slot));
        assert_eq!(ProfileSlot::load(&store, 1).unwrap(), None);
    }

    #[test]
    fn test_invalid_slot() {
        let store = MemoryStore::new();
        assert!(matches!(
            ProfileSlot::load(&store, 4),
            Err(EngineError::InvalidSlot(4))
        ));
        assert!(matches!(ProfileSlot::key(0), Err(EngineError::InvalidSlot(0))));
    }
}
