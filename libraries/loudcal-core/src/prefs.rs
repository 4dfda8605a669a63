//! Namespaced preference storage
//!
//! Preferences are grouped by [`Namespace`], one per DSP module plus the
//! application namespace that holds the loudness profile. Values are stored as
//! JSON values so the same store can hold floats, flags and paths.
//!
//! A downstream DSP engine reloads per namespace, so writers commit a whole
//! namespace batch with [`KeyValueStore::set_many`] and then announce the
//! namespace on the [`crate::PreferencesBus`].

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;

/// Preference namespace identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Namespace {
    /// Application-level settings (loudness profile, master switch, safe volume)
    App,
    Convolver,
    Liveprog,
    Equalizer,
    GraphicEq,
    BassBoost,
    Compander,
    Reverb,
    StereoWide,
    Crossfeed,
    Tube,
    Ddc,
    Output,
}

impl Namespace {
    /// Every namespace, in a stable order
    pub const ALL: [Namespace; 13] = [
        Self::App,
        Self::Convolver,
        Self::Liveprog,
        Self::Equalizer,
        Self::GraphicEq,
        Self::BassBoost,
        Self::Compander,
        Self::Reverb,
        Self::StereoWide,
        Self::Crossfeed,
        Self::Tube,
        Self::Ddc,
        Self::Output,
    ];

    /// Identifier used on disk and in change notifications
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::App => "application",
            Self::Convolver => "dsp_convolver",
            Self::Liveprog => "dsp_liveprog",
            Self::Equalizer => "dsp_equalizer",
            Self::GraphicEq => "dsp_graphiceq",
            Self::BassBoost => "dsp_bass",
            Self::Compander => "dsp_compander",
            Self::Reverb => "dsp_reverb",
            Self::StereoWide => "dsp_stereowide",
            Self::Crossfeed => "dsp_crossfeed",
            Self::Tube => "dsp_tube",
            Self::Ddc => "dsp_ddc",
            Self::Output => "dsp_output_control",
        }
    }

    /// Parse an identifier produced by [`Namespace::as_str`]
    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|ns| ns.as_str() == s)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Preference key constants
pub mod keys {
    // Loudness profile (application namespace)
    /// Reference equal-loudness curve in phon (75-90)
    pub const LOUDNESS_REFERENCE_PHON: &str = "loudness_reference_phon";
    /// Loudness compensation master switch
    pub const LOUDNESS_ENABLED: &str = "loudness_enabled";
    /// User-selected listening loudness in phon
    pub const LOUDNESS_TARGET_PHON: &str = "loudness_target_phon";
    /// Calibration correction in dB
    pub const LOUDNESS_CALIBRATION_OFFSET: &str = "loudness_calibration_offset";
    /// Calibrated maximum output level in dB SPL
    pub const LOUDNESS_MAX_SPL: &str = "loudness_max_spl";
    /// Derive the reference curve from the target
    pub const LOUDNESS_AUTO_REFERENCE: &str = "loudness_auto_reference";
    /// Include the FIR filter preamp in the gain
    pub const LOUDNESS_FIR_COMPENSATION_ENABLED: &str = "loudness_fir_compensation_enabled";
    /// Program RMS headroom in dB
    pub const LOUDNESS_RMS_OFFSET: &str = "loudness_rms_offset";
    /// Prefix for saved profile slots (`loudness_profile_1` ...)
    pub const LOUDNESS_PROFILE_PREFIX: &str = "loudness_profile_";

    /// DSP master switch
    pub const POWERED_ON: &str = "powered_on";

    // Safe volume (application namespace)
    pub const SAFE_VOLUME_ENABLED: &str = "safe_volume_enabled";
    pub const SAFE_VOLUME_REDUCED_STATE: &str = "safe_volume_reduced_state";
    pub const SAFE_VOLUME_ORIGINAL_PREFIX: &str = "safe_volume_original_";

    // Convolver
    pub const CONVOLVER_ENABLE: &str = "convolver_enable";
    pub const CONVOLVER_FILE: &str = "convolver_file";
    pub const CONVOLVER_MODE: &str = "convolver_mode";
    pub const CONVOLVER_ADV_IMP: &str = "convolver_adv_imp";

    // Liveprog
    pub const LIVEPROG_ENABLE: &str = "liveprog_enable";
    pub const LIVEPROG_FILE: &str = "liveprog_file";

    // Graphic EQ
    pub const GEQ_ENABLE: &str = "geq_enable";
    pub const GEQ_NODES: &str = "geq_nodes";

    // Multi-band equalizer
    pub const EQ_ENABLE: &str = "eq_enable";
    pub const EQ_FILTER_TYPE: &str = "eq_filter_type";
    pub const EQ_INTERPOLATION: &str = "eq_interpolation";
    pub const EQ_BANDS: &str = "eq_bands";

    // Bass boost
    pub const BASS_ENABLE: &str = "bass_enable";
    pub const BASS_MAX_GAIN: &str = "bass_max_gain";

    // Reverb
    pub const REVERB_ENABLE: &str = "reverb_enable";
    pub const REVERB_PRESET: &str = "reverb_preset";

    // Stereo widening
    pub const STEREOWIDE_ENABLE: &str = "stereowide_enable";
    pub const STEREOWIDE_MODE: &str = "stereowide_mode";

    // Crossfeed
    pub const CROSSFEED_ENABLE: &str = "crossfeed_enable";
    pub const CROSSFEED_MODE: &str = "crossfeed_mode";

    // Tube
    pub const TUBE_ENABLE: &str = "tube_enable";
    pub const TUBE_DRIVE: &str = "tube_drive";

    // DDC
    pub const DDC_ENABLE: &str = "ddc_enable";
    pub const DDC_FILE: &str = "ddc_file";

    // Output control
    pub const OUTPUT_POSTGAIN: &str = "output_postgain";
    pub const LIMITER_THRESHOLD: &str = "limiter_threshold";
    pub const LIMITER_RELEASE: &str = "limiter_release";

    // Compander
    pub const COMPANDER_ENABLE: &str = "compander_enable";
    pub const COMPANDER_TIMECONSTANT: &str = "compander_timeconstant";
    pub const COMPANDER_GRANULARITY: &str = "compander_granularity";
    pub const COMPANDER_TFTRANSFORMS: &str = "compander_tftransforms";
    pub const COMPANDER_RESPONSE: &str = "compander_response";
}

/// Persistent key/value storage, grouped by namespace
///
/// Implementations must apply a `set_many` batch as one commit: readers never
/// observe half of a batch.
pub trait KeyValueStore: Send + Sync {
    /// Read a raw value, `Ok(None)` if the key is absent
    fn get(&self, namespace: Namespace, key: &str) -> Result<Option<Value>>;

    /// Commit several values in one namespace
    fn set_many(&self, namespace: Namespace, entries: &[(&str, Value)]) -> Result<()>;

    /// Remove a key; removing an absent key is not an error
    fn remove(&self, namespace: Namespace, key: &str) -> Result<()>;

    /// Commit a single value
    fn set(&self, namespace: Namespace, key: &str, value: Value) -> Result<()> {
        self.set_many(namespace, &[(key, value)])
    }
}

/// Typed accessors over any [`KeyValueStore`]
///
/// Numeric getters accept numbers or numeric strings. Strings go through
/// `f32::from_str`, so corrupted entries such as `"NaN"` surface as non-finite
/// floats; callers that need finite values must check.
pub trait PreferencesExt {
    fn get_f32(&self, namespace: Namespace, key: &str) -> Result<Option<f32>>;
    fn get_bool(&self, namespace: Namespace, key: &str) -> Result<Option<bool>>;
    fn get_u32(&self, namespace: Namespace, key: &str) -> Result<Option<u32>>;
    fn get_string(&self, namespace: Namespace, key: &str) -> Result<Option<String>>;
}

impl<S: KeyValueStore + ?Sized> PreferencesExt for S {
    fn get_f32(&self, namespace: Namespace, key: &str) -> Result<Option<f32>> {
        Ok(self.get(namespace, key)?.and_then(|v| match v {
            Value::Number(n) => n.as_f64().map(|f| f as f32),
            Value::String(s) => s.trim().parse::<f32>().ok(),
            _ => None,
        }))
    }

    fn get_bool(&self, namespace: Namespace, key: &str) -> Result<Option<bool>> {
        Ok(self.get(namespace, key)?.and_then(|v| match v {
            Value::Bool(b) => Some(b),
            Value::String(s) => match s.to_lowercase().as_str() {
                "true" | "on" | "1" => Some(true),
                "false" | "off" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }))
    }

    fn get_u32(&self, namespace: Namespace, key: &str) -> Result<Option<u32>> {
        Ok(self.get(namespace, key)?.and_then(|v| match v {
            Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
            Value::String(s) => s.trim().parse::<u32>().ok(),
            _ => None,
        }))
    }

    fn get_string(&self, namespace: Namespace, key: &str) -> Result<Option<String>> {
        Ok(self.get(namespace, key)?.and_then(|v| match v {
            Value::String(s) => Some(s),
            Value::Null => None,
            other => Some(other.to_string()),
        }))
    }
}

/// In-memory store, used by tests and as a scratch store
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<(Namespace, String), Value>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries across all namespaces
    pub fn len(&self) -> usize {
        self.values.read().map(|v| v.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, namespace: Namespace, key: &str) -> Result<Option<Value>> {
        let values = self
            .values
            .read()
            .map_err(|_| CoreError::storage("preference lock poisoned"))?;
        Ok(values.get(&(namespace, key.to_string())).cloned())
    }

    fn set_many(&self, namespace: Namespace, entries: &[(&str, Value)]) -> Result<()> {
        let mut values = self
            .values
            .write()
            .map_err(|_| CoreError::storage("preference lock poisoned"))?;
        for (key, value) in entries {
            values.insert((namespace, (*key).to_string()), value.clone());
        }
        Ok(())
    }

    fn remove(&self, namespace: Namespace, key: &str) -> Result<()> {
        let mut values = self
            .values
            .write()
            .map_err(|_| CoreError::storage("preference lock poisoned"))?;
        values.remove(&(namespace, key.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_namespace_round_trip() {
        for ns in Namespace::ALL {
            assert_eq!(Namespace::from_str(ns.as_str()), Some(ns));
        }
        assert_eq!(Namespace::from_str("dsp_unknown"), None);
    }

    #[test]
    fn test_typed_getters() {
        let store = MemoryStore::new();
        store
            .set_many(
                Namespace::App,
                &[
                    ("f", json!(72.5)),
                    ("b", json!(true)),
                    ("u", json!(7)),
                    ("s", json!("Convolver/a.wav")),
                ],
            )
            .unwrap();

        assert_eq!(store.get_f32(Namespace::App, "f").unwrap(), Some(72.5));
        assert_eq!(store.get_bool(Namespace::App, "b").unwrap(), Some(true));
        assert_eq!(store.get_u32(Namespace::App, "u").unwrap(), Some(7));
        assert_eq!(
            store.get_string(Namespace::App, "s").unwrap().as_deref(),
            Some("Convolver/a.wav")
        );
        assert_eq!(store.get_f32(Namespace::App, "missing").unwrap(), None);
    }

    #[test]
    fn test_namespaces_are_isolated() {
        let store = MemoryStore::new();
        store.set(Namespace::Convolver, "k", json!(1)).unwrap();
        assert!(store.get(Namespace::Liveprog, "k").unwrap().is_none());
        assert!(store.get(Namespace::Convolver, "k").unwrap().is_some());
    }

    #[test]
    fn test_corrupted_float_string_is_not_finite() {
        let store = MemoryStore::new();
        store.set(Namespace::App, "f", json!("NaN")).unwrap();
        let value = store.get_f32(Namespace::App, "f").unwrap().unwrap();
        assert!(value.is_nan());
    }

    #[test]
    fn test_remove() {
        let store = MemoryStore::new();
        store.set(Namespace::App, "k", json!(1)).unwrap();
        store.remove(Namespace::App, "k").unwrap();
        store.remove(Namespace::App, "k").unwrap();
        assert!(store.is_empty());
    }
}
