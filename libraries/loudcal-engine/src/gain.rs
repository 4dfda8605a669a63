//! Gain equation and FIR filter selection
//!
//! System output stays at full volume; all loudness control happens through
//! one negative Liveprog gain:
//!
//! ```text
//! actual     = target - rms_offset
//! clamped    = clamp(actual, 40, 90)
//! fir        = fir_compensation(clamped, reference)   (0 when disabled)
//! attenuation = max_spl - target
//! total_db   = -attenuation + fir + calibration_offset
//! ```
//!
//! # Example
//!
//! ```
//! use loudcal_engine::gain::compute_gain;
//! use loudcal_engine::profile::CalibrationProfile;
//!
//! let breakdown = compute_gain(&CalibrationProfile::default());
//! assert!((breakdown.total_gain_db - (-88.26)).abs() < 1e-3);
//! ```

use crate::preamp::fir_compensation;
use crate::profile::CalibrationProfile;
use serde::Serialize;

/// Lowest phon the filter set covers
pub const FILTER_MIN_PHON: f32 = 40.0;
/// Highest phon the filter set covers
pub const FILTER_MAX_PHON: f32 = 90.0;

/// Directory (relative to the DSP root) holding the FIR filters
pub const CONVOLVER_DIR: &str = "Convolver";

/// Convert decibels to a linear amplitude factor
pub fn db_to_linear(db: f32) -> f32 {
    (db * std::f32::consts::LN_10 / 20.0).exp()
}

/// Every term of the gain equation for one profile
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GainBreakdown {
    pub actual_phon: f32,
    pub clamped_actual_phon: f32,
    pub fir_compensation_db: f32,
    pub attenuation_db: f32,
    pub calibration_offset_db: f32,
    pub total_gain_db: f32,
}

impl GainBreakdown {
    pub fn linear_gain(&self) -> f32 {
        db_to_linear(self.total_gain_db)
    }
}

/// Evaluate the gain equation; a pure function of the profile
pub fn compute_gain(profile: &CalibrationProfile) -> GainBreakdown {
    let actual_phon = profile.actual_phon();
    let clamped_actual_phon = actual_phon.clamp(FILTER_MIN_PHON, FILTER_MAX_PHON);
    let fir_compensation_db = if profile.fir_compensation_enabled {
        fir_compensation(clamped_actual_phon, profile.reference_phon)
    } else {
        0.0
    };
    let attenuation_db = profile.max_spl - profile.target_phon;
    let total_gain_db = -attenuation_db + fir_compensation_db + profile.calibration_offset;

    GainBreakdown {
        actual_phon,
        clamped_actual_phon,
        fir_compensation_db,
        attenuation_db,
        calibration_offset_db: profile.calibration_offset,
        total_gain_db,
    }
}

/// Round a reference to the filter set's 75/80/85/90 grid
pub fn round_reference_phon(reference_phon: f32) -> f32 {
    if reference_phon < 77.5 {
        75.0
    } else if reference_phon < 82.5 {
        80.0
    } else if reference_phon < 87.5 {
        85.0
    } else {
        90.0
    }
}

/// Reference curve used when auto-reference is on
pub fn auto_reference_phon(target_phon: f32) -> f32 {
    if target_phon < 85.0 {
        80.0
    } else if target_phon < 90.0 {
        85.0
    } else {
        90.0
    }
}

/// FIR filter chosen for a profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterSelection {
    /// Asset file name, e.g. `50.0-80.0_filter.wav`
    pub file_name: String,
}

impl FilterSelection {
    /// Path stored in the convolver preferences
    pub fn preference_path(&self) -> String {
        format!("{}/{}", CONVOLVER_DIR, self.file_name)
    }
}

/// File name of the filter for a clamped actual phon and a reference
pub fn filter_file_name(clamped_actual_phon: f32, reference_phon: f32) -> String {
    if clamped_actual_phon >= FILTER_MAX_PHON {
        return "90.0-90.0_filter.wav".to_string();
    }
    // Ties round up, so 62.25 names the 62.3 filter
    let tenths = (clamped_actual_phon * 10.0).round() / 10.0;
    format!(
        "{:.1}-{:.1}_filter.wav",
        tenths,
        round_reference_phon(reference_phon)
    )
}

pub fn select_filter(profile: &CalibrationProfile) -> FilterSelection {
    let clamped = profile.actual_phon().clamp(FILTER_MIN_PHON, FILTER_MAX_PHON);
    FilterSelection {
        file_name: filter_file_name(clamped, profile.reference_phon),
    }
}
