//! FIR filter preamp table
//!
//! The loudness FIR filters are normalized at 1 kHz, so each one changes the
//! overall level by a known amount. The table below holds that amount (dB,
//! always negative) per reference curve and target phon; the gain equation
//! adds it back into the Liveprog gain.
//!
//! Lookup snaps to the nearest reference curve and interpolates over target
//! phon within that curve.

use crate::interpolation::interpolate;

/// Reference curves the filter set was designed against
pub const REFERENCE_BUCKETS: [f32; 4] = [75.0, 80.0, 85.0, 90.0];

/// Target phon keys shared by every reference curve
pub const TARGET_KEYS: [f32; 12] = [
    40.0, 45.0, 50.0, 55.0, 60.0, 65.0, 67.0, 70.0, 75.0, 80.0, 85.0, 90.0,
];

/// Preamp in dB, one row per entry of [`REFERENCE_BUCKETS`]
const PREAMP_DB: [[f32; 12]; 4] = [
    [
        -25.06, -22.82, -20.60, -18.43, -16.29, -14.13, -13.28, -12.02, -10.00, -8.07, -6.24, -4.50,
    ],
    [
        -27.72, -25.48, -23.26, -21.08, -18.95, -16.79, -15.94, -14.68, -12.66, -10.73, -8.90,
        -7.16,
    ],
    [
        -30.18, -27.94, -25.72, -23.54, -21.40, -19.25, -18.40, -17.14, -15.12, -13.19, -11.36,
        -9.62,
    ],
    [
        -32.48, -30.24, -28.02, -25.84, -23.71, -21.55, -20.70, -19.44, -17.42, -15.49, -13.66,
        -11.92,
    ],
];

/// Output level measured at reference 80, keyed by target phon
const MEASURED_SPL: [(f32, f32); 6] = [
    (40.0, 59.3),
    (50.0, 65.4),
    (60.0, 71.8),
    (70.0, 77.7),
    (80.0, 83.0),
    (90.0, 88.3),
];

/// Reference bucket closest to `reference_phon` (ties go to the lower bucket)
pub fn nearest_reference_bucket(reference_phon: f32) -> f32 {
    REFERENCE_BUCKETS[nearest_bucket_index(reference_phon)]
}

fn nearest_bucket_index(reference_phon: f32) -> usize {
    let mut best = 0;
    for (i, bucket) in REFERENCE_BUCKETS.iter().enumerate().skip(1) {
        if (bucket - reference_phon).abs() < (REFERENCE_BUCKETS[best] - reference_phon).abs() {
            best = i;
        }
    }
    best
}

/// The `(target phon, preamp dB)` curve for the bucket nearest `reference_phon`
pub fn preamp_curve(reference_phon: f32) -> [(f32, f32); 12] {
    let row = &PREAMP_DB[nearest_bucket_index(reference_phon)];
    std::array::from_fn(|i| (TARGET_KEYS[i], row[i]))
}

/// FIR preamp compensation in dB for a target on a reference curve
pub fn fir_compensation(target_phon: f32, reference_phon: f32) -> f32 {
    interpolate(&preamp_curve(reference_phon), target_phon)
}

/// Expected real output level (dB SPL) for a target phon
///
/// Based on measurements taken at reference 80; used for display only.
pub fn estimate_output_spl(target_phon: f32) -> f32 {
    interpolate(&MEASURED_SPL, target_phon)
}
