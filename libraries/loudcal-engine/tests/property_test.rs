//! Property-based tests for the gain equation and curve interpolation

use loudcal_engine::gain::{compute_gain, select_filter, FILTER_MAX_PHON, FILTER_MIN_PHON};
use loudcal_engine::interpolation::interpolate;
use loudcal_engine::preamp::{fir_compensation, REFERENCE_BUCKETS, TARGET_KEYS};
use loudcal_engine::CalibrationProfile;
use proptest::prelude::*;

fn profile() -> impl Strategy<Value = CalibrationProfile> {
    (
        40.0f32..=125.0,
        75.0f32..=90.0,
        60.0f32..=130.0,
        -30.0f32..=30.0,
        0.0f32..=14.0,
        any::<bool>(),
    )
        .prop_map(
            |(target_phon, reference_phon, max_spl, calibration_offset, rms_offset, fir)| {
                CalibrationProfile {
                    target_phon,
                    reference_phon,
                    max_spl,
                    calibration_offset,
                    rms_offset,
                    fir_compensation_enabled: fir,
                    ..Default::default()
                }
            },
        )
}

proptest! {
    /// Property: the gain is a pure function of the profile
    #[test]
    fn gain_is_deterministic(p in profile()) {
        prop_assert_eq!(compute_gain(&p), compute_gain(&p));
        prop_assert_eq!(select_filter(&p), select_filter(&p));
    }

    /// Property: attenuation is max SPL minus target and enters negated
    #[test]
    fn attenuation_lowers_gain(p in profile()) {
        let breakdown = compute_gain(&p);
        prop_assert_eq!(breakdown.attenuation_db, p.max_spl - p.target_phon);
        let expected = -breakdown.attenuation_db
            + breakdown.fir_compensation_db
            + breakdown.calibration_offset_db;
        prop_assert!((breakdown.total_gain_db - expected).abs() < 1e-4);
    }

    /// Property: the filter lookup always stays inside the filter set
    #[test]
    fn clamped_phon_stays_in_filter_range(p in profile()) {
        let breakdown = compute_gain(&p);
        prop_assert!(breakdown.clamped_actual_phon >= FILTER_MIN_PHON);
        prop_assert!(breakdown.clamped_actual_phon <= FILTER_MAX_PHON);
        prop_assert!(select_filter(&p).file_name.ends_with("_filter.wav"));
    }

    /// Property: interpolation stays between neighbouring table values
    #[test]
    fn interpolation_is_bounded_inside_table(
        x in 40.0f32..=90.0,
        bucket in 0usize..4,
    ) {
        let reference = REFERENCE_BUCKETS[bucket];
        let y = fir_compensation(x, reference);

        let upper = TARGET_KEYS.iter().position(|k| *k >= x).unwrap_or(TARGET_KEYS.len() - 1);
        let lower = upper.saturating_sub(1);
        let a = fir_compensation(TARGET_KEYS[lower], reference);
        let b = fir_compensation(TARGET_KEYS[upper], reference);
        prop_assert!(y >= a.min(b) - 1e-3 && y <= a.max(b) + 1e-3);
    }

    /// Property: exact keys return their table value
    #[test]
    fn interpolation_hits_exact_keys(index in 0usize..5) {
        let table = [(10.0f32, 1.0f32), (20.0, 4.0), (30.0, 9.0), (40.0, 16.0), (50.0, 25.0)];
        let (x, y) = table[index];
        prop_assert_eq!(interpolate(&table, x), y);
    }
}
