//! Calibration wizard integration tests

mod common;

use common::{missing_sinks, null_sinks, Harness};
use loudcal_core::prefs::keys;
use loudcal_core::{AudioStream, Namespace, PreferencesExt};
use loudcal_engine::calibration::reference_tone_amplitude;
use loudcal_engine::script::{bypass_script, calibrated_script};
use loudcal_engine::{compute_gain, CalibrationStep, CalibrationWizard, EngineError, TestTonePlayer};

fn wizard() -> CalibrationWizard {
    CalibrationWizard::new(null_sinks()).with_tone(TestTonePlayer::new().with_seed(1))
}

#[tokio::test(start_paused = true)]
async fn test_full_calibration_flow() {
    let mut h = Harness::new();
    let mut wizard = wizard();

    wizard.start(&mut h.controller).unwrap();
    assert_eq!(wizard.step(), CalibrationStep::MaxSpl);
    assert!(h.controller.is_calibrating());
    assert!(!h.controller.controls_enabled());
    assert!(wizard.tone().is_playing());
    assert_eq!(wizard.tone().amplitude(), 1.0);

    let effective = h.controller.effective_profile();
    assert_eq!(effective.target_phon, 90.0);
    assert_eq!(effective.reference_phon, 90.0);
    assert_eq!(effective.max_spl, 125.0);
    assert_eq!(effective.calibration_offset, 0.0);
    assert!(effective.loudness_enabled);

    h.controller.wait_idle().await;
    assert_eq!(
        h.fs.script().unwrap(),
        calibrated_script(compute_gain(&effective).total_gain_db)
    );
    assert!(h.volume.sets_for(AudioStream::Music).is_empty());

    let err = wizard
        .save_measurement(&mut h.controller, 200.0)
        .unwrap_err();
    assert!(matches!(err, EngineError::MeasurementOutOfRange { .. }));
    assert_eq!(wizard.step(), CalibrationStep::MaxSpl);

    let step = wizard.save_measurement(&mut h.controller, 100.0).unwrap();
    assert_eq!(step, CalibrationStep::Reference);
    assert_eq!(h.controller.max_spl(), 100.0);
    assert_eq!(wizard.max_spl_measurement(), Some(100.0));
    assert!(wizard.tone().is_playing());
    assert!((wizard.tone().amplitude() - 10f32.powf(-25.0 / 20.0)).abs() < 1e-6);

    let effective = h.controller.effective_profile();
    assert_eq!(effective.target_phon, 75.0);
    assert_eq!(effective.reference_phon, 75.0);
    assert_eq!(effective.max_spl, 100.0);
    h.controller.wait_idle().await;
    assert!(h.volume.sets_for(AudioStream::Music).is_empty());

    let step = wizard.save_measurement(&mut h.controller, 78.0).unwrap();
    assert_eq!(step, CalibrationStep::Idle);
    assert_eq!(h.controller.calibration_offset(), -3.0);
    assert!(!wizard.tone().is_playing());
    assert!(h.controller.controls_enabled());
    assert_eq!(h.controller.effective_profile().target_phon, 60.0);

    h.controller.wait_idle().await;
    assert_eq!(h.fs.script().unwrap(), bypass_script());
    assert_eq!(h.volume.sets_for(AudioStream::Music), vec![0, 10]);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_keeps_completed_steps() {
    let mut h = Harness::new();
    let mut wizard = wizard();

    wizard.start(&mut h.controller).unwrap();
    wizard.save_measurement(&mut h.controller, 104.0).unwrap();
    wizard.cancel(&mut h.controller).unwrap();

    assert_eq!(wizard.step(), CalibrationStep::Idle);
    assert!(!wizard.tone().is_playing());
    assert!(!h.controller.is_calibrating());
    assert_eq!(h.controller.max_spl(), 104.0);
    assert_eq!(h.controller.calibration_offset(), 0.0);
    h.controller.wait_idle().await;
}

#[tokio::test(start_paused = true)]
async fn test_start_turns_on_master_switch() {
    let mut h = Harness::new();
    let mut wizard = wizard();
    assert_eq!(h.store.get_bool(Namespace::App, keys::POWERED_ON).unwrap(), None);
    let mut updates = h.bus.subscribe();

    wizard.start(&mut h.controller).unwrap();
    h.controller.wait_idle().await;

    assert_eq!(
        h.store.get_bool(Namespace::App, keys::POWERED_ON).unwrap(),
        Some(true)
    );
    let update = updates.try_recv().unwrap();
    assert!(update.namespaces.contains(&Namespace::App));

    wizard.cancel(&mut h.controller).unwrap();
    h.controller.wait_idle().await;
}

#[tokio::test(start_paused = true)]
async fn test_low_max_spl_reading_follows_clamped_value() {
    let mut h = Harness::new();
    let mut wizard = wizard();

    wizard.start(&mut h.controller).unwrap();
    let step = wizard.save_measurement(&mut h.controller, 50.0).unwrap();

    assert_eq!(step, CalibrationStep::Reference);
    assert_eq!(h.controller.max_spl(), 60.0);
    assert_eq!(wizard.max_spl_measurement(), Some(60.0));
    // Below 75 dB the reference tone is already at full scale
    assert_eq!(
        wizard.tone().amplitude(),
        reference_tone_amplitude(60.0).min(1.0)
    );

    wizard.cancel(&mut h.controller).unwrap();
    h.controller.wait_idle().await;
}

#[tokio::test(start_paused = true)]
async fn test_operations_require_active_session() {
    let mut h = Harness::new();
    let mut wizard = wizard();

    assert!(matches!(
        wizard.save_measurement(&mut h.controller, 80.0),
        Err(EngineError::CalibrationNotActive)
    ));
    assert!(matches!(
        wizard.cancel(&mut h.controller),
        Err(EngineError::CalibrationNotActive)
    ));
}

#[tokio::test(start_paused = true)]
async fn test_start_twice_is_rejected() {
    let mut h = Harness::new();
    let mut wizard = wizard();

    wizard.start(&mut h.controller).unwrap();
    assert!(matches!(
        wizard.start(&mut h.controller),
        Err(EngineError::CalibrationInProgress)
    ));
    assert_eq!(wizard.step(), CalibrationStep::MaxSpl);
    wizard.cancel(&mut h.controller).unwrap();
    h.controller.wait_idle().await;
}

#[tokio::test(start_paused = true)]
async fn test_runs_without_test_tone_device() {
    let mut h = Harness::new();
    let mut wizard = CalibrationWizard::new(missing_sinks());

    wizard.start(&mut h.controller).unwrap();
    assert_eq!(wizard.step(), CalibrationStep::MaxSpl);
    assert!(!wizard.tone().is_playing());

    wizard.save_measurement(&mut h.controller, 95.0).unwrap();
    wizard.save_measurement(&mut h.controller, 75.0).unwrap();
    assert_eq!(h.controller.max_spl(), 95.0);
    assert_eq!(h.controller.calibration_offset(), 0.0);
    h.controller.wait_idle().await;
}
