//! Two-step calibration wizard
//!
//! Step 1 plays pink noise at full scale with the chain forced to 90/90
//! phon and no calibration, and records the measured SPL as the max SPL.
//! Step 2 drops to 75/75 phon, scales the tone so it should read 75 dB, and
//! stores `75 - measured` as the calibration offset.
//!
//! While a session runs the controller holds a temporary override, flushes
//! without muting, and reports its main controls as disabled.

use crate::controller::{CalibrationOverride, LoudnessController};
use crate::error::{EngineError, Result};
use crate::tone::{SinkFactory, TestTonePlayer};
use serde::Serialize;
use std::ops::RangeInclusive;
use std::sync::Arc;
use tracing::{info, warn};

/// Accepted meter readings
pub const MEASUREMENT_RANGE: RangeInclusive<f32> = 40.0..=130.0;
/// Target and reference during the max SPL step
pub const MAX_SPL_STEP_PHON: f32 = 90.0;
/// Target, reference and expected reading during the reference step
pub const REFERENCE_STEP_PHON: f32 = 75.0;
/// Max SPL assumed before the first measurement
pub const UNCALIBRATED_MAX_SPL: f32 = 125.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationStep {
    Idle,
    MaxSpl,
    Reference,
}

impl CalibrationStep {
    pub fn number(&self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::MaxSpl => 1,
            Self::Reference => 2,
        }
    }

    pub fn instructions(&self) -> &'static str {
        match self {
            Self::Idle => "Press start to begin calibration.",
            Self::MaxSpl => {
                "Step 1 of 2: measure the pink noise with an SPL meter and enter the reading."
            }
            Self::Reference => {
                "Step 2 of 2: measure the pink noise again; it should read about 75 dB."
            }
        }
    }
}

/// Reject readings outside [`MEASUREMENT_RANGE`]
pub fn validate_measurement(measured_spl: f32) -> Result<f32> {
    if measured_spl.is_finite() && MEASUREMENT_RANGE.contains(&measured_spl) {
        Ok(measured_spl)
    } else {
        Err(EngineError::MeasurementOutOfRange {
            value: measured_spl,
            min: *MEASUREMENT_RANGE.start(),
            max: *MEASUREMENT_RANGE.end(),
        })
    }
}

/// Tone amplitude that should read 75 dB given the full-scale reading
pub fn reference_tone_amplitude(max_spl_measurement: f32) -> f32 {
    10f32.powf(-(max_spl_measurement - REFERENCE_STEP_PHON) / 20.0)
}

/// Human-readable summary of a calibration offset
///
/// The offset is `expected - measured`, so a negative value means the
/// system plays louder than expected.
pub fn describe_offset(offset: f32) -> String {
    if offset.abs() < 0.05 {
        "System matches the expected level".to_string()
    } else if offset < 0.0 {
        format!("System is {:.1} dB louder than expected", -offset)
    } else {
        format!("System is {:.1} dB quieter than expected", offset)
    }
}

pub struct CalibrationWizard {
    step: CalibrationStep,
    max_spl_measurement: Option<f32>,
    tone: TestTonePlayer,
    sinks: Arc<dyn SinkFactory>,
}

impl CalibrationWizard {
    pub fn new(sinks: Arc<dyn SinkFactory>) -> Self {
        Self {
            step: CalibrationStep::Idle,
            max_spl_measurement: None,
            tone: TestTonePlayer::new(),
            sinks,
        }
    }

    /// Replace the tone player, e.g. with a seeded one
    pub fn with_tone(mut self, tone: TestTonePlayer) -> Self {
        self.tone = tone;
        self
    }

    pub fn step(&self) -> CalibrationStep {
        self.step
    }

    pub fn is_active(&self) -> bool {
        self.step != CalibrationStep::Idle
    }

    pub fn max_spl_measurement(&self) -> Option<f32> {
        self.max_spl_measurement
    }

    pub fn tone(&self) -> &TestTonePlayer {
        &self.tone
    }

    /// Enter step 1 and start the full-scale tone
    pub fn start(&mut self, controller: &mut LoudnessController) -> Result<()> {
        if self.is_active() {
            return Err(EngineError::CalibrationInProgress);
        }

        controller.begin_calibration(CalibrationOverride {
            target_phon: MAX_SPL_STEP_PHON,
            reference_phon: MAX_SPL_STEP_PHON,
            max_spl: Some(UNCALIBRATED_MAX_SPL),
            calibration_offset: 0.0,
        });
        self.step = CalibrationStep::MaxSpl;
        self.max_spl_measurement = None;
        info!("Calibration started");

        self.play_tone(1.0);
        Ok(())
    }

    /// Record the meter reading for the current step
    ///
    /// Returns the step the wizard is in afterwards. An out-of-range
    /// reading leaves the step unchanged.
    pub fn save_measurement(
        &mut self,
        controller: &mut LoudnessController,
        measured_spl: f32,
    ) -> Result<CalibrationStep> {
        match self.step {
            CalibrationStep::Idle => Err(EngineError::CalibrationNotActive),
            CalibrationStep::MaxSpl => {
                let reading = validate_measurement(measured_spl)?;
                self.tone.stop();
                controller.set_max_spl(reading)?;
                // The controller clamps; the reference tone follows what it kept
                let measured = controller.max_spl();
                if measured != reading {
                    warn!(
                        "Max SPL reading {:.1} dB clamped to {:.1} dB",
                        reading, measured
                    );
                }
                self.max_spl_measurement = Some(measured);
                info!("Max SPL measured at {:.1} dB", measured);

                controller.begin_calibration(CalibrationOverride {
                    target_phon: REFERENCE_STEP_PHON,
                    reference_phon: REFERENCE_STEP_PHON,
                    max_spl: None,
                    calibration_offset: 0.0,
                });
                self.step = CalibrationStep::Reference;
                self.play_tone(reference_tone_amplitude(measured));
                Ok(self.step)
            }
            CalibrationStep::Reference => {
                let measured = validate_measurement(measured_spl)?;
                self.tone.stop();
                controller.set_calibration_offset(REFERENCE_STEP_PHON - measured)?;
                info!("Calibration finished: {}", controller.calibration_summary());
                self.finish(controller);
                Ok(self.step)
            }
        }
    }

    /// Abandon the session; values saved by earlier steps are kept
    pub fn cancel(&mut self, controller: &mut LoudnessController) -> Result<()> {
        if !self.is_active() {
            return Err(EngineError::CalibrationNotActive);
        }
        self.tone.stop();
        self.finish(controller);
        info!("Calibration cancelled");
        Ok(())
    }

    fn finish(&mut self, controller: &mut LoudnessController) {
        self.step = CalibrationStep::Idle;
        self.max_spl_measurement = None;
        controller.end_calibration();
    }

    fn play_tone(&mut self, amplitude: f32) {
        let started = self
            .sinks
            .open()
            .and_then(|sink| self.tone.start(sink, amplitude));
        if let Err(e) = started {
            warn!("Test tone unavailable, continuing without it: {}", e);
        }
    }
}
