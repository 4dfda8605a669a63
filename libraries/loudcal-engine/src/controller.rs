//! Loudness controller
//!
//! Owns the calibration profile and drives everything downstream of it.
//! Every setter clamps its input, persists the profile, and schedules a
//! debounced flush that writes the gain script and filter preferences while
//! the music stream is briefly muted.
//!
//! # Flush scheduling
//!
//! ```text
//! setter ─► persist ─► Debouncer (50 ms) ─► mute ─► emit ─► restore
//!                          ▲
//!        next setter ──────┘ (aborts and reschedules)
//! ```
//!
//! During calibration a temporary override replaces target, reference and
//! the calibrated chain, and flushes skip the mute so the test tone plays
//! without interruption.
//!
//! Persistence failures are logged and never roll back the in-memory
//! profile; the next setter writes the full profile again.

use crate::calibration::describe_offset;
use crate::config::EngineConfig;
use crate::emitter::{ConfigEmitter, Emission};
use crate::error::{EngineError, Result};
use crate::gain::{auto_reference_phon, compute_gain, select_filter, FilterSelection, GainBreakdown};
use crate::mute::MuteCoordinator;
use crate::preamp::estimate_output_spl;
use crate::profile::{
    clamp_to, CalibrationProfile, ProfileSlot, CALIBRATION_OFFSET_RANGE, DEFAULT_CALIBRATION_OFFSET,
    DEFAULT_MAX_SPL, MAX_SPL_RANGE, REFERENCE_PHON_RANGE, RMS_OFFSET_RANGE, TARGET_PHON_USER_RANGE,
};
use crate::safe_volume::SafeVolumeCoordinator;
use crate::safety::SafetyLevel;
use crate::scheduler::Debouncer;
use crate::script::GainScript;
use loudcal_core::prefs::keys;
use loudcal_core::{
    FileSystem, KeyValueStore, Namespace, PreferencesBus, PreferencesExt, VolumeControl,
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Reference adjustment per step
pub const REFERENCE_STEP_PHON: f32 = 1.0;

/// Collaborators the controller reaches through interfaces
#[derive(Clone)]
pub struct EngineContext {
    pub store: Arc<dyn KeyValueStore>,
    pub fs: Arc<dyn FileSystem>,
    pub volume: Arc<dyn VolumeControl>,
    pub bus: PreferencesBus,
}

/// Calibration values layered over the persisted profile
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationOverride {
    pub target_phon: f32,
    pub reference_phon: f32,
    /// Replaces the persisted max SPL when set
    pub max_spl: Option<f32>,
    pub calibration_offset: f32,
}

/// Whether the selected FIR filter is present under the DSP root
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterStatus {
    pub path: String,
    pub exists: bool,
}

pub struct LoudnessController {
    profile: CalibrationProfile,
    calibration: Option<CalibrationOverride>,
    store: Arc<dyn KeyValueStore>,
    bus: PreferencesBus,
    emitter: Arc<ConfigEmitter>,
    mute: Arc<MuteCoordinator>,
    safe_volume: SafeVolumeCoordinator,
    debouncer: Debouncer,
}

impl LoudnessController {
    /// Create a controller, loading the persisted profile
    ///
    /// A profile that cannot be read is replaced with defaults.
    pub fn new(ctx: EngineContext, config: EngineConfig) -> Self {
        let profile = CalibrationProfile::load(ctx.store.as_ref()).unwrap_or_else(|e| {
            error!("Failed to load loudness profile, using defaults: {}", e);
            CalibrationProfile::default()
        });
        debug!("Loaded loudness profile: {:?}", profile);

        Self {
            profile,
            calibration: None,
            emitter: Arc::new(ConfigEmitter::new(
                Arc::clone(&ctx.fs),
                Arc::clone(&ctx.store),
                ctx.bus.clone(),
            )),
            mute: Arc::new(MuteCoordinator::new(
                Arc::clone(&ctx.volume),
                config.mute_settle,
                config.restore_delay,
            )),
            safe_volume: SafeVolumeCoordinator::new(Arc::clone(&ctx.store), ctx.volume),
            debouncer: Debouncer::new(config.debounce),
            store: ctx.store,
            bus: ctx.bus,
        }
    }

    // ===== Getters =====

    /// Persisted profile (without any calibration override)
    pub fn profile(&self) -> &CalibrationProfile {
        &self.profile
    }

    pub fn target_phon(&self) -> f32 {
        self.profile.target_phon
    }

    pub fn reference_phon(&self) -> f32 {
        self.profile.reference_phon
    }

    pub fn max_spl(&self) -> f32 {
        self.profile.max_spl
    }

    pub fn calibration_offset(&self) -> f32 {
        self.profile.calibration_offset
    }

    pub fn rms_offset(&self) -> f32 {
        self.profile.rms_offset
    }

    pub fn is_auto_reference_enabled(&self) -> bool {
        self.profile.auto_reference_enabled
    }

    pub fn is_fir_compensation_enabled(&self) -> bool {
        self.profile.fir_compensation_enabled
    }

    pub fn is_loudness_enabled(&self) -> bool {
        self.profile.loudness_enabled
    }

    pub fn actual_phon(&self) -> f32 {
        self.profile.actual_phon()
    }

    /// Profile the next flush will use, calibration override applied
    pub fn effective_profile(&self) -> CalibrationProfile {
        let mut profile = self.profile.clone();
        if let Some(ov) = self.calibration {
            profile.target_phon = ov.target_phon;
            profile.reference_phon = ov.reference_phon;
            if let Some(max_spl) = ov.max_spl {
                profile.max_spl = max_spl;
            }
            profile.calibration_offset = ov.calibration_offset;
            profile.loudness_enabled = true;
        }
        profile
    }

    pub fn gain_breakdown(&self) -> GainBreakdown {
        compute_gain(&self.effective_profile())
    }

    pub fn filter_selection(&self) -> FilterSelection {
        select_filter(&self.effective_profile())
    }

    /// Selected filter and whether its asset exists
    pub fn filter_status(&self) -> FilterStatus {
        let filter = self.filter_selection();
        FilterStatus {
            exists: self.emitter.filter_exists(&filter),
            path: filter.preference_path(),
        }
    }

    /// Expected real output level for the current target
    pub fn estimated_output_spl(&self) -> f32 {
        estimate_output_spl(self.profile.target_phon)
    }

    pub fn safety_level(&self) -> SafetyLevel {
        SafetyLevel::from_spl(self.actual_phon())
    }

    pub fn is_calibrating(&self) -> bool {
        self.calibration.is_some()
    }

    /// Main controls are disabled while a calibration session runs
    pub fn controls_enabled(&self) -> bool {
        !self.is_calibrating()
    }

    pub fn safe_volume(&self) -> &SafeVolumeCoordinator {
        &self.safe_volume
    }

    pub fn is_muting(&self) -> bool {
        self.mute.is_muting()
    }

    pub fn has_pending_flush(&self) -> bool {
        self.debouncer.is_pending()
    }

    /// Describe the calibration offset for display
    pub fn calibration_summary(&self) -> String {
        describe_offset(self.profile.calibration_offset)
    }

    // ===== Setters =====

    pub fn set_target_phon(&mut self, target_phon: f32) -> Result<()> {
        let target_phon = finite("target_phon", target_phon)?;
        self.profile.target_phon = clamp_to(target_phon, &TARGET_PHON_USER_RANGE);
        if self.profile.auto_reference_enabled {
            self.profile.reference_phon = auto_reference_phon(self.profile.target_phon);
        }
        self.commit();
        Ok(())
    }

    /// Add `delta` to the target phon
    pub fn adjust_target_phon(&mut self, delta: f32) -> Result<()> {
        self.set_target_phon(self.profile.target_phon + delta)
    }

    /// Set the reference curve; ignored while auto-reference is on
    pub fn set_reference_phon(&mut self, reference_phon: f32) -> Result<()> {
        let reference_phon = finite("reference_phon", reference_phon)?;
        if self.profile.auto_reference_enabled {
            debug!("Auto-reference enabled, ignoring reference {}", reference_phon);
            return Ok(());
        }
        self.profile.reference_phon = clamp_to(reference_phon, &REFERENCE_PHON_RANGE);
        self.commit();
        Ok(())
    }

    pub fn increase_reference_phon(&mut self) -> Result<()> {
        self.set_reference_phon(self.profile.reference_phon + REFERENCE_STEP_PHON)
    }

    pub fn decrease_reference_phon(&mut self) -> Result<()> {
        self.set_reference_phon(self.profile.reference_phon - REFERENCE_STEP_PHON)
    }

    pub fn set_max_spl(&mut self, max_spl: f32) -> Result<()> {
        let max_spl = finite("max_spl", max_spl)?;
        self.profile.max_spl = clamp_to(max_spl, &MAX_SPL_RANGE);
        self.commit();
        Ok(())
    }

    pub fn set_calibration_offset(&mut self, offset: f32) -> Result<()> {
        let offset = finite("calibration_offset", offset)?;
        self.profile.calibration_offset = clamp_to(offset, &CALIBRATION_OFFSET_RANGE);
        self.commit();
        Ok(())
    }

    pub fn set_rms_offset(&mut self, rms_offset: f32) -> Result<()> {
        let rms_offset = finite("rms_offset", rms_offset)?;
        self.profile.rms_offset = clamp_to(rms_offset, &RMS_OFFSET_RANGE);
        self.commit();
        Ok(())
    }

    /// Toggle auto-reference; enabling derives the reference immediately
    pub fn set_auto_reference_enabled(&mut self, enabled: bool) {
        self.profile.auto_reference_enabled = enabled;
        if enabled {
            self.profile.reference_phon = auto_reference_phon(self.profile.target_phon);
        }
        self.commit();
    }

    pub fn set_fir_compensation_enabled(&mut self, enabled: bool) {
        self.profile.fir_compensation_enabled = enabled;
        self.commit();
    }

    /// Master switch for loudness compensation
    ///
    /// Enabling also turns the DSP master switch on and reduces the
    /// alarm/ring/notification streams; disabling restores them.
    pub fn set_loudness_enabled(&mut self, enabled: bool) {
        self.profile.loudness_enabled = enabled;
        if enabled {
            self.ensure_master_switch();
            if let Err(e) = self.safe_volume.apply_reduction() {
                warn!("Failed to apply safe volume: {}", e);
            }
        } else if let Err(e) = self.safe_volume.restore() {
            warn!("Failed to restore safe volume: {}", e);
        }
        self.commit();
    }

    /// Single-point calibration: record how far `measured` is from `expected`
    ///
    /// Returns the stored offset. A negative offset means the system plays
    /// louder than expected.
    pub fn perform_calibration(&mut self, measured_spl: f32, expected_spl: f32) -> Result<f32> {
        let measured_spl = finite("measured_spl", measured_spl)?;
        let expected_spl = finite("expected_spl", expected_spl)?;
        self.set_calibration_offset(expected_spl - measured_spl)?;
        info!("{}", self.calibration_summary());
        Ok(self.profile.calibration_offset)
    }

    /// Forget calibration results: offset 0, max SPL 125
    pub fn reset_calibration(&mut self) {
        self.profile.calibration_offset = DEFAULT_CALIBRATION_OFFSET;
        self.profile.max_spl = DEFAULT_MAX_SPL;
        info!("Calibration reset");
        self.commit();
    }

    pub fn save_profile_slot(&self, slot: u8) -> Result<()> {
        ProfileSlot::capture(&self.profile).save(self.store.as_ref(), slot)?;
        info!("Saved loudness profile to slot {}", slot);
        Ok(())
    }

    /// Apply a saved slot's target, reference, offset and max SPL
    pub fn load_profile_slot(&mut self, slot: u8) -> Result<()> {
        let saved =
            ProfileSlot::load(self.store.as_ref(), slot)?.ok_or(EngineError::EmptySlot(slot))?;

        let mut profile = CalibrationProfile {
            target_phon: saved.target_phon,
            reference_phon: saved.reference_phon,
            calibration_offset: saved.calibration_offset,
            max_spl: saved.max_spl,
            ..self.profile.clone()
        }
        .sanitized();
        profile.target_phon = clamp_to(profile.target_phon, &TARGET_PHON_USER_RANGE);

        self.profile = profile;
        info!("Loaded loudness profile from slot {}", slot);
        self.commit();
        Ok(())
    }

    // ===== Flushing =====

    /// Flush without waiting for the debounce window
    pub fn apply_now(&mut self) {
        self.schedule_flush(true);
    }

    /// Cancel pending work and emit synchronously, without muting
    pub fn flush_now(&mut self) -> Result<()> {
        self.debouncer.cancel();
        self.emitter.emit(&self.plan())
    }

    /// Wait until the pending flush (if any) has finished
    pub async fn wait_idle(&mut self) {
        self.debouncer.wait().await;
    }

    /// Cancel pending work and put reduced stream volumes back
    pub fn shutdown(&mut self) {
        if self.debouncer.cancel() {
            debug!("Cancelled pending loudness flush");
        }
        self.calibration = None;
        if let Err(e) = self.safe_volume.restore() {
            warn!("Failed to restore safe volume on shutdown: {}", e);
        }
        info!("Loudness controller shut down");
    }

    // ===== Calibration session =====

    pub(crate) fn begin_calibration(&mut self, calibration: CalibrationOverride) {
        self.calibration = Some(calibration);
        self.ensure_master_switch();
        self.schedule_flush(true);
    }

    pub(crate) fn end_calibration(&mut self) {
        self.calibration = None;
        self.schedule_flush(true);
    }

    // ===== Internals =====

    fn commit(&mut self) {
        if let Err(e) = self.profile.save(self.store.as_ref()) {
            error!("Failed to persist loudness profile: {}", e);
        }
        self.schedule_flush(false);
    }

    fn ensure_master_switch(&self) {
        if let Ok(Some(true)) = self.store.get_bool(Namespace::App, keys::POWERED_ON) {
            return;
        }
        info!("DSP master switch is off, turning it on");
        match self.store.set(Namespace::App, keys::POWERED_ON, json!(true)) {
            Ok(()) => {
                self.bus.publish([Namespace::App]);
            }
            Err(e) => error!("Failed to turn on DSP master switch: {}", e),
        }
    }

    fn plan(&self) -> Emission {
        let profile = self.effective_profile();
        let script = if profile.loudness_enabled {
            GainScript::Calibrated(compute_gain(&profile).total_gain_db)
        } else {
            GainScript::Bypass
        };
        Emission {
            script,
            filter: select_filter(&profile),
        }
    }

    fn schedule_flush(&mut self, immediate: bool) {
        let emission = self.plan();
        let emitter = Arc::clone(&self.emitter);
        let mute = if self.calibration.is_some() {
            None
        } else {
            Some(Arc::clone(&self.mute))
        };

        let task = async move {
            let apply = move || {
                if let Err(e) = emitter.emit(&emission) {
                    error!("Failed to apply loudness configuration: {}", e);
                }
            };
            match mute {
                Some(mute) => mute.run_muted(apply).await,
                None => apply(),
            }
        };

        let scheduled = if immediate {
            self.debouncer.schedule_now(task)
        } else {
            self.debouncer.schedule(task)
        };
        if let Err(e) = scheduled {
            warn!("{}; applying synchronously", e);
            if let Err(e) = self.emitter.emit(&self.plan()) {
                error!("Failed to apply loudness configuration: {}", e);
            }
        }
    }
}

fn finite(field: &'static str, value: f32) -> Result<f32> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(EngineError::InvalidValue { field, value })
    }
}
