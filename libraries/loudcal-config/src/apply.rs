//! Applying parsed directives to preferences and the loudness controller

use crate::error::Result;
use crate::protocol::{parse_line, Directive, LoudnessDirective};
use loudcal_core::prefs::keys;
use loudcal_core::{KeyValueStore, Namespace, PreferencesBus};
use loudcal_engine::LoudnessController;
use serde_json::json;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Offset from a dB SPL reference level to the reference phon curve
pub const REFERENCE_SPL_OFFSET: f32 = 40.0;

/// Loudness operations the config file can drive
pub trait LoudnessTarget: Send {
    fn set_loudness_enabled(&mut self, enabled: bool);

    fn set_reference_phon(&mut self, reference_phon: f32) -> loudcal_engine::Result<()>;

    fn target_phon(&self) -> f32;
}

impl LoudnessTarget for LoudnessController {
    fn set_loudness_enabled(&mut self, enabled: bool) {
        LoudnessController::set_loudness_enabled(self, enabled);
    }

    fn set_reference_phon(&mut self, reference_phon: f32) -> loudcal_engine::Result<()> {
        LoudnessController::set_reference_phon(self, reference_phon)
    }

    fn target_phon(&self) -> f32 {
        LoudnessController::target_phon(self)
    }
}

/// Preset loudness filter for a listening level, `None` above 75 dB SPL
pub fn preset_filter(listening_spl: f32) -> Option<&'static str> {
    if listening_spl <= 55.0 {
        Some("LoudnessFilters/50.0-77.0_filter.wav")
    } else if listening_spl <= 65.0 {
        Some("LoudnessFilters/60.0-83.0_filter.wav")
    } else if listening_spl <= 75.0 {
        Some("LoudnessFilters/70.0-85.0_filter.wav")
    } else {
        None
    }
}

/// Writes directives into the store and announces them once per pass
pub struct ConfigApplier {
    store: Arc<dyn KeyValueStore>,
    bus: PreferencesBus,
}

impl ConfigApplier {
    pub fn new(store: Arc<dyn KeyValueStore>, bus: PreferencesBus) -> Self {
        Self { store, bus }
    }

    /// Apply every line of a config file
    ///
    /// Returns the changed namespaces; one aggregated update is published
    /// for them, none if nothing changed. A line that fails to apply is
    /// logged and skipped.
    pub fn apply_text(&self, text: &str, loudness: &mut dyn LoudnessTarget) -> Vec<Namespace> {
        let mut changed = BTreeSet::new();

        for (number, line) in text.lines().enumerate() {
            let Some(directive) = parse_line(line) else {
                continue;
            };
            match self.apply(&directive, loudness) {
                Ok(Some(namespace)) => {
                    changed.insert(namespace);
                }
                Ok(None) => {}
                Err(e) => error!("Failed to apply config line {}: {}", number + 1, e),
            }
        }

        let changed: Vec<Namespace> = changed.into_iter().collect();
        if changed.is_empty() {
            debug!("Config loaded, no changes");
        } else {
            info!("Config applied, changed namespaces: {:?}", changed);
            self.bus.publish(changed.iter().copied());
        }
        changed
    }

    /// Apply one directive; returns the namespace it changed
    pub fn apply(
        &self,
        directive: &Directive,
        loudness: &mut dyn LoudnessTarget,
    ) -> Result<Option<Namespace>> {
        match directive {
            Directive::Preferences { namespace, values } => {
                self.store.set_many(*namespace, values)?;
                debug!("Updated {} ({} values)", namespace, values.len());
                Ok(Some(*namespace))
            }
            Directive::MasterSwitch(on) => {
                self.store.set(Namespace::App, keys::POWERED_ON, json!(on))?;
                Ok(Some(Namespace::App))
            }
            Directive::Loudness(loudness_directive) => {
                self.apply_loudness(*loudness_directive, loudness)
            }
        }
    }

    fn apply_loudness(
        &self,
        directive: LoudnessDirective,
        loudness: &mut dyn LoudnessTarget,
    ) -> Result<Option<Namespace>> {
        match directive {
            LoudnessDirective::Enable(enabled) => loudness.set_loudness_enabled(enabled),
            LoudnessDirective::Auto(false) => return Ok(None),
            LoudnessDirective::Auto(true) => self.apply_preset(loudness.target_phon())?,
            LoudnessDirective::Volume(spl) => self.apply_preset(spl)?,
            LoudnessDirective::Reference(spl) => {
                loudness.set_reference_phon(spl - REFERENCE_SPL_OFFSET)?;
            }
        }
        Ok(Some(Namespace::Convolver))
    }

    fn apply_preset(&self, listening_spl: f32) -> Result<()> {
        match preset_filter(listening_spl) {
            Some(file) => {
                self.store.set_many(
                    Namespace::Convolver,
                    &[
                        (keys::CONVOLVER_ENABLE, json!(true)),
                        (keys::CONVOLVER_FILE, json!(file)),
                    ],
                )?;
                info!("Applied loudness filter {} for {} dB SPL", file, listening_spl);
            }
            None => {
                self.store
                    .set(Namespace::Convolver, keys::CONVOLVER_ENABLE, json!(false))?;
                info!("Loudness filter disabled for {} dB SPL listening", listening_spl);
            }
        }
        Ok(())
    }
}
