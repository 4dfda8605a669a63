//! DSP configuration emission
//!
//! Writes the Liveprog gain script, points the convolver and Liveprog
//! preferences at the new files and announces both namespaces in one
//! update, so the DSP engine never pairs a new filter with an old gain.

use crate::error::Result;
use crate::gain::FilterSelection;
use crate::script::{GainScript, SCRIPT_PATH};
use loudcal_core::prefs::keys;
use loudcal_core::{FileSystem, KeyValueStore, Namespace, PreferencesBus};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Everything one flush writes
#[derive(Debug, Clone, PartialEq)]
pub struct Emission {
    pub script: GainScript,
    pub filter: FilterSelection,
}

impl Emission {
    fn convolver_enabled(&self) -> bool {
        matches!(self.script, GainScript::Calibrated(_))
    }
}

pub struct ConfigEmitter {
    fs: Arc<dyn FileSystem>,
    store: Arc<dyn KeyValueStore>,
    bus: PreferencesBus,
}

impl ConfigEmitter {
    pub fn new(fs: Arc<dyn FileSystem>, store: Arc<dyn KeyValueStore>, bus: PreferencesBus) -> Self {
        Self { fs, store, bus }
    }

    /// Whether the selected filter exists under the DSP root
    pub fn filter_exists(&self, filter: &FilterSelection) -> bool {
        self.fs.exists(Path::new(&filter.preference_path()))
    }

    /// Write script and preferences, then broadcast once
    ///
    /// A bypass emission keeps Liveprog pointed at the (unity) script and
    /// switches the convolver off.
    pub fn emit(&self, emission: &Emission) -> Result<()> {
        self.fs
            .write_atomic(Path::new(SCRIPT_PATH), &emission.script.render())?;

        let filter_path = emission.filter.preference_path();
        if emission.convolver_enabled() {
            if !self.filter_exists(&emission.filter) {
                warn!("Filter asset {} not found under the DSP root", filter_path);
            }
            self.store.set_many(
                Namespace::Convolver,
                &[
                    (keys::CONVOLVER_ENABLE, json!(true)),
                    (keys::CONVOLVER_FILE, json!(filter_path)),
                ],
            )?;
        } else {
            self.store
                .set(Namespace::Convolver, keys::CONVOLVER_ENABLE, json!(false))?;
        }

        self.store.set_many(
            Namespace::Liveprog,
            &[
                (keys::LIVEPROG_ENABLE, json!(true)),
                (keys::LIVEPROG_FILE, json!(SCRIPT_PATH)),
            ],
        )?;

        let receivers = self.bus.publish([Namespace::Convolver, Namespace::Liveprog]);
        match emission.script {
            GainScript::Calibrated(db) => info!(
                "Applied loudness: gain {:.2} dB, filter {}",
                db, filter_path
            ),
            GainScript::Bypass => info!("Applied loudness bypass"),
        }
        debug!("Update delivered to {} subscriber(s)", receivers);
        Ok(())
    }
}
