//! Config file watcher
//!
//! Watches the config directory with native notifications and re-applies the
//! config file whenever it is created, modified or moved into place. Events
//! are coalesced until the file has been quiet for the settle delay, so a
//! half-written file is never read. Reloads are serialized through a single
//! consumer task.
//!
//! # Platform Support
//!
//! - Windows: `ReadDirectoryChangesW`
//! - macOS: `FSEvents`
//! - Linux: `inotify`

use crate::apply::{ConfigApplier, LoudnessTarget};
use crate::error::Result;
use loudcal_core::Namespace;
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode};
use notify_debouncer_full::{new_debouncer, DebounceEventResult, Debouncer, RecommendedCache};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Config directory under the DSP root
pub const DEFAULT_CONFIG_DIR: &str = "JamesDSP";
pub const DEFAULT_CONFIG_FILE: &str = "JamesDSP.conf";
/// Default quiet period before a changed file is re-read
pub const DEFAULT_SETTLE_MS: u64 = 100;

/// Controller shared between the watcher and its owner
pub type SharedLoudness = Arc<Mutex<dyn LoudnessTarget>>;

/// Template written when no config file exists
pub const DEFAULT_CONFIG_TEMPLATE: &str = r#"# JamesDSP Configuration File
#
# This file configures the DSP effects from a text editor.
# Changes are detected and applied automatically.
#
# Format examples:
#
# Convolver: enabled file="Convolver/impulse.wav" mode=0 adv="-80;-100;0;0;0;0"
# Convolver: disabled
# Convolver.file=Convolver/impulse.wav
#
# GraphicEQ: enabled bands="0.0 0.0; 100.0 2.0; 1000.0 -1.0; 10000.0 0.0"
# GraphicEQ: disabled
#
# Equalizer: enabled type=0 mode=0 bands="25.0;40.0;63.0;100.0;160.0;250.0;400.0;630.0;1000.0;1600.0;2500.0;4000.0;6300.0;10000.0;16000.0;0.0;0.0;0.0;0.0;0.0;0.0;0.0;0.0;0.0;0.0;0.0;0.0;0.0;0.0;0.0"
#
# BassBoost: enabled gain=5.0
#
# Reverb: enabled preset=0
#
# StereoWide: enabled level=60.0
#
# Crossfeed: enabled mode=0
#
# Tube: enabled drive=2.0
#
# DDC: enabled file="DDC/sample.vdc"
#
# Liveprog: enabled file="Liveprog/script.eel"
#
# Output: gain=0.0 limiter_threshold=-0.1 limiter_release=60.0
# Output.gain=-14.0
#
# Compander: enabled timeconstant=0.22 granularity=2 tfresolution=0 response="95.0;200.0;400.0;800.0;1600.0;3400.0;7500.0;0;0;0;0;0;0;0"
#
# MasterSwitch: enabled
#
# Loudness: enabled
# Loudness.auto=on  (select the preset filter for the current target)
# Loudness.volume=60  (apply the preset filter for 60 dB SPL listening)
# Loudness.reference=83  (set the reference level to 83 dB SPL)

# Add your configuration below:
"#;

/// Configuration for the config file watcher
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Directory holding the config file
    pub config_dir: PathBuf,
    pub file_name: String,
    /// Quiet period before a changed file is re-read
    pub settle_delay: Duration,
}

impl WatcherConfig {
    /// Defaults rooted at `dsp_root`
    pub fn new(dsp_root: impl AsRef<Path>) -> Self {
        Self {
            config_dir: dsp_root.as_ref().join(DEFAULT_CONFIG_DIR),
            file_name: DEFAULT_CONFIG_FILE.to_string(),
            settle_delay: Duration::from_millis(DEFAULT_SETTLE_MS),
        }
    }

    pub fn config_path(&self) -> PathBuf {
        self.config_dir.join(&self.file_name)
    }
}

/// Write the commented template unless the file exists; returns whether
/// it was created
pub fn ensure_default_config(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, DEFAULT_CONFIG_TEMPLATE)?;
    info!("Created default config file at {}", path.display());
    Ok(true)
}

/// Whether a notification should trigger a reload of `file_name`
fn is_reload_event(event: &Event, file_name: &str) -> bool {
    let relevant = match &event.kind {
        EventKind::Create(_) => true,
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => false,
        EventKind::Modify(_) => true,
        _ => false,
    };
    relevant
        && event
            .paths
            .iter()
            .any(|p| p.file_name().is_some_and(|name| name == file_name))
}

pub struct ConfigFileWatcher {
    config: WatcherConfig,
    applier: ConfigApplier,
    loudness: SharedLoudness,
}

impl ConfigFileWatcher {
    pub fn new(config: WatcherConfig, applier: ConfigApplier, loudness: SharedLoudness) -> Self {
        Self {
            config,
            applier,
            loudness,
        }
    }

    pub fn config(&self) -> &WatcherConfig {
        &self.config
    }

    /// Read and apply the config file once
    ///
    /// A missing file is not an error; nothing changes.
    pub async fn reload(&self) -> Result<Vec<Namespace>> {
        let path = self.config.config_path();
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Config file does not exist: {}", path.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        debug!("Loading config file: {}", path.display());
        let mut loudness = self.loudness.lock().await;
        Ok(self.applier.apply_text(&text, &mut *loudness))
    }

    /// Create the default file if needed, load it once, then watch it
    pub async fn start(self) -> Result<WatcherHandle> {
        let path = self.config.config_path();
        ensure_default_config(&path)?;

        if let Err(e) = self.reload().await {
            error!("Initial config load failed: {}", e);
        }

        let (reload_tx, mut reload_rx) = mpsc::channel::<()>(16);
        let file_name = self.config.file_name.clone();

        let mut debouncer = new_debouncer(
            self.config.settle_delay,
            None, // No tick rate
            move |result: DebounceEventResult| match result {
                Ok(events) => {
                    if events.iter().any(|e| is_reload_event(&e.event, &file_name)) {
                        // A full channel already has a reload queued
                        let _ = reload_tx.try_send(());
                    }
                }
                Err(errors) => {
                    for error in errors {
                        error!("Watcher error: {:?}", error);
                    }
                }
            },
        )?;
        debouncer.watch(&self.config.config_dir, RecursiveMode::NonRecursive)?;

        let watcher = Arc::new(self);
        let task = tokio::spawn(async move {
            while reload_rx.recv().await.is_some() {
                // Collapse reloads queued while the previous one ran
                while reload_rx.try_recv().is_ok() {}
                info!("Config file changed, reloading");
                if let Err(e) = watcher.reload().await {
                    error!("Failed to reload config file: {}", e);
                }
            }
            debug!("Config reload loop finished");
        });

        info!("Started watching: {}", path.display());
        Ok(WatcherHandle {
            path,
            debouncer: Some(debouncer),
            task: Some(task),
        })
    }
}

/// Keeps the watch alive; dropping it stops watching
pub struct WatcherHandle {
    path: PathBuf,
    // The debouncer owns the native watcher
    debouncer: Option<Debouncer<RecommendedWatcher, RecommendedCache>>,
    task: Option<JoinHandle<()>>,
}

impl WatcherHandle {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stop native notifications and the reload loop
    pub async fn stop(mut self) {
        self.debouncer.take();
        if let Some(task) = self.task.take() {
            task.abort();
            if let Err(e) = task.await {
                if e.is_panic() {
                    error!("Config reload task panicked");
                }
            }
        }
        info!("Stopped watching: {}", self.path.display());
    }
}

impl Drop for WatcherHandle {
    fn drop(&mut self) {
        if let Some(task) = &self.task {
            task.abort();
        }
    }
}
