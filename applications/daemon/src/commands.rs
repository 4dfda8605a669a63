//! Command implementations shared by the CLI and its tests

use crate::config::DaemonConfig;
use crate::error::Result;
use clap::Args;
use loudcal_config::{ConfigApplier, ConfigFileWatcher, SharedLoudness};
use loudcal_core::{JsonFileStore, LocalFileSystem, PreferencesBus, SoftwareVolume};
use loudcal_engine::safety::format_safe_time;
use loudcal_engine::{
    CalibrationProfile, EngineContext, FilterStatus, GainBreakdown, LoudnessController,
    SafetyLevel, StreamVolumeInfo,
};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Wire the engine to the on-disk preference store and DSP root
pub fn open_context(config: &DaemonConfig) -> Result<EngineContext> {
    if let Some(parent) = config.paths.prefs_file.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::create_dir_all(&config.paths.dsp_root)?;

    let store = JsonFileStore::open(&config.paths.prefs_file)?;
    info!("Preferences: {}", store.path().display());

    Ok(EngineContext {
        store: Arc::new(store),
        fs: Arc::new(LocalFileSystem::new(&config.paths.dsp_root)),
        volume: Arc::new(SoftwareVolume::default()),
        bus: PreferencesBus::new(),
    })
}

pub fn open_controller(config: &DaemonConfig) -> Result<LoudnessController> {
    let ctx = open_context(config)?;
    Ok(LoudnessController::new(ctx, config.engine_config()))
}

/// Snapshot printed by `status`
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub profile: CalibrationProfile,
    pub gain: GainBreakdown,
    pub filter: FilterStatus,
    pub estimated_output_spl: f32,
    pub safety_level: SafetyLevel,
    pub safe_listening_time: String,
    pub calibration: String,
    pub safe_volume: Vec<StreamVolumeInfo>,
}

pub fn status(controller: &LoudnessController) -> Result<StatusReport> {
    Ok(StatusReport {
        profile: controller.profile().clone(),
        gain: controller.gain_breakdown(),
        filter: controller.filter_status(),
        estimated_output_spl: controller.estimated_output_spl(),
        safety_level: controller.safety_level(),
        safe_listening_time: format_safe_time(controller.actual_phon()),
        calibration: controller.calibration_summary(),
        safe_volume: controller.safe_volume().volume_info()?,
    })
}

/// Profile changes accepted by `set`
#[derive(Debug, Clone, Default, Args)]
pub struct SetArgs {
    /// Enable or disable loudness compensation
    #[arg(long)]
    pub loudness: Option<bool>,
    /// Derive the reference from the target
    #[arg(long)]
    pub auto_reference: Option<bool>,
    #[arg(long)]
    pub fir_compensation: Option<bool>,
    /// Target listening level in phon (40-125)
    #[arg(long)]
    pub target: Option<f32>,
    /// Reference curve in phon (75-90), ignored while auto-reference is on
    #[arg(long)]
    pub reference: Option<f32>,
    /// Measured maximum SPL of the system
    #[arg(long)]
    pub max_spl: Option<f32>,
    /// Calibration offset in dB
    #[arg(long, allow_hyphen_values = true)]
    pub offset: Option<f32>,
    /// RMS headroom of program material in dB
    #[arg(long)]
    pub rms: Option<f32>,
}

impl SetArgs {
    pub fn is_empty(&self) -> bool {
        self.loudness.is_none()
            && self.auto_reference.is_none()
            && self.fir_compensation.is_none()
            && self.target.is_none()
            && self.reference.is_none()
            && self.max_spl.is_none()
            && self.offset.is_none()
            && self.rms.is_none()
    }
}

/// Apply every given setting, then write the DSP configuration once
pub fn apply_settings(controller: &mut LoudnessController, args: &SetArgs) -> Result<()> {
    if args.is_empty() {
        warn!("Nothing to set");
        return Ok(());
    }

    if let Some(enabled) = args.loudness {
        controller.set_loudness_enabled(enabled);
    }
    if let Some(enabled) = args.auto_reference {
        controller.set_auto_reference_enabled(enabled);
    }
    if let Some(enabled) = args.fir_compensation {
        controller.set_fir_compensation_enabled(enabled);
    }
    if let Some(target) = args.target {
        controller.set_target_phon(target)?;
    }
    if let Some(reference) = args.reference {
        controller.set_reference_phon(reference)?;
    }
    if let Some(max_spl) = args.max_spl {
        controller.set_max_spl(max_spl)?;
    }
    if let Some(offset) = args.offset {
        controller.set_calibration_offset(offset)?;
    }
    if let Some(rms) = args.rms {
        controller.set_rms_offset(rms)?;
    }

    controller.flush_now()?;
    Ok(())
}

/// Single-point calibration; returns the human-readable result
pub fn calibrate_point(
    controller: &mut LoudnessController,
    measured_spl: f32,
    expected_spl: f32,
) -> Result<String> {
    controller.perform_calibration(measured_spl, expected_spl)?;
    controller.flush_now()?;
    Ok(controller.calibration_summary())
}

pub fn reset_calibration(controller: &mut LoudnessController) -> Result<()> {
    controller.reset_calibration();
    controller.flush_now()?;
    Ok(())
}

pub fn save_slot(controller: &LoudnessController, slot: u8) -> Result<()> {
    controller.save_profile_slot(slot)?;
    Ok(())
}

pub fn load_slot(controller: &mut LoudnessController, slot: u8) -> Result<()> {
    controller.load_profile_slot(slot)?;
    controller.flush_now()?;
    Ok(())
}

/// Keep a controller and the config-file watcher alive until `shutdown`
/// resolves
pub async fn watch_until<F>(config: &DaemonConfig, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    let ctx = open_context(config)?;
    let applier = ConfigApplier::new(Arc::clone(&ctx.store), ctx.bus.clone());
    let mut updates = ctx.bus.subscribe();

    let mut controller = LoudnessController::new(ctx, config.engine_config());
    controller.flush_now()?;
    let controller = Arc::new(Mutex::new(controller));

    let handle = if config.watcher.enabled {
        let shared: SharedLoudness = controller.clone();
        let watcher = ConfigFileWatcher::new(config.watcher_config(), applier, shared);
        Some(watcher.start().await?)
    } else {
        info!("Config file watcher disabled");
        None
    };

    let log_updates = tokio::spawn(async move {
        loop {
            match updates.recv().await {
                Ok(update) => info!("Preferences updated: {:?}", update.namespaces),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Missed {} preference updates", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    shutdown.await;
    info!("Shutting down");

    if let Some(handle) = handle {
        handle.stop().await;
    }
    log_updates.abort();
    controller.lock().await.shutdown();
    Ok(())
}

/// Run until Ctrl-C
pub async fn watch(config: &DaemonConfig) -> Result<()> {
    watch_until(config, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
        }
    })
    .await
}
