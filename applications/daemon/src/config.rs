/// Daemon configuration
use crate::error::{DaemonError, Result};
use loudcal_config::WatcherConfig;
use loudcal_engine::EngineConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file read from the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "loudcal.toml";
/// Environment variable prefix, e.g. `LOUDCAL_PATHS__DSP_ROOT`
pub const ENV_PREFIX: &str = "LOUDCAL";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DaemonConfig {
    #[serde(default = "default_paths")]
    pub paths: PathSettings,

    #[serde(default = "default_engine")]
    pub engine: EngineSettings,

    #[serde(default = "default_watcher")]
    pub watcher: WatcherSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PathSettings {
    /// DSP root: filters, gain script and the config-file directory live here
    #[serde(default = "default_dsp_root")]
    pub dsp_root: PathBuf,

    /// JSON document holding every preference namespace
    #[serde(default = "default_prefs_file")]
    pub prefs_file: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineSettings {
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    #[serde(default = "default_mute_settle_ms")]
    pub mute_settle_ms: u64,

    #[serde(default = "default_restore_delay_ms")]
    pub restore_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WatcherSettings {
    #[serde(default = "default_watcher_enabled")]
    pub enabled: bool,

    /// Overrides `<dsp_root>/JamesDSP`
    #[serde(default)]
    pub config_dir: Option<PathBuf>,

    #[serde(default = "default_file_name")]
    pub file_name: String,

    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
}

impl DaemonConfig {
    /// Load configuration from file and environment
    ///
    /// An explicit `path` must exist; otherwise `loudcal.toml` in the
    /// working directory is used when present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(
            path,
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
    }

    /// Load with a caller-supplied environment source
    pub fn load_with_env(path: Option<&Path>, env: config::Environment) -> Result<Self> {
        let mut settings = config::Config::builder();

        match path {
            Some(path) => {
                if !path.exists() {
                    return Err(DaemonError::Config(format!(
                        "Config file not found: {}",
                        path.display()
                    )));
                }
                settings = settings.add_source(config::File::from(path));
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    settings = settings.add_source(config::File::from(default_path));
                }
            }
        }

        settings = settings.add_source(env);

        let config: Self = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.paths.dsp_root.as_os_str().is_empty() {
            return Err(DaemonError::Config("paths.dsp_root must not be empty".to_string()));
        }

        if self.paths.prefs_file.as_os_str().is_empty() {
            return Err(DaemonError::Config(
                "paths.prefs_file must not be empty".to_string(),
            ));
        }

        let file_name = &self.watcher.file_name;
        if file_name.is_empty() || file_name.contains('/') || file_name.contains('\\') {
            return Err(DaemonError::Config(format!(
                "watcher.file_name must be a bare file name, got {:?}",
                file_name
            )));
        }

        if self.watcher.settle_ms == 0 {
            return Err(DaemonError::Config(
                "watcher.settle_ms must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            debounce: Duration::from_millis(self.engine.debounce_ms),
            mute_settle: Duration::from_millis(self.engine.mute_settle_ms),
            restore_delay: Duration::from_millis(self.engine.restore_delay_ms),
        }
    }

    pub fn watcher_config(&self) -> WatcherConfig {
        let mut watcher = WatcherConfig::new(&self.paths.dsp_root);
        if let Some(dir) = &self.watcher.config_dir {
            watcher.config_dir.clone_from(dir);
        }
        watcher.file_name.clone_from(&self.watcher.file_name);
        watcher.settle_delay = Duration::from_millis(self.watcher.settle_ms);
        watcher
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            paths: default_paths(),
            engine: default_engine(),
            watcher: default_watcher(),
        }
    }
}

// Default values
fn default_paths() -> PathSettings {
    PathSettings {
        dsp_root: default_dsp_root(),
        prefs_file: default_prefs_file(),
    }
}

fn default_dsp_root() -> PathBuf {
    PathBuf::from("./dsp")
}

fn default_prefs_file() -> PathBuf {
    PathBuf::from("./dsp/loudcal.json")
}

fn default_engine() -> EngineSettings {
    EngineSettings {
        debounce_ms: default_debounce_ms(),
        mute_settle_ms: default_mute_settle_ms(),
        restore_delay_ms: default_restore_delay_ms(),
    }
}

fn default_debounce_ms() -> u64 {
    loudcal_engine::config::DEFAULT_DEBOUNCE_MS
}

fn default_mute_settle_ms() -> u64 {
    loudcal_engine::config::DEFAULT_MUTE_SETTLE_MS
}

fn default_restore_delay_ms() -> u64 {
    loudcal_engine::config::DEFAULT_RESTORE_DELAY_MS
}

fn default_watcher() -> WatcherSettings {
    WatcherSettings {
        enabled: default_watcher_enabled(),
        config_dir: None,
        file_name: default_file_name(),
        settle_ms: default_settle_ms(),
    }
}

fn default_watcher_enabled() -> bool {
    true
}

fn default_file_name() -> String {
    loudcal_config::watcher::DEFAULT_CONFIG_FILE.to_string()
}

fn default_settle_ms() -> u64 {
    loudcal_config::watcher::DEFAULT_SETTLE_MS
}
