//! LoudCal Core
//!
//! Platform-agnostic building blocks shared by the loudness engine, the
//! config-file watcher and the daemon.
//!
//! # Architecture
//!
//! The core crate defines:
//! - **Preferences**: namespaced key/value storage (`KeyValueStore`) with typed
//!   accessors, an in-memory store and a JSON-file store
//! - **Signals**: the `PreferencesBus` that announces which namespaces changed
//! - **Filesystem**: `FileSystem` with atomic (temp + rename) writes
//! - **Audio devices**: `VolumeControl` for per-stream levels and `AudioSink`
//!   for the calibration test tone
//! - **Error Handling**: unified `CoreError` and `Result` types
//!
//! # Example
//!
//! ```rust
//! use loudcal_core::prefs::{keys, KeyValueStore, MemoryStore, Namespace, PreferencesExt};
//!
//! let store = MemoryStore::new();
//! store.set(Namespace::App, keys::LOUDNESS_TARGET_PHON, serde_json::json!(65.0)).unwrap();
//! assert_eq!(store.get_f32(Namespace::App, keys::LOUDNESS_TARGET_PHON).unwrap(), Some(65.0));
//! ```

#![forbid(unsafe_code)]

pub mod audio;
pub mod bus;
pub mod error;
pub mod fs;
pub mod prefs;
mod json_store;

pub use audio::{AudioSink, AudioStream, SoftwareVolume, VolumeControl};
pub use bus::{PreferencesBus, PreferencesUpdated};
pub use error::{CoreError, Result};
pub use fs::{FileSystem, LocalFileSystem};
pub use json_store::JsonFileStore;
pub use prefs::{KeyValueStore, MemoryStore, Namespace, PreferencesExt};
