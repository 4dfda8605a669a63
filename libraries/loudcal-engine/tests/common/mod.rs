//! Shared fakes for engine integration tests

#![allow(dead_code)]

use loudcal_core::{
    AudioSink, AudioStream, CoreError, FileSystem, KeyValueStore, MemoryStore, Namespace,
    PreferencesBus, SoftwareVolume, VolumeControl,
};
use loudcal_engine::script::SCRIPT_PATH;
use loudcal_engine::{EngineConfig, EngineContext, EngineError, LoudnessController, SinkFactory};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// In-memory filesystem counting writes; writes can be made to fail
#[derive(Default)]
pub struct MemoryFs {
    files: Mutex<HashMap<PathBuf, String>>,
    writes: AtomicUsize,
    failing: AtomicBool,
}

impl MemoryFs {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn insert(&self, relative: &str, contents: &str) {
        self.files
            .lock()
            .unwrap()
            .insert(PathBuf::from(relative), contents.to_string());
    }

    pub fn script(&self) -> Option<String> {
        self.files.lock().unwrap().get(Path::new(SCRIPT_PATH)).cloned()
    }
}

impl FileSystem for MemoryFs {
    fn write_atomic(&self, relative: &Path, contents: &str) -> loudcal_core::Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CoreError::storage(format!(
                "read-only filesystem: {}",
                relative.display()
            )));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.files
            .lock()
            .unwrap()
            .insert(relative.to_path_buf(), contents.to_string());
        Ok(())
    }

    fn read_to_string(&self, relative: &Path) -> loudcal_core::Result<String> {
        self.files
            .lock()
            .unwrap()
            .get(relative)
            .cloned()
            .ok_or_else(|| CoreError::storage(format!("missing {}", relative.display())))
    }

    fn exists(&self, relative: &Path) -> bool {
        self.files.lock().unwrap().contains_key(relative)
    }
}

/// Store whose writes can be made to fail
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    failing: AtomicBool,
}

impl FlakyStore {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl KeyValueStore for FlakyStore {
    fn get(&self, namespace: Namespace, key: &str) -> loudcal_core::Result<Option<Value>> {
        self.inner.get(namespace, key)
    }

    fn set_many(&self, namespace: Namespace, entries: &[(&str, Value)]) -> loudcal_core::Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CoreError::storage("disk full"));
        }
        self.inner.set_many(namespace, entries)
    }

    fn remove(&self, namespace: Namespace, key: &str) -> loudcal_core::Result<()> {
        self.inner.remove(namespace, key)
    }
}

/// Software volume that records every set
pub struct RecordingVolume {
    inner: SoftwareVolume,
    log: Mutex<Vec<(AudioStream, u32)>>,
}

impl RecordingVolume {
    pub fn new() -> Self {
        Self {
            inner: SoftwareVolume::new(10, 15),
            log: Mutex::new(Vec::new()),
        }
    }

    pub fn sets_for(&self, stream: AudioStream) -> Vec<u32> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|(s, _)| *s == stream)
            .map(|(_, level)| *level)
            .collect()
    }
}

impl Default for RecordingVolume {
    fn default() -> Self {
        Self::new()
    }
}

impl VolumeControl for RecordingVolume {
    fn volume(&self, stream: AudioStream) -> loudcal_core::Result<u32> {
        self.inner.volume(stream)
    }

    fn max_volume(&self, stream: AudioStream) -> loudcal_core::Result<u32> {
        self.inner.max_volume(stream)
    }

    fn set_volume(&self, stream: AudioStream, level: u32) -> loudcal_core::Result<()> {
        self.log.lock().unwrap().push((stream, level));
        self.inner.set_volume(stream, level)
    }
}

/// Sink that discards samples at roughly real-time pace
pub struct NullSink;

impl AudioSink for NullSink {
    fn sample_rate(&self) -> u32 {
        48_000
    }

    fn channels(&self) -> u16 {
        2
    }

    fn write(&mut self, _samples: &[f32]) -> loudcal_core::Result<()> {
        std::thread::sleep(Duration::from_millis(2));
        Ok(())
    }
}

/// Sink factory handing out [`NullSink`]s
pub fn null_sinks() -> Arc<dyn SinkFactory> {
    fn open() -> loudcal_engine::Result<Box<dyn AudioSink>> {
        Ok(Box::new(NullSink))
    }
    Arc::new(open)
}

/// Sink factory that never yields a device
pub fn missing_sinks() -> Arc<dyn SinkFactory> {
    fn open() -> loudcal_engine::Result<Box<dyn AudioSink>> {
        Err(EngineError::Tone("no output device".to_string()))
    }
    Arc::new(open)
}

pub struct Harness {
    pub controller: LoudnessController,
    pub store: Arc<FlakyStore>,
    pub fs: Arc<MemoryFs>,
    pub volume: Arc<RecordingVolume>,
    pub bus: PreferencesBus,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_store(Arc::new(FlakyStore::default()))
    }

    pub fn with_store(store: Arc<FlakyStore>) -> Self {
        let fs = Arc::new(MemoryFs::default());
        let volume = Arc::new(RecordingVolume::new());
        let bus = PreferencesBus::new();
        let controller = LoudnessController::new(
            EngineContext {
                store: store.clone(),
                fs: fs.clone(),
                volume: volume.clone(),
                bus: bus.clone(),
            },
            EngineConfig::default(),
        );
        Self {
            controller,
            store,
            fs,
            volume,
            bus,
        }
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
