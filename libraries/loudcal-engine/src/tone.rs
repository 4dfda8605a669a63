//! Calibration test tone
//!
//! Plays pink noise into a blocking [`AudioSink`] from a dedicated thread.
//! Playback is started and stopped explicitly; the player never restarts on
//! its own, and stopping (or dropping) it joins the thread and releases the
//! sink. The amplitude can be changed while playing.

use crate::error::{EngineError, Result};
use crate::pink_noise::PinkNoise;
use loudcal_core::AudioSink;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, error};

/// Frames written per sink call
const FRAMES_PER_BUFFER: usize = 1024;

/// Opens a fresh sink for each playback
pub trait SinkFactory: Send + Sync {
    fn open(&self) -> Result<Box<dyn AudioSink>>;
}

impl<F> SinkFactory for F
where
    F: Fn() -> Result<Box<dyn AudioSink>> + Send + Sync,
{
    fn open(&self) -> Result<Box<dyn AudioSink>> {
        self()
    }
}

/// Atomic f32 stored as raw bits
#[derive(Debug)]
struct AtomicF32(AtomicU32);

impl AtomicF32 {
    fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

pub struct TestTonePlayer {
    amplitude: Arc<AtomicF32>,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    seed: Option<u64>,
}

impl TestTonePlayer {
    pub fn new() -> Self {
        Self {
            amplitude: Arc::new(AtomicF32::new(1.0)),
            stop: Arc::new(AtomicBool::new(false)),
            thread: None,
            seed: None,
        }
    }

    /// Use a seeded noise generator
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn is_playing(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    pub fn amplitude(&self) -> f32 {
        self.amplitude.load()
    }

    /// Set the output amplitude, clamped to `[0, 1]`
    pub fn set_amplitude(&self, amplitude: f32) {
        let amplitude = if amplitude.is_finite() {
            amplitude.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.amplitude.store(amplitude);
    }

    /// Start playing into `sink`, replacing any current playback
    pub fn start(&mut self, mut sink: Box<dyn AudioSink>, amplitude: f32) -> Result<()> {
        self.stop();
        self.set_amplitude(amplitude);
        self.stop.store(false, Ordering::Release);

        let channels = usize::from(sink.channels().max(1));
        let stop = Arc::clone(&self.stop);
        let level = Arc::clone(&self.amplitude);
        let mut noise = match self.seed {
            Some(seed) => PinkNoise::seeded(seed),
            None => PinkNoise::new(),
        };

        let thread = std::thread::Builder::new()
            .name("loudcal-test-tone".to_string())
            .spawn(move || {
                let mut mono = vec![0.0f32; FRAMES_PER_BUFFER];
                let mut interleaved = vec![0.0f32; FRAMES_PER_BUFFER * channels];

                while !stop.load(Ordering::Acquire) {
                    noise.fill(&mut mono);
                    let gain = level.load();
                    for (frame, sample) in interleaved.chunks_exact_mut(channels).zip(&mono) {
                        frame.fill(sample * gain);
                    }
                    if let Err(e) = sink.write(&interleaved) {
                        error!("Test tone sink failed: {}", e);
                        break;
                    }
                }
                debug!("Test tone thread finished");
            })
            .map_err(|e| EngineError::Tone(e.to_string()))?;

        self.thread = Some(thread);
        debug!("Test tone started at amplitude {:.3}", self.amplitude());
        Ok(())
    }

    /// Stop playback and release the sink
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Test tone thread panicked");
            }
            debug!("Test tone stopped");
        }
    }
}

impl Default for TestTonePlayer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TestTonePlayer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Records every write; counts live instances so release can be checked
    struct RecordingSink {
        written: Arc<Mutex<Vec<f32>>>,
        alive: Arc<AtomicU32>,
    }

    impl AudioSink for RecordingSink {
        fn sample_rate(&self) -> u32 {
            48_000
        }

        fn channels(&self) -> u16 {
            2
        }

        fn write(&mut self, samples: &[f32]) -> loudcal_core::Result<()> {
            self.written.lock().unwrap().extend_from_slice(samples);
            std::thread::sleep(Duration::from_millis(1));
            Ok(())
        }
    }

    impl Drop for RecordingSink {
        fn drop(&mut self) {
            self.alive.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn sink() -> (Box<dyn AudioSink>, Arc<Mutex<Vec<f32>>>, Arc<AtomicU32>) {
        let written = Arc::new(Mutex::new(Vec::new()));
        let alive = Arc::new(AtomicU32::new(1));
        let sink = RecordingSink {
            written: Arc::clone(&written),
            alive: Arc::clone(&alive),
        };
        (Box::new(sink), written, alive)
    }

    fn wait_for_samples(written: &Arc<Mutex<Vec<f32>>>) {
        for _ in 0..500 {
            if written.lock().unwrap().len() >= FRAMES_PER_BUFFER * 2 {
                return;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        panic!("no samples written");
    }

    #[test]
    fn test_plays_stereo_frames_and_releases_sink() {
        let (sink, written, alive) = sink();
        let mut player = TestTonePlayer::new().with_seed(5);

        player.start(sink, 1.0).unwrap();
        assert!(player.is_playing());
        wait_for_samples(&written);
        player.stop();

        assert!(!player.is_playing());
        assert_eq!(alive.load(Ordering::SeqCst), 0);

        let samples = written.lock().unwrap();
        assert_eq!(samples.len() % 2, 0);
        for frame in samples.chunks_exact(2) {
            assert_eq!(frame[0], frame[1]);
            assert!((-1.0..=1.0).contains(&frame[0]));
        }
    }

    #[test]
    fn test_amplitude_scales_output() {
        let (sink, written, _alive) = sink();
        let mut player = TestTonePlayer::new().with_seed(5);

        player.start(sink, 0.1).unwrap();
        wait_for_samples(&written);
        player.stop();

        let samples = written.lock().unwrap();
        assert!(samples.iter().all(|s| s.abs() <= 0.1 + 1e-6));
    }

    #[test]
    fn test_set_amplitude_clamps() {
        let player = TestTonePlayer::new();
        player.set_amplitude(17.8);
        assert_eq!(player.amplitude(), 1.0);
        player.set_amplitude(-1.0);
        assert_eq!(player.amplitude(), 0.0);
        player.set_amplitude(f32::NAN);
        assert_eq!(player.amplitude(), 0.0);
    }

    #[test]
    fn test_drop_stops_thread() {
        let (sink, written, alive) = sink();
        {
            let mut player = TestTonePlayer::new();
            player.start(sink, 0.5).unwrap();
            wait_for_samples(&written);
        }
        assert_eq!(alive.load(Ordering::SeqCst), 0);
    }
}
