//! Voss-McCartney pink noise
//!
//! Six white generators are summed. On every sample a 5-bit counter
//! advances; the generators whose bit flipped are redrawn, and the last one
//! is redrawn every sample. Low bits flip often and high bits rarely, which
//! gives the 1/f spectrum. The running sum is updated incrementally.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const MAX_KEY: u32 = 0x1f;
const RANGE: u32 = 128;
const GENERATORS: usize = 6;

/// Pink-noise source producing samples in `[-1, 1)`
#[derive(Debug, Clone)]
pub struct PinkNoise<R: Rng = StdRng> {
    rng: R,
    key: u32,
    white: [u32; GENERATORS],
    running_sum: u32,
}

impl PinkNoise<StdRng> {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Deterministic generator for tests and reproducible tones
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }
}

impl Default for PinkNoise<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> PinkNoise<R> {
    pub fn with_rng(mut rng: R) -> Self {
        let mut white = [0; GENERATORS];
        for value in &mut white {
            *value = rng.gen_range(0..RANGE / GENERATORS as u32);
        }
        let running_sum = white.iter().sum();

        Self {
            rng,
            key: 0,
            white,
            running_sum,
        }
    }

    fn redraw(&mut self, slot: usize) {
        self.running_sum -= self.white[slot];
        self.white[slot] = self.rng.gen_range(0..RANGE / GENERATORS as u32);
        self.running_sum += self.white[slot];
    }

    pub fn next_sample(&mut self) -> f32 {
        let last_key = self.key;
        self.key = if self.key >= MAX_KEY { 0 } else { self.key + 1 };

        let diff = last_key ^ self.key;
        for slot in 0..GENERATORS - 1 {
            if diff & (1 << slot) != 0 {
                self.redraw(slot);
            }
        }
        self.redraw(GENERATORS - 1);

        (self.running_sum as f32 / RANGE as f32) * 2.0 - 1.0
    }

    /// Fill a buffer with consecutive samples
    pub fn fill(&mut self, buffer: &mut [f32]) {
        for sample in buffer {
            *sample = self.next_sample();
        }
    }

    #[cfg(test)]
    fn recomputed_sum(&self) -> u32 {
        self.white.iter().sum()
    }
}
