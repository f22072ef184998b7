//! Seed lineage for individuals and the RNG handle built from it.

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use siphasher::sip::SipHasher13;
use std::hash::Hasher;

/// Position of an individual inside an experiment together with the trial
/// seed it descends from.
///
/// The per-individual seed is derived by hashing
/// `(trial_seed, generation, individual)` with SipHash-1-3 under fixed zero
/// keys, so the value is identical on every platform and every run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeedLineage {
    /// Seed the trial was run with (also the trial identifier).
    pub trial_seed: u64,
    /// Generation index the individual belongs to.
    pub generation: u64,
    /// Index of the individual within its generation.
    pub individual: u64,
}

impl SeedLineage {
    /// Creates a lineage record.
    pub fn new(trial_seed: u64, generation: u64, individual: u64) -> Self {
        Self {
            trial_seed,
            generation,
            individual,
        }
    }

    /// Derived seed for this individual.
    pub fn individual_seed(&self) -> u64 {
        let mut hasher = SipHasher13::new_with_keys(0, 0);
        hasher.write_u64(self.trial_seed);
        hasher.write_u64(self.generation);
        hasher.write_u64(self.individual);
        hasher.finish()
    }

    /// Deterministic RNG positioned at the start of this individual's stream.
    pub fn rng(&self) -> RngHandle {
        RngHandle::from_seed(self.individual_seed())
    }
}

/// Deterministic RNG handle used by family samplers.
#[derive(Debug, Clone)]
pub struct RngHandle {
    rng: StdRng,
}

impl RngHandle {
    /// Creates a new RNG handle from a seed.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl RngCore for RngHandle {
    fn next_u32(&mut self) -> u32 {
        self.rng.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.rng.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.rng.fill_bytes(dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.rng.try_fill_bytes(dest)
    }
}
