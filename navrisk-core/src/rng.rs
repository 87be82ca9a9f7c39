//! Deterministic seed derivation.
//!
//! A master seed is expanded into per-(fund, stream) sub-seeds with BLAKE3.
//! Derivation is hash-based, so the seed a fund receives does not depend on
//! thread scheduling or on which other funds are in the batch.

use crate::domain::FundId;
use rand::rngs::StdRng;
use rand::SeedableRng;

#[derive(Debug, Clone)]
pub struct RngHierarchy {
    master_seed: u64,
}

impl RngHierarchy {
    pub fn new(master_seed: u64) -> Self {
        Self { master_seed }
    }

    pub fn master_seed(&self) -> u64 {
        self.master_seed
    }

    /// Sub-seed for one fund and one stream (e.g. a loss horizon).
    pub fn sub_seed(&self, fund: &FundId, stream: u64) -> u64 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.master_seed.to_le_bytes());
        hasher.update(fund.as_str().as_bytes());
        hasher.update(&[0u8]);
        hasher.update(&stream.to_le_bytes());
        let hash = hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&hash.as_bytes()[..8]);
        u64::from_le_bytes(bytes)
    }

    pub fn rng_for(&self, fund: &FundId, stream: u64) -> StdRng {
        StdRng::seed_from_u64(self.sub_seed(fund, stream))
    }
}
