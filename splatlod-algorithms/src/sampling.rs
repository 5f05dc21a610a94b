//! Uniform record sampling without replacement

use rand::prelude::*;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use splatlod_core::{Error, Result};

/// Check that a keep ratio lies in `(0, 1]`
///
/// NaN and out-of-range values are rejected rather than clamped.
pub fn validate_keep_ratio(keep_ratio: f64) -> Result<()> {
    if keep_ratio.is_nan() || keep_ratio <= 0.0 || keep_ratio > 1.0 {
        return Err(Error::InvalidRatio(keep_ratio));
    }
    Ok(())
}

/// Number of records retained for a ratio: `round(keep_ratio * record_count)`
///
/// Rounds half away from zero, so 50% of 3 keeps 2 and 33.3% of 1000 keeps 333.
pub fn retained_count(record_count: usize, keep_ratio: f64) -> Result<usize> {
    validate_keep_ratio(keep_ratio)?;
    let target = (keep_ratio * record_count as f64).round() as usize;
    Ok(target.min(record_count))
}

/// Ascending set of record indices selected for output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionSet {
    indices: Vec<usize>,
    source_count: usize,
}

impl RetentionSet {
    /// Every index of a source with `source_count` records
    pub fn full(source_count: usize) -> Self {
        Self {
            indices: (0..source_count).collect(),
            source_count,
        }
    }

    pub fn empty(source_count: usize) -> Self {
        Self {
            indices: Vec::new(),
            source_count,
        }
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Record count of the source the set was drawn from
    pub fn source_count(&self) -> usize {
        self.source_count
    }

    /// True when every source record is retained
    pub fn is_identity(&self) -> bool {
        self.indices.len() == self.source_count
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.indices.iter().copied()
    }

    pub fn into_vec(self) -> Vec<usize> {
        self.indices
    }
}

/// Select `round(keep_ratio * record_count)` distinct indices uniformly at random
///
/// Every subset of the target size is equally likely; the result is sorted
/// ascending regardless of draw order.
pub fn select_with_rng<R: Rng + ?Sized>(
    record_count: usize,
    keep_ratio: f64,
    rng: &mut R,
) -> Result<RetentionSet> {
    let amount = retained_count(record_count, keep_ratio)?;

    if amount == 0 {
        return Ok(RetentionSet::empty(record_count));
    }
    if amount == record_count {
        return Ok(RetentionSet::full(record_count));
    }

    let mut indices = rand::seq::index::sample(rng, record_count, amount).into_vec();
    indices.sort_unstable();

    Ok(RetentionSet {
        indices,
        source_count: record_count,
    })
}

/// [`select_with_rng`] using the thread-local RNG
pub fn select(record_count: usize, keep_ratio: f64) -> Result<RetentionSet> {
    select_with_rng(record_count, keep_ratio, &mut rand::thread_rng())
}

/// Uniform sampler owning its RNG, optionally seeded for reproducible output
#[derive(Debug, Clone)]
pub struct UniformSampler {
    rng: StdRng,
}

impl UniformSampler {
    /// Sampler seeded from OS entropy
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Sampler with a fixed seed
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn from_seed_option(seed: Option<u64>) -> Self {
        seed.map(Self::seeded).unwrap_or_default()
    }

    pub fn select(&mut self, record_count: usize, keep_ratio: f64) -> Result<RetentionSet> {
        select_with_rng(record_count, keep_ratio, &mut self.rng)
    }
}

impl Default for UniformSampler {
    fn default() -> Self {
        Self::new()
    }
}
