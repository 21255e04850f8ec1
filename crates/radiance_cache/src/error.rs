//! Construction errors.
//!
//! Queries never fail: misses, races and exhaustion all degrade to a zero
//! contribution. Only building a cache from a bad configuration is fallible.

use thiserror::Error;

/// Invalid cache configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
  #[error("entry capacity must be non-zero")]
  ZeroCapacity,

  #[error("entry capacity {0} exceeds the largest addressable entry index")]
  CapacityTooLarge(u32),

  #[error("cascade size {0} must be a non-zero power of two")]
  InvalidCascadeSize(u32),

  #[error("cascade count must be non-zero")]
  ZeroCascadeCount,

  #[error("{cascade_count} cascades of {cascade_size}³ cells do not fit a 32-bit cell id")]
  TooManyCells {
    cascade_size: u32,
    cascade_count: u32,
  },

  #[error("cell diameter {0} must be finite and positive")]
  InvalidCellDiameter(f32),

  #[error("rank count and life per rank must be non-zero")]
  ZeroLifeBudget,

  #[error("{rank_count} ranks of {life_per_rank} life overflow a 32-bit life counter")]
  LifeBudgetOverflow {
    rank_count: u32,
    life_per_rank: u32,
  },
}
