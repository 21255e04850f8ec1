//! CacheConfig - sizing, grid and lifetime settings for a radiance cache.

use crate::constants::{
  DEFAULT_CASCADE_COUNT, DEFAULT_CASCADE_SIZE, DEFAULT_CELL_DIAMETER, DEFAULT_ENTRY_CAPACITY,
  DEFAULT_LIFE_PER_RANK, DEFAULT_PUBLISH_SPIN_LIMIT, DEFAULT_RANK_COUNT,
  DEFAULT_RECYCLE_THRESHOLD, MAX_ENTRY_INDEX,
};
use crate::error::ConfigError;

/// How a query resolves cache entries around its point.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LookupStrategy {
  /// Single owning cell, weight 1.
  Nearest,

  /// Up to 8 lattice cells, trilinearly weighted.
  #[default]
  Trilinear,
}

/// Configuration for a [`RadianceCache`](crate::RadianceCache).
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CacheConfig {
  /// Number of entry slots in the pool.
  pub entry_capacity: u32,

  /// Cells per axis in one cascade. Power of two.
  pub cascade_size: u32,

  /// Number of cascades.
  pub cascade_count: u32,

  /// World-space diameter of a cascade 0 cell.
  /// Each coarser cascade doubles it.
  pub cell_diameter: f32,

  /// Interpolation strategy for lookups.
  pub strategy: LookupStrategy,

  /// Number of priority ranks.
  pub rank_count: u32,

  /// Life granted per rank step.
  pub life_per_rank: u32,

  /// Life below which an entry is a recycle candidate.
  pub recycle_threshold: u32,

  /// Spin iterations a race loser waits for the winner's publish.
  /// 0 = report a transient miss immediately.
  pub publish_spin_limit: u32,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      entry_capacity: DEFAULT_ENTRY_CAPACITY,
      cascade_size: DEFAULT_CASCADE_SIZE,
      cascade_count: DEFAULT_CASCADE_COUNT,
      cell_diameter: DEFAULT_CELL_DIAMETER,
      strategy: LookupStrategy::default(),
      rank_count: DEFAULT_RANK_COUNT,
      life_per_rank: DEFAULT_LIFE_PER_RANK,
      recycle_threshold: DEFAULT_RECYCLE_THRESHOLD,
      publish_spin_limit: DEFAULT_PUBLISH_SPIN_LIMIT,
    }
  }
}

impl CacheConfig {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_entry_capacity(mut self, capacity: u32) -> Self {
    self.entry_capacity = capacity;
    self
  }

  pub fn with_cascades(mut self, cascade_size: u32, cascade_count: u32) -> Self {
    self.cascade_size = cascade_size;
    self.cascade_count = cascade_count;
    self
  }

  pub fn with_cell_diameter(mut self, diameter: f32) -> Self {
    self.cell_diameter = diameter;
    self
  }

  pub fn with_strategy(mut self, strategy: LookupStrategy) -> Self {
    self.strategy = strategy;
    self
  }

  /// Set the rank count and life per rank. The recycle threshold follows
  /// the lowest rank's budget.
  pub fn with_life_budget(mut self, rank_count: u32, life_per_rank: u32) -> Self {
    self.rank_count = rank_count;
    self.life_per_rank = life_per_rank;
    self.recycle_threshold = life_per_rank;
    self
  }

  pub fn with_recycle_threshold(mut self, threshold: u32) -> Self {
    self.recycle_threshold = threshold;
    self
  }

  pub fn with_publish_spin_limit(mut self, limit: u32) -> Self {
    self.publish_spin_limit = limit;
    self
  }

  /// Total number of cells addressed by the grid.
  ///
  /// Returns `None` if the count overflows a 32-bit cell id.
  pub fn cell_count(&self) -> Option<u32> {
    let per_cascade = self
      .cascade_size
      .checked_mul(self.cascade_size)?
      .checked_mul(self.cascade_size)?;
    per_cascade.checked_mul(self.cascade_count)
  }

  /// Check that the configuration describes a buildable cache.
  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.entry_capacity == 0 {
      return Err(ConfigError::ZeroCapacity);
    }
    if self.entry_capacity - 1 > MAX_ENTRY_INDEX {
      return Err(ConfigError::CapacityTooLarge(self.entry_capacity));
    }
    if !self.cascade_size.is_power_of_two() {
      return Err(ConfigError::InvalidCascadeSize(self.cascade_size));
    }
    if self.cascade_count == 0 {
      return Err(ConfigError::ZeroCascadeCount);
    }
    if self.cell_count().is_none() {
      return Err(ConfigError::TooManyCells {
        cascade_size: self.cascade_size,
        cascade_count: self.cascade_count,
      });
    }
    if !self.cell_diameter.is_finite() || self.cell_diameter <= 0.0 {
      return Err(ConfigError::InvalidCellDiameter(self.cell_diameter));
    }
    if self.rank_count == 0 || self.life_per_rank == 0 {
      return Err(ConfigError::ZeroLifeBudget);
    }
    if self.rank_count.checked_mul(self.life_per_rank).is_none() {
      return Err(ConfigError::LifeBudgetOverflow {
        rank_count: self.rank_count,
        life_per_rank: self.life_per_rank,
      });
    }
    Ok(())
  }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;
