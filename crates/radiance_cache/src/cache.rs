//! RadianceCache - the query-facing facade over the cache core.
//!
//! One query runs: grid addressing → lazy claim of the owning cell →
//! nearest or trilinear lookup → weighted irradiance sum → lifetime refresh
//! of the touched entries. Queries share the cache by `&self` and may run
//! from any number of threads; only session-level operations (moving the
//! viewpoint, resetting) take `&mut self`.

use std::sync::atomic::{AtomicU32, Ordering};

use glam::Vec3;
use rayon::prelude::*;

use crate::cell::{CellState, CellTable};
use crate::config::CacheConfig;
use crate::entry::{EntryStore, RepositionProposal};
use crate::error::ConfigError;
use crate::grid::{CascadedGrid, GridAddressing};
use crate::life::LifePolicy;
use crate::lookup::{LookupEngine, LookupResult};
use crate::metrics::{CacheMetrics, MetricsSnapshot};
use crate::pool::{CellResolution, EntryPool};

/// A single irradiance query.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IrradianceQuery {
  /// World-space point to shade.
  pub point: Vec3,
  /// Surface normal at `point`; recorded in reposition proposals.
  pub normal: Vec3,
  /// Priority rank (0 = highest).
  pub rank: u32,
  /// Pure read: no allocation and no lifetime refresh.
  pub freeze: bool,
  /// Refresh life and propose repositions for touched entries.
  pub keep_alive: bool,
}

impl IrradianceQuery {
  pub fn new(point: Vec3, normal: Vec3) -> Self {
    Self {
      point,
      normal,
      rank: 0,
      freeze: false,
      keep_alive: true,
    }
  }

  pub fn with_rank(mut self, rank: u32) -> Self {
    self.rank = rank;
    self
  }

  /// Disable every side effect.
  pub fn frozen(mut self) -> Self {
    self.freeze = true;
    self
  }

  /// Allocate and interpolate, but leave entry lifetimes alone.
  pub fn without_keep_alive(mut self) -> Self {
    self.keep_alive = false;
    self
  }
}

/// Everything a query observed.
#[derive(Clone, Debug, PartialEq)]
pub struct QueryReport {
  /// Interpolated irradiance estimate.
  pub irradiance: Vec3,
  /// Entries and weights the estimate was built from.
  pub lookup: LookupResult,
  /// How the owning cell was resolved. `None` for frozen queries.
  pub resolution: Option<CellResolution>,
}

/// Allocation counters and occupancy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CacheStats {
  /// Entries allocated this session.
  pub alloc_count: u32,
  /// One past the largest entry index handed out.
  pub entry_count: u32,
  /// Size of the entry pool.
  pub capacity: u32,
  /// Cells with the occupied flag set.
  pub occupied_cells: usize,
}

/// An entry below the recycle threshold, as seen by the maintenance pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RecycleCandidate {
  pub entry: u32,
  pub owner_cell: u32,
  pub life: u32,
  pub proposal: Option<RepositionProposal>,
}

/// Spatio-temporal irradiance cache over a cascaded cell grid.
pub struct RadianceCache<G: GridAddressing = CascadedGrid> {
  config: CacheConfig,
  grid: G,
  policy: LifePolicy,
  cells: CellTable,
  pool: EntryPool,
  entries: EntryStore,
  epoch: AtomicU32,
  viewpoint: Vec3,
  metrics: CacheMetrics,
}

impl RadianceCache<CascadedGrid> {
  /// Build a cache on the stock cascaded grid.
  pub fn new(config: CacheConfig) -> Result<Self, ConfigError> {
    config.validate()?;
    let grid = CascadedGrid::from_config(&config);
    Self::with_grid(config, grid)
  }
}

impl<G: GridAddressing> RadianceCache<G> {
  /// Build a cache addressed through a custom grid.
  ///
  /// The cell table is sized from the grid; the grid fields of `config`
  /// are not consulted.
  pub fn with_grid(config: CacheConfig, grid: G) -> Result<Self, ConfigError> {
    config.validate()?;

    let cell_count = grid.cell_count().ok_or(ConfigError::TooManyCells {
      cascade_size: grid.cascade_size(),
      cascade_count: grid.cascade_count(),
    })?;
    let cells = CellTable::new(cell_count);
    let pool = EntryPool::with_capacity(config.entry_capacity);
    let entries = EntryStore::new(config.entry_capacity);
    tracing::debug!(
      cells = cells.len(),
      capacity = config.entry_capacity,
      strategy = ?config.strategy,
      "radiance cache created"
    );

    Ok(Self {
      policy: LifePolicy::from_config(&config),
      config,
      grid,
      cells,
      pool,
      entries,
      epoch: AtomicU32::new(0),
      viewpoint: Vec3::ZERO,
      metrics: CacheMetrics::new(),
    })
  }

  pub fn config(&self) -> &CacheConfig {
    &self.config
  }

  pub fn grid(&self) -> &G {
    &self.grid
  }

  pub fn policy(&self) -> &LifePolicy {
    &self.policy
  }

  pub fn viewpoint(&self) -> Vec3 {
    self.viewpoint
  }

  /// Aging epoch; advanced by every [`Self::age_entries`] call.
  pub fn epoch(&self) -> u32 {
    self.epoch.load(Ordering::Acquire)
  }

  /// Move the cascade center. Call between query batches.
  pub fn set_viewpoint(&mut self, viewpoint: Vec3) {
    self.viewpoint = viewpoint;
  }

  fn engine(&self) -> LookupEngine<'_, G> {
    LookupEngine::new(&self.grid, &self.cells)
  }

  /// Irradiance estimate at a point. Zero when nothing is cached yet.
  pub fn lookup_irradiance(&self, query: &IrradianceQuery) -> Vec3 {
    self.query(query).irradiance
  }

  /// Run a query and report what it resolved and touched.
  #[cfg_attr(feature = "profiling", tracing::instrument(skip_all, name = "cache::query"))]
  pub fn query(&self, query: &IrradianceQuery) -> QueryReport {
    let engine = self.engine();
    let epoch = self.epoch();

    let resolution = (!query.freeze).then(|| {
      let (_, cell) = engine.owning_cell(query.point, self.viewpoint);
      let life = self.policy.life_for_rank(query.rank);
      let resolution = self.pool.resolve(
        &self.cells,
        cell,
        self.config.publish_spin_limit,
        |entry| self.entries.initialize(entry, life, cell, epoch),
      );
      self.metrics.record_resolution(resolution);
      resolution
    });

    let lookup = engine.lookup(self.config.strategy, query.point, self.viewpoint);
    let irradiance = lookup.accumulate(&self.entries);
    self.metrics.record_lookup(!lookup.is_empty());

    if !query.freeze && query.keep_alive {
      let allocated = match resolution {
        Some(CellResolution::Allocated(entry)) => Some(entry),
        _ => None,
      };
      let hits = lookup.as_slice();
      for (i, hit) in hits.iter().enumerate() {
        // Border clamping can list one entry at several corners
        if Some(hit.entry) == allocated || hits[..i].iter().any(|h| h.entry == hit.entry) {
          continue;
        }
        let outcome = self.policy.touch(
          &self.entries,
          hit.entry,
          query.rank,
          epoch,
          query.point,
          query.normal,
        );
        self.metrics.record_touch(&outcome);
      }
    }

    QueryReport {
      irradiance,
      lookup,
      resolution,
    }
  }

  /// Run many queries in parallel, returning estimates in input order.
  #[cfg_attr(feature = "profiling", tracing::instrument(skip_all, name = "cache::lookup_batch"))]
  pub fn lookup_batch(&self, queries: &[IrradianceQuery]) -> Vec<Vec3> {
    queries
      .par_iter()
      .map(|query| self.lookup_irradiance(query))
      .collect()
  }

  /// Side-effect-free lookup with the configured strategy.
  pub fn peek(&self, point: Vec3) -> LookupResult {
    self
      .engine()
      .lookup(self.config.strategy, point, self.viewpoint)
  }

  /// State of the cell owning `point`.
  pub fn cell_state(&self, point: Vec3) -> CellState {
    let (_, cell) = self.engine().owning_cell(point, self.viewpoint);
    self.cells.state(cell)
  }

  /// Entry owning the cell at `point`, if published.
  pub fn entry_at(&self, point: Vec3) -> Option<u32> {
    self.cell_state(point).entry()
  }

  /// Producer hook: store a new irradiance estimate for an entry.
  pub fn write_irradiance(&self, entry: u32, irradiance: Vec3) {
    self.entries.write_irradiance(entry, irradiance);
  }

  pub fn irradiance(&self, entry: u32) -> Vec3 {
    self.entries.irradiance(entry)
  }

  pub fn life(&self, entry: u32) -> u32 {
    self.entries.life(entry)
  }

  pub fn owner_cell(&self, entry: u32) -> Option<u32> {
    self.entries.owner_cell(entry)
  }

  pub fn proposal(&self, entry: u32) -> Option<RepositionProposal> {
    self.entries.proposal(entry)
  }

  /// Decay the life of every allocated entry and open a new epoch,
  /// returning how many entries are now below the recycle threshold.
  ///
  /// The first touch of an entry in the new epoch re-arms its life.
  /// Call between query batches.
  #[cfg_attr(feature = "profiling", tracing::instrument(skip_all, name = "cache::age_entries"))]
  pub fn age_entries(&self, amount: u32) -> usize {
    let candidates = (0..self.pool.entry_count())
      .into_par_iter()
      .filter_map(|entry| self.entries.decay_life(entry, amount))
      .filter(|&life| self.policy.is_recycle_candidate(life))
      .count();
    self.epoch.fetch_add(1, Ordering::AcqRel);
    candidates
  }

  /// Entries the maintenance pass may reclaim, with their proposals.
  pub fn recycle_candidates(&self) -> Vec<RecycleCandidate> {
    (0..self.pool.entry_count())
      .filter_map(|entry| {
        let life = self.entries.life(entry);
        if !self.policy.is_recycle_candidate(life) {
          return None;
        }
        Some(RecycleCandidate {
          entry,
          owner_cell: self.entries.owner_cell(entry)?,
          life,
          proposal: self.entries.proposal(entry),
        })
      })
      .collect()
  }

  pub fn stats(&self) -> CacheStats {
    CacheStats {
      alloc_count: self.pool.alloc_count(),
      entry_count: self.pool.entry_count(),
      capacity: self.pool.capacity(),
      occupied_cells: self.cells.occupied_count(),
    }
  }

  pub fn metrics(&self) -> MetricsSnapshot {
    self.metrics.snapshot()
  }

  /// Start a new session: every cell vacant, every entry free.
  pub fn reset(&mut self) {
    let stats = self.stats();
    self.cells.clear();
    self.pool.reset();
    self.entries.clear();
    *self.epoch.get_mut() = 0;
    self.metrics.reset();
    tracing::debug!(
      released = stats.alloc_count,
      "radiance cache reset"
    );
  }
}

impl<G: GridAddressing> std::fmt::Debug for RadianceCache<G> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("RadianceCache")
      .field("config", &self.config)
      .field("viewpoint", &self.viewpoint)
      .field("epoch", &self.epoch())
      .field("pool", &self.pool)
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
#[path = "cache_test.rs"]
mod cache_test;
