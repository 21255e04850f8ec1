//! Engine-agnostic cache statistics.
//!
//! Feature-gated and runtime-toggled to ensure zero overhead when disabled.
//! Counters are relaxed atomics so concurrent queries record without locks.
//!
//! # Usage
//!
//! ```ignore
//! use radiance_cache::metrics::COLLECT_METRICS;
//!
//! // Compile with --features metrics
//! // Runtime toggle:
//! COLLECT_METRICS.store(false, Ordering::Relaxed);
//!
//! let snapshot = cache.metrics();
//! println!("hit rate {:.2}", snapshot.hit_rate());
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::life::TouchOutcome;
use crate::pool::CellResolution;

/// Runtime toggle for metrics collection.
/// Set to false to disable metrics gathering at runtime.
pub static COLLECT_METRICS: AtomicBool = AtomicBool::new(true);

/// Check if metrics collection is enabled (both compile-time and runtime).
#[inline]
pub fn is_enabled() -> bool {
  #[cfg(feature = "metrics")]
  {
    COLLECT_METRICS.load(Ordering::Relaxed)
  }
  #[cfg(not(feature = "metrics"))]
  {
    false
  }
}

/// Live counters owned by one cache.
#[derive(Debug, Default)]
pub struct CacheMetrics {
  lookups: AtomicU64,
  hits: AtomicU64,
  allocations: AtomicU64,
  pending_misses: AtomicU64,
  exhausted_misses: AtomicU64,
  touches: AtomicU64,
  recycle_touches: AtomicU64,
  proposals: AtomicU64,
}

/// Point-in-time copy of [`CacheMetrics`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
  /// Queries served.
  pub lookups: u64,
  /// Queries that found at least one entry.
  pub hits: u64,
  /// Entries allocated.
  pub allocations: u64,
  /// Claim races lost before the winner published.
  pub pending_misses: u64,
  /// Allocations refused because the pool was empty.
  pub exhausted_misses: u64,
  /// Lifetime refreshes applied.
  pub touches: u64,
  /// Touches that found the entry below the recycle threshold.
  pub recycle_touches: u64,
  /// Reposition proposals stored.
  pub proposals: u64,
}

impl MetricsSnapshot {
  /// Fraction of lookups that found an entry.
  pub fn hit_rate(&self) -> f64 {
    if self.lookups == 0 {
      0.0
    } else {
      self.hits as f64 / self.lookups as f64
    }
  }
}

#[inline]
fn bump(counter: &AtomicU64) {
  counter.fetch_add(1, Ordering::Relaxed);
}

impl CacheMetrics {
  pub fn new() -> Self {
    Self::default()
  }

  /// Record a finished lookup.
  #[inline]
  pub fn record_lookup(&self, hit: bool) {
    if !is_enabled() {
      return;
    }
    bump(&self.lookups);
    if hit {
      bump(&self.hits);
    }
  }

  /// Record how the owning cell was resolved.
  #[inline]
  pub fn record_resolution(&self, resolution: CellResolution) {
    if !is_enabled() {
      return;
    }
    match resolution {
      CellResolution::Allocated(_) => bump(&self.allocations),
      CellResolution::Pending => bump(&self.pending_misses),
      CellResolution::Exhausted => bump(&self.exhausted_misses),
      CellResolution::Existing(_) => {}
    }
  }

  /// Record a lifetime refresh.
  #[inline]
  pub fn record_touch(&self, outcome: &TouchOutcome) {
    if !is_enabled() {
      return;
    }
    bump(&self.touches);
    if outcome.recycle_candidate {
      bump(&self.recycle_touches);
    }
    if outcome.proposed {
      bump(&self.proposals);
    }
  }

  pub fn snapshot(&self) -> MetricsSnapshot {
    MetricsSnapshot {
      lookups: self.lookups.load(Ordering::Relaxed),
      hits: self.hits.load(Ordering::Relaxed),
      allocations: self.allocations.load(Ordering::Relaxed),
      pending_misses: self.pending_misses.load(Ordering::Relaxed),
      exhausted_misses: self.exhausted_misses.load(Ordering::Relaxed),
      touches: self.touches.load(Ordering::Relaxed),
      recycle_touches: self.recycle_touches.load(Ordering::Relaxed),
      proposals: self.proposals.load(Ordering::Relaxed),
    }
  }

  /// Reset all counters to zero.
  pub fn reset(&mut self) {
    *self = Self::default();
  }
}
