//! Entry pool and allocator.
//!
//! Entries are handed out front-to-back from a [`FreePool`]. `alloc_count`
//! is the cursor into that list and `entry_count` the high-water mark of
//! indices ever handed out. Both only move through atomic read-modify-write
//! operations, so any number of queries may allocate at once.
//!
//! # Claim Protocol
//!
//! ```text
//!   state(cell)
//!      │
//!      ├── Ready(e) ─────────────────────────────────► Existing(e)
//!      │
//!      └── Vacant/Pending ── try_claim (fetch_or) ──┐
//!                                                   │
//!            Won ── alloc_count++ ── free[k] ── entry_count = max(.., e+1)
//!             │        │                        └── init(e) ── publish ► Allocated(e)
//!             │        └── exhausted ── release_claim ──────────────────► Exhausted
//!             │
//!            Lost ── wait_published ── Ready(e) ────────────────────────► Existing(e)
//!                                  └── still pending ───────────────────► Pending
//! ```

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::cell::{CellClaim, CellState, CellTable};

/// Ordered list of entry indices available for allocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FreePool {
  slots: Box<[u32]>,
}

impl FreePool {
  /// Indices `0..capacity` in order.
  pub fn sequential(capacity: u32) -> Self {
    Self {
      slots: (0..capacity).collect(),
    }
  }

  /// Explicit allocation order. Indices must be distinct.
  pub fn from_indices(indices: impl IntoIterator<Item = u32>) -> Self {
    Self {
      slots: indices.into_iter().collect(),
    }
  }

  pub fn len(&self) -> usize {
    self.slots.len()
  }

  pub fn is_empty(&self) -> bool {
    self.slots.is_empty()
  }

  #[inline]
  pub fn get(&self, cursor: u32) -> Option<u32> {
    self.slots.get(cursor as usize).copied()
  }
}

/// How a query's cell was resolved to an entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CellResolution {
  /// The cell already had a published entry.
  Existing(u32),
  /// This caller allocated and initialized the entry.
  Allocated(u32),
  /// Another caller owns the cell but has not published yet.
  Pending,
  /// The cell was vacant and the pool is empty.
  Exhausted,
}

impl CellResolution {
  /// Entry index, if one is usable by this query.
  #[inline]
  pub fn entry(&self) -> Option<u32> {
    match *self {
      CellResolution::Existing(entry) | CellResolution::Allocated(entry) => Some(entry),
      CellResolution::Pending | CellResolution::Exhausted => None,
    }
  }
}

/// Fixed-capacity entry allocator.
pub struct EntryPool {
  free: FreePool,
  alloc_count: AtomicU32,
  entry_count: AtomicU32,
  exhaustion_logged: AtomicBool,
}

impl EntryPool {
  pub fn new(free: FreePool) -> Self {
    Self {
      free,
      alloc_count: AtomicU32::new(0),
      entry_count: AtomicU32::new(0),
      exhaustion_logged: AtomicBool::new(false),
    }
  }

  /// Pool handing out `0..capacity` in order.
  pub fn with_capacity(capacity: u32) -> Self {
    Self::new(FreePool::sequential(capacity))
  }

  /// Number of slots in the free pool.
  pub fn capacity(&self) -> u32 {
    self.free.len() as u32
  }

  /// Allocations performed this session.
  pub fn alloc_count(&self) -> u32 {
    self.alloc_count.load(Ordering::Acquire)
  }

  /// One past the largest entry index handed out this session.
  pub fn entry_count(&self) -> u32 {
    self.entry_count.load(Ordering::Acquire)
  }

  /// Free slots left.
  pub fn remaining(&self) -> u32 {
    self.capacity().saturating_sub(self.alloc_count())
  }

  /// Take the next free entry, or `None` when the pool is used up.
  ///
  /// The cursor saturates at the pool length, so exhaustion never walks
  /// past the free list.
  pub fn allocate(&self) -> Option<u32> {
    let len = self.capacity();
    let cursor = self
      .alloc_count
      .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
        (n < len).then(|| n + 1)
      })
      .ok()?;
    let entry = self.free.get(cursor)?;
    self.entry_count.fetch_max(entry + 1, Ordering::AcqRel);
    Some(entry)
  }

  /// Resolve `cell` to an entry, allocating it if this caller is first.
  ///
  /// `init` runs exactly once per allocation, before the entry index is
  /// published, so racing readers never see an uninitialized entry.
  pub fn resolve(
    &self,
    cells: &CellTable,
    cell: u32,
    spin_limit: u32,
    init: impl FnOnce(u32),
  ) -> CellResolution {
    if let CellState::Ready(entry) = cells.state(cell) {
      return CellResolution::Existing(entry);
    }

    match cells.try_claim(cell) {
      CellClaim::Won => match self.allocate() {
        Some(entry) => {
          init(entry);
          cells.publish(cell, entry);
          CellResolution::Allocated(entry)
        }
        None => {
          cells.release_claim(cell);
          self.report_exhaustion();
          CellResolution::Exhausted
        }
      },
      CellClaim::Lost => match cells.wait_published(cell, spin_limit) {
        CellState::Ready(entry) => CellResolution::Existing(entry),
        CellState::Pending | CellState::Vacant => CellResolution::Pending,
      },
    }
  }

  fn report_exhaustion(&self) {
    if !self.exhaustion_logged.swap(true, Ordering::Relaxed) {
      tracing::warn!(
        capacity = self.capacity(),
        "radiance cache entry pool exhausted; new cells will miss until reset"
      );
    }
  }

  /// Rewind the allocator for a new session.
  pub fn reset(&mut self) {
    *self.alloc_count.get_mut() = 0;
    *self.entry_count.get_mut() = 0;
    *self.exhaustion_logged.get_mut() = false;
  }
}

impl std::fmt::Debug for EntryPool {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("EntryPool")
      .field("capacity", &self.capacity())
      .field("alloc_count", &self.alloc_count())
      .field("entry_count", &self.entry_count())
      .finish()
  }
}

#[cfg(test)]
#[path = "pool_test.rs"]
mod pool_test;
