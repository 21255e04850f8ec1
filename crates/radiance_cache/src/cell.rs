//! Cell metadata table - one packed atomic record per addressable cell.
//!
//! ```text
//!  31        30         29 ........................... 0
//! ┌──────────┬──────────┬──────────────────────────────┐
//! │ OCCUPIED │ PUBLISHED│         entry index          │
//! └──────────┴──────────┴──────────────────────────────┘
//! ```
//!
//! A claim sets OCCUPIED with `fetch_or`; only the caller that saw it clear
//! owns the cell. The owner later stores `OCCUPIED | PUBLISHED | index` in
//! one release store. Between the two a cell reads as
//! [`CellState::Pending`].

use std::sync::atomic::{AtomicU32, Ordering};

use crate::constants::MAX_ENTRY_INDEX;

const OCCUPIED: u32 = 1 << 31;
const PUBLISHED: u32 = 1 << 30;
const INDEX_MASK: u32 = MAX_ENTRY_INDEX;

/// Decoded view of one cell record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CellState {
  /// No entry owns the cell.
  Vacant,
  /// Claimed, entry index not yet published.
  Pending,
  /// Owned by the given entry.
  Ready(u32),
}

impl CellState {
  #[inline]
  fn decode(bits: u32) -> Self {
    if bits & OCCUPIED == 0 {
      CellState::Vacant
    } else if bits & PUBLISHED == 0 {
      CellState::Pending
    } else {
      CellState::Ready(bits & INDEX_MASK)
    }
  }

  #[inline]
  pub fn is_occupied(&self) -> bool {
    !matches!(self, CellState::Vacant)
  }

  /// Entry index, if published.
  #[inline]
  pub fn entry(&self) -> Option<u32> {
    match *self {
      CellState::Ready(entry) => Some(entry),
      _ => None,
    }
  }
}

/// Result of trying to claim a cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CellClaim {
  /// The caller flipped the occupied flag and must allocate.
  Won,
  /// Someone else already holds the cell.
  Lost,
}

/// Shared, lock-free cell metadata.
pub struct CellTable {
  cells: Box<[AtomicU32]>,
}

impl CellTable {
  /// Create a table of `len` vacant cells.
  pub fn new(len: u32) -> Self {
    Self {
      cells: (0..len).map(|_| AtomicU32::new(0)).collect(),
    }
  }

  pub fn len(&self) -> usize {
    self.cells.len()
  }

  pub fn is_empty(&self) -> bool {
    self.cells.is_empty()
  }

  /// Current state of a cell. Out-of-range ids read as vacant.
  #[inline]
  pub fn state(&self, cell: u32) -> CellState {
    match self.cells.get(cell as usize) {
      Some(record) => CellState::decode(record.load(Ordering::Acquire)),
      None => CellState::Vacant,
    }
  }

  /// Atomically set the occupied flag, reporting whether this caller won.
  #[inline]
  pub fn try_claim(&self, cell: u32) -> CellClaim {
    let Some(record) = self.cells.get(cell as usize) else {
      return CellClaim::Lost;
    };
    let prev = record.fetch_or(OCCUPIED, Ordering::AcqRel);
    if prev & OCCUPIED == 0 {
      CellClaim::Won
    } else {
      CellClaim::Lost
    }
  }

  /// Publish the owning entry. Only the claim winner calls this.
  #[inline]
  pub fn publish(&self, cell: u32, entry: u32) {
    debug_assert!(entry <= INDEX_MASK);
    if let Some(record) = self.cells.get(cell as usize) {
      record.store(OCCUPIED | PUBLISHED | (entry & INDEX_MASK), Ordering::Release);
    }
  }

  /// Undo a claim whose allocation failed.
  #[inline]
  pub fn release_claim(&self, cell: u32) {
    if let Some(record) = self.cells.get(cell as usize) {
      record.fetch_and(!OCCUPIED, Ordering::AcqRel);
    }
  }

  /// Poll a pending cell until its entry is published or the budget runs out.
  pub fn wait_published(&self, cell: u32, spin_limit: u32) -> CellState {
    let mut state = self.state(cell);
    let mut spins = 0;
    while state == CellState::Pending && spins < spin_limit {
      std::hint::spin_loop();
      spins += 1;
      state = self.state(cell);
    }
    state
  }

  /// Number of cells whose occupied flag is set.
  pub fn occupied_count(&self) -> usize {
    self
      .cells
      .iter()
      .filter(|record| record.load(Ordering::Relaxed) & OCCUPIED != 0)
      .count()
  }

  /// Mark every cell vacant.
  pub fn clear(&mut self) {
    for record in self.cells.iter_mut() {
      *record.get_mut() = 0;
    }
  }
}

impl std::fmt::Debug for CellTable {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "CellTable([{} cells])", self.cells.len())
  }
}
