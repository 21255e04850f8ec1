//! Grid, lifetime and interpolation constants.
//!
//! # Cascade Layout
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         CASCADE WINDOWS                                 │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │   cascade 2  ┌───────────────────────────────────────┐  d = 4 * base    │
//! │              │   cascade 1  ┌───────────────────┐    │  d = 2 * base    │
//! │              │              │ cascade 0 ┌───┐   │    │  d = base        │
//! │              │              │           │ * │   │    │                  │
//! │              │              │           └───┘   │    │  * = viewpoint   │
//! │              │              └───────────────────┘    │                  │
//! │              └───────────────────────────────────────┘                  │
//! │                                                                         │
//! │  Every cascade holds CASCADE_SIZE³ cells centered on the viewpoint.     │
//! │  Cell ids are dense: cascade * SIZE³ + x + y * SIZE + z * SIZE².        │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Life Budget
//!
//! ```text
//! rank:   0     1     2     3
//! life:  32    24    16     8      life = (RANK_COUNT - rank) * LIFE_PER_RANK
//!                          └── RECYCLE_THRESHOLD: life below this is eligible
//! ```
//!
//! # Lattice Corners
//!
//! ```text
//! Corner indices (binary: ZYX), scanned x-fastest, z-slowest:
//!   0 = (0,0,0)    4 = (0,0,1)
//!   1 = (1,0,0)    5 = (1,0,1)
//!   2 = (0,1,0)    6 = (0,1,1)
//!   3 = (1,1,0)    7 = (1,1,1)
//! ```

use glam::IVec3;

/// Default cells per axis in one cascade (must be a power of two).
pub const DEFAULT_CASCADE_SIZE: u32 = 32;

/// Default number of cascades.
pub const DEFAULT_CASCADE_COUNT: u32 = 12;

/// Default world-space diameter of a cascade 0 cell.
pub const DEFAULT_CELL_DIAMETER: f32 = 0.16;

/// Default number of entry slots in the pool.
pub const DEFAULT_ENTRY_CAPACITY: u32 = 1 << 16;

/// Number of priority ranks (0 = highest priority).
pub const DEFAULT_RANK_COUNT: u32 = 4;

/// Life granted per rank step.
pub const DEFAULT_LIFE_PER_RANK: u32 = 8;

/// Entries whose life falls below this are recycle candidates.
pub const DEFAULT_RECYCLE_THRESHOLD: u32 = DEFAULT_LIFE_PER_RANK;

/// Spin iterations a race loser polls for the winner's publish.
pub const DEFAULT_PUBLISH_SPIN_LIMIT: u32 = 64;

/// Floor on the trilinear weight sum before renormalisation.
pub const WEIGHT_EPSILON: f32 = 1e-5;

/// Maximum number of entries a single lookup can return.
pub const MAX_LOOKUP_ENTRIES: usize = 8;

/// Largest entry index a cell record can hold (30 bits).
pub const MAX_ENTRY_INDEX: u32 = (1 << 30) - 1;

/// Lattice step for each of the 8 trilinear corners.
pub const CORNER_OFFSETS: [IVec3; 8] = [
  IVec3::new(0, 0, 0),
  IVec3::new(1, 0, 0),
  IVec3::new(0, 1, 0),
  IVec3::new(1, 1, 0),
  IVec3::new(0, 0, 1),
  IVec3::new(1, 0, 1),
  IVec3::new(0, 1, 1),
  IVec3::new(1, 1, 1),
];

#[cfg(test)]
#[path = "constants_test.rs"]
mod constants_test;
