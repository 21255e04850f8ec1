//! Lookup engine - resolves a world point to weighted cache entries.
//!
//! Read-only over the cell table: lookups never allocate or touch entries.
//!
//! # Trilinear Lattice
//!
//! ```text
//!   offset = (point - cell_center) / cell_diameter      in [-0.5, 0.5)
//!
//!   per axis:  offset <  0  →  lattice starts one cell below, t = 1 + offset
//!              offset >= 0  →  lattice starts at owning cell, t = offset
//!
//!        6──────7          corner i steps +X/+Y/+Z by bits 0/1/2
//!       /│     /│          weight(i) = Π (bit ? t : 1 - t)
//!      4─┼────5 │
//!      │ 2────┼─3          unoccupied or zero-weight corners are dropped,
//!      │/     │/           the rest renormalised to sum to one; a total
//!      0──────1            below WEIGHT_EPSILON is treated as a miss
//! ```

use glam::{IVec3, Vec3};
use smallvec::SmallVec;

use crate::cell::CellTable;
use crate::config::LookupStrategy;
use crate::constants::{CORNER_OFFSETS, MAX_LOOKUP_ENTRIES, WEIGHT_EPSILON};
use crate::entry::EntryStore;
use crate::grid::{GridAddressing, GridCoord};

/// One weighted entry in a lookup result.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LookupEntry {
  /// Entry index.
  pub entry: u32,
  /// Cell the entry was found through.
  pub cell: u32,
  /// Normalized interpolation weight.
  pub weight: f32,
}

/// Up to 8 weighted entries; empty means "no cached estimate".
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LookupResult {
  entries: SmallVec<[LookupEntry; MAX_LOOKUP_ENTRIES]>,
}

impl LookupResult {
  pub fn empty() -> Self {
    Self::default()
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = &LookupEntry> {
    self.entries.iter()
  }

  pub fn as_slice(&self) -> &[LookupEntry] {
    &self.entries
  }

  /// Sum of returned weights (1 for any non-empty result, 0 when empty).
  pub fn weight_sum(&self) -> f32 {
    self.entries.iter().map(|e| e.weight).sum()
  }

  /// Weighted sum of the entries' irradiance.
  pub fn accumulate(&self, store: &EntryStore) -> Vec3 {
    self
      .entries
      .iter()
      .fold(Vec3::ZERO, |acc, e| acc + store.irradiance(e.entry) * e.weight)
  }

  fn push(&mut self, entry: LookupEntry) {
    self.entries.push(entry);
  }

  /// Rescale weights to sum to one. A total below [`WEIGHT_EPSILON`] is
  /// negligible and empties the result.
  fn normalize(&mut self) {
    let sum = self.weight_sum();
    if sum < WEIGHT_EPSILON {
      self.entries.clear();
      return;
    }
    let inv = 1.0 / sum;
    for e in self.entries.iter_mut() {
      e.weight *= inv;
    }
  }
}

/// One corner of the interpolation lattice, before occupancy filtering.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LatticeCorner {
  /// Clamped coordinate within the owning cascade.
  pub coord: IVec3,
  /// Cell id of `coord`.
  pub cell: u32,
  /// Raw trilinear weight.
  pub weight: f32,
}

/// Lattice of 8 corners around a point, all in one cascade.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Lattice {
  pub cascade: u32,
  pub corners: [LatticeCorner; 8],
}

/// Read-side projection of the cell table through a grid.
pub struct LookupEngine<'a, G: GridAddressing + ?Sized> {
  grid: &'a G,
  cells: &'a CellTable,
}

impl<'a, G: GridAddressing + ?Sized> LookupEngine<'a, G> {
  pub fn new(grid: &'a G, cells: &'a CellTable) -> Self {
    Self { grid, cells }
  }

  /// Owning cascade/coordinate and cell id of a point.
  #[inline]
  pub fn owning_cell(&self, point: Vec3, viewpoint: Vec3) -> (GridCoord, u32) {
    let gc = self.grid.to_grid_coordinate(point, viewpoint);
    let cell = self.grid.coordinate_to_cell_id(gc.coord, gc.cascade);
    (gc, cell)
  }

  pub fn lookup(&self, strategy: LookupStrategy, point: Vec3, viewpoint: Vec3) -> LookupResult {
    match strategy {
      LookupStrategy::Nearest => self.nearest(point, viewpoint),
      LookupStrategy::Trilinear => self.trilinear(point, viewpoint),
    }
  }

  /// Owning cell's entry with weight 1, or empty.
  pub fn nearest(&self, point: Vec3, viewpoint: Vec3) -> LookupResult {
    let (_, cell) = self.owning_cell(point, viewpoint);
    let mut result = LookupResult::empty();
    if let Some(entry) = self.cells.state(cell).entry() {
      result.push(LookupEntry {
        entry,
        cell,
        weight: 1.0,
      });
    }
    result
  }

  /// The 8 interpolation corners of a point, clamped to its cascade.
  pub fn lattice(&self, point: Vec3, viewpoint: Vec3) -> Lattice {
    let GridCoord { cascade, coord } = self.grid.to_grid_coordinate(point, viewpoint);
    let diameter = self.grid.cell_diameter(cascade);
    let center = self.grid.cell_center(coord, cascade, viewpoint);

    // Points pinned to the outermost border can sit past half a cell away
    let offset = ((point - center) / diameter).clamp(Vec3::splat(-0.5), Vec3::splat(0.5));
    let below = offset.cmplt(Vec3::ZERO);
    let base = coord - IVec3::select(below, IVec3::ONE, IVec3::ZERO);
    let t = Vec3::select(below, offset + Vec3::ONE, offset);

    let corners = CORNER_OFFSETS.map(|step| {
      let coord = self.grid.clamp_coordinate(base + step);
      let wx = if step.x == 1 { t.x } else { 1.0 - t.x };
      let wy = if step.y == 1 { t.y } else { 1.0 - t.y };
      let wz = if step.z == 1 { t.z } else { 1.0 - t.z };
      LatticeCorner {
        coord,
        cell: self.grid.coordinate_to_cell_id(coord, cascade),
        weight: wx * wy * wz,
      }
    });

    Lattice { cascade, corners }
  }

  /// Occupied lattice corners in scan order, weights renormalised.
  #[cfg_attr(feature = "profiling", tracing::instrument(skip_all, name = "lookup::trilinear"))]
  pub fn trilinear(&self, point: Vec3, viewpoint: Vec3) -> LookupResult {
    let lattice = self.lattice(point, viewpoint);
    let mut result = LookupResult::empty();

    for corner in lattice.corners.iter().filter(|c| c.weight > 0.0) {
      if let Some(entry) = self.cells.state(corner.cell).entry() {
        result.push(LookupEntry {
          entry,
          cell: corner.cell,
          weight: corner.weight,
        });
      }
    }

    result.normalize();
    result
  }
}

#[cfg(test)]
#[path = "lookup_test.rs"]
mod lookup_test;
