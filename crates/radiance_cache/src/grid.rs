//! Grid addressing - maps world points onto cascaded cells.
//!
//! The cache treats addressing as an external, deterministic collaborator
//! behind [`GridAddressing`]. [`CascadedGrid`] is the stock implementation:
//! nested cubes of `cascade_size³` cells centered on the viewpoint, each
//! cascade twice as coarse as the previous one.
//!
//! Cascade windows are snapped to their own cell lattice, so a point keeps
//! its cell while the viewpoint moves inside one cell. Once the window
//! scrolls, coordinates (and therefore cell ids) shift with it; remapping
//! entries across a scroll belongs to the maintenance pass.

use glam::{IVec3, Vec3};

use crate::config::CacheConfig;

/// A cell coordinate inside one cascade.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GridCoord {
  /// Cascade index (0 = finest).
  pub cascade: u32,
  /// Coordinate within the cascade, each axis in `[0, cascade_size)`.
  pub coord: IVec3,
}

/// Pure, side-effect-free mapping from world space to cache cells.
pub trait GridAddressing: Send + Sync {
  /// Owning cascade and in-cascade coordinate of `point`.
  fn to_grid_coordinate(&self, point: Vec3, viewpoint: Vec3) -> GridCoord;

  /// Dense cell id in `0..cell_count()`.
  fn coordinate_to_cell_id(&self, coord: IVec3, cascade: u32) -> u32;

  /// World-space center of a cell.
  fn cell_center(&self, coord: IVec3, cascade: u32, viewpoint: Vec3) -> Vec3;

  /// World-space diameter of a cell in `cascade`.
  fn cell_diameter(&self, cascade: u32) -> f32;

  /// Cells per axis in one cascade.
  fn cascade_size(&self) -> u32;

  /// Number of cascades.
  fn cascade_count(&self) -> u32;

  /// Total number of addressable cells, or `None` if it overflows a
  /// 32-bit cell id.
  fn cell_count(&self) -> Option<u32> {
    let size = self.cascade_size();
    size
      .checked_mul(size)?
      .checked_mul(size)?
      .checked_mul(self.cascade_count())
  }

  /// Clamp a coordinate into the valid range of a cascade.
  #[inline]
  fn clamp_coordinate(&self, coord: IVec3) -> IVec3 {
    coord.clamp(IVec3::ZERO, IVec3::splat(self.cascade_size() as i32 - 1))
  }
}

/// Viewpoint-centered cascades of cubic cells.
#[derive(Clone, Debug, PartialEq)]
pub struct CascadedGrid {
  cell_diameter: f32,
  cascade_size: u32,
  cascade_count: u32,
}

impl CascadedGrid {
  /// Create a grid. `cascade_size` should be a power of two; see
  /// [`CacheConfig::validate`].
  pub fn new(cell_diameter: f32, cascade_size: u32, cascade_count: u32) -> Self {
    Self {
      cell_diameter,
      cascade_size,
      cascade_count,
    }
  }

  pub fn from_config(config: &CacheConfig) -> Self {
    Self::new(
      config.cell_diameter,
      config.cascade_size,
      config.cascade_count,
    )
  }

  /// Lattice position (in cells) of a cascade's window minimum.
  #[inline]
  pub fn cascade_origin(&self, cascade: u32, viewpoint: Vec3) -> IVec3 {
    let diameter = self.cell_diameter(cascade);
    (viewpoint / diameter).floor().as_ivec3() - IVec3::splat(self.cascade_size as i32 / 2)
  }

  #[inline]
  fn unclamped_coordinate(&self, point: Vec3, cascade: u32, viewpoint: Vec3) -> IVec3 {
    let diameter = self.cell_diameter(cascade);
    (point / diameter).floor().as_ivec3() - self.cascade_origin(cascade, viewpoint)
  }

  #[inline]
  fn in_window(&self, coord: IVec3) -> bool {
    let size = self.cascade_size as i32;
    coord.cmpge(IVec3::ZERO).all() && coord.cmplt(IVec3::splat(size)).all()
  }
}

impl Default for CascadedGrid {
  fn default() -> Self {
    Self::from_config(&CacheConfig::default())
  }
}

impl GridAddressing for CascadedGrid {
  fn to_grid_coordinate(&self, point: Vec3, viewpoint: Vec3) -> GridCoord {
    for cascade in 0..self.cascade_count {
      let coord = self.unclamped_coordinate(point, cascade, viewpoint);
      if self.in_window(coord) {
        return GridCoord { cascade, coord };
      }
    }

    // Beyond the coarsest window: pin to its border
    let cascade = self.cascade_count.saturating_sub(1);
    let coord = self.unclamped_coordinate(point, cascade, viewpoint);
    GridCoord {
      cascade,
      coord: self.clamp_coordinate(coord),
    }
  }

  #[inline]
  fn coordinate_to_cell_id(&self, coord: IVec3, cascade: u32) -> u32 {
    let size = self.cascade_size;
    let c = self.clamp_coordinate(coord).as_uvec3();
    let cascade = cascade.min(self.cascade_count.saturating_sub(1));
    cascade * size * size * size + c.x + c.y * size + c.z * size * size
  }

  #[inline]
  fn cell_center(&self, coord: IVec3, cascade: u32, viewpoint: Vec3) -> Vec3 {
    let diameter = self.cell_diameter(cascade);
    let lattice = self.cascade_origin(cascade, viewpoint) + coord;
    (lattice.as_vec3() + Vec3::splat(0.5)) * diameter
  }

  #[inline]
  fn cell_diameter(&self, cascade: u32) -> f32 {
    self.cell_diameter * 2.0_f32.powi(cascade as i32)
  }

  fn cascade_size(&self) -> u32 {
    self.cascade_size
  }

  fn cascade_count(&self) -> u32 {
    self.cascade_count
  }
}

#[cfg(test)]
#[path = "grid_test.rs"]
mod grid_test;
