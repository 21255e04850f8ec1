use std::collections::HashSet;

use glam::IVec3;
use rayon::prelude::*;

use super::*;
use crate::config::LookupStrategy;
use crate::grid::GridCoord;

/// Unit cells, 8³ per cascade, viewpoint at the origin.
/// Cascade 0 coordinate (4,4,4) is centered on (0.5, 0.5, 0.5).
fn small_config() -> CacheConfig {
  CacheConfig::new()
    .with_entry_capacity(64)
    .with_cascades(8, 3)
    .with_cell_diameter(1.0)
}

fn small_cache() -> RadianceCache {
  RadianceCache::new(small_config()).unwrap()
}

fn query_at(point: Vec3) -> IrradianceQuery {
  IrradianceQuery::new(point, Vec3::Y)
}

const CENTER_A: Vec3 = Vec3::new(0.5, 0.5, 0.5);
const CENTER_B: Vec3 = Vec3::new(1.5, 0.5, 0.5);

fn allocate<G: GridAddressing>(cache: &RadianceCache<G>, point: Vec3, irradiance: Vec3) -> u32 {
  allocate_ranked(cache, point, 0, irradiance)
}

fn allocate_ranked<G: GridAddressing>(
  cache: &RadianceCache<G>,
  point: Vec3,
  rank: u32,
  irradiance: Vec3,
) -> u32 {
  let report = cache.query(&query_at(point).with_rank(rank));
  let entry = report
    .resolution
    .and_then(|r| r.entry())
    .expect("uncontended query allocates");
  cache.write_irradiance(entry, irradiance);
  entry
}

#[test]
fn test_invalid_config_is_rejected() {
  let err = RadianceCache::new(CacheConfig::new().with_entry_capacity(0)).unwrap_err();
  assert_eq!(err, ConfigError::ZeroCapacity);
}

#[test]
fn test_empty_cache_peek_misses() {
  let cache = small_cache();
  for point in [Vec3::ZERO, Vec3::new(-2.2, 3.1, 0.7), Vec3::splat(50.0)] {
    assert!(cache.peek(point).is_empty());
    let report = cache.query(&query_at(point).frozen());
    assert!(report.lookup.is_empty());
    assert_eq!(report.irradiance, Vec3::ZERO);
  }
  assert_eq!(cache.stats().alloc_count, 0);
}

#[test]
fn test_first_query_allocates_owning_cell() {
  let cache = small_cache();
  let report = cache.query(&query_at(CENTER_A).with_rank(1));

  assert_eq!(report.resolution, Some(CellResolution::Allocated(0)));
  assert_eq!(report.irradiance, Vec3::ZERO, "producer has not written yet");
  assert_eq!(cache.entry_at(CENTER_A), Some(0));
  assert_eq!(cache.life(0), cache.policy().life_for_rank(1));

  let (_, cell) = LookupEngine::new(cache.grid(), &cache.cells).owning_cell(CENTER_A, Vec3::ZERO);
  assert_eq!(cache.owner_cell(0), Some(cell));
  assert_eq!(cache.proposal(0), None, "allocating query does not propose");
}

#[test]
fn test_single_cell_at_center() {
  let cache = small_cache();
  let entry = allocate(&cache, CENTER_A, Vec3::new(1.0, 0.0, 0.0));

  let report = cache.query(&query_at(CENTER_A));
  assert_eq!(report.resolution, Some(CellResolution::Existing(entry)));
  assert_eq!(report.lookup.len(), 1);
  assert_eq!(report.lookup.as_slice()[0].weight, 1.0);
  assert_eq!(report.irradiance, Vec3::new(1.0, 0.0, 0.0));
}

#[test]
fn test_nearest_and_trilinear_agree_at_center() {
  let trilinear = small_cache();
  let nearest = RadianceCache::new(small_config().with_strategy(LookupStrategy::Nearest)).unwrap();

  for cache in [&trilinear, &nearest] {
    allocate(cache, CENTER_A, Vec3::new(0.2, 0.4, 0.6));
    allocate(cache, CENTER_B, Vec3::ONE);
  }

  let a = trilinear.query(&query_at(CENTER_A).frozen());
  let b = nearest.query(&query_at(CENTER_A).frozen());
  assert_eq!(a.lookup, b.lookup);
  assert_eq!(a.irradiance, b.irradiance);
}

#[test]
fn test_midpoint_between_two_cells() {
  let cache = small_cache();
  allocate(&cache, CENTER_A, Vec3::new(1.0, 0.0, 0.0));
  allocate(&cache, CENTER_B, Vec3::new(0.0, 1.0, 0.0));

  let estimate = cache.lookup_irradiance(&query_at(Vec3::new(1.0, 0.5, 0.5)));
  assert_eq!(estimate, Vec3::new(0.5, 0.5, 0.0));
}

#[test]
fn test_nearest_strategy_snaps_to_owner() {
  let cache = RadianceCache::new(small_config().with_strategy(LookupStrategy::Nearest)).unwrap();
  allocate(&cache, CENTER_A, Vec3::new(1.0, 0.0, 0.0));
  allocate(&cache, CENTER_B, Vec3::new(0.0, 1.0, 0.0));

  let estimate = cache.lookup_irradiance(&query_at(Vec3::new(1.0, 0.5, 0.5)).frozen());
  assert_eq!(estimate, Vec3::new(0.0, 1.0, 0.0));
}

#[test]
fn test_frozen_query_has_no_side_effects() {
  let cache = small_cache();
  let entry = allocate(&cache, CENTER_A, Vec3::ONE);
  let life = cache.life(entry);

  let report = cache.query(&query_at(CENTER_A).with_rank(3).frozen());
  assert_eq!(report.resolution, None);
  assert_eq!(report.irradiance, Vec3::ONE);
  assert_eq!(cache.life(entry), life);
  assert_eq!(cache.proposal(entry), None);

  cache.query(&query_at(Vec3::new(-2.5, 0.5, 0.5)).frozen());
  assert_eq!(cache.stats().alloc_count, 1, "frozen query never allocates");
}

#[test]
fn test_no_keep_alive_allocates_but_skips_lifetime() {
  let cache = small_cache();
  let entry = allocate(&cache, CENTER_A, Vec3::ONE);
  let life = cache.life(entry);

  let report = cache.query(&query_at(CENTER_A).with_rank(3).without_keep_alive());
  assert_eq!(report.irradiance, Vec3::ONE);
  assert_eq!(cache.life(entry), life);
  assert_eq!(cache.proposal(entry), None);

  let fresh = cache.query(&query_at(CENTER_B).without_keep_alive());
  assert!(matches!(fresh.resolution, Some(CellResolution::Allocated(_))));
}

#[test]
fn test_touch_lowers_life_and_proposes() {
  let cache = small_cache();
  let entry = allocate(&cache, CENTER_A, Vec3::ONE);
  assert_eq!(cache.life(entry), 32);

  let point = Vec3::new(0.6, 0.5, 0.5);
  cache.query(&IrradianceQuery::new(point, Vec3::X).with_rank(0));
  let proposal = cache.proposal(entry).expect("rank 0 query proposes");
  assert_eq!(proposal.position, point);
  assert_eq!(proposal.normal, Vec3::X);

  cache.query(&query_at(CENTER_A).with_rank(2));
  assert_eq!(cache.life(entry), 16);
  assert_eq!(
    cache.proposal(entry).map(|p| p.position),
    Some(point),
    "lower priority cannot replace a better proposal"
  );
}

#[test]
fn test_trilinear_query_touches_every_contributing_entry() {
  let cache = small_cache();
  let a = allocate(&cache, CENTER_A, Vec3::ZERO);
  let b = allocate(&cache, CENTER_B, Vec3::ZERO);

  cache.query(&query_at(Vec3::new(1.0, 0.5, 0.5)).with_rank(3));
  assert_eq!(cache.life(a), 8);
  assert_eq!(cache.life(b), 8);
}

/// Cascade border clamping lists one entry at two corners.
const BORDER_CENTER: Vec3 = Vec3::new(-3.5, 0.5, 0.5);
const BORDER_POINT: Vec3 = Vec3::new(-3.75, 0.5, 0.5);

#[test]
fn test_border_duplicate_is_touched_once() {
  let cache = small_cache();
  let entry = allocate(&cache, BORDER_CENTER, Vec3::new(0.0, 2.0, 0.0));

  let report = cache.query(&IrradianceQuery::new(BORDER_POINT, Vec3::X).with_rank(2));
  let entries: Vec<u32> = report.lookup.iter().map(|hit| hit.entry).collect();
  assert_eq!(entries, vec![entry, entry]);
  assert!((report.lookup.weight_sum() - 1.0).abs() < 1e-5);
  assert!((report.irradiance - Vec3::new(0.0, 2.0, 0.0)).length() < 1e-5);

  assert_eq!(cache.life(entry), 16);
  assert_eq!(cache.proposal(entry), None, "rank 2 loses against a rank 0 life");
}

#[test]
fn test_pool_exhaustion_degrades_to_miss() {
  let cache = RadianceCache::new(small_config().with_entry_capacity(1)).unwrap();
  allocate(&cache, CENTER_A, Vec3::ONE);

  let point = Vec3::new(-2.5, -2.5, -2.5);
  let report = cache.query(&query_at(point));
  assert_eq!(report.resolution, Some(CellResolution::Exhausted));
  assert!(report.lookup.is_empty());
  assert_eq!(report.irradiance, Vec3::ZERO);
  assert_eq!(cache.cell_state(point), CellState::Vacant);
  assert_eq!(cache.stats().alloc_count, 1);
}

#[test]
fn test_reset_starts_a_new_session() {
  let mut cache = RadianceCache::new(small_config().with_entry_capacity(1)).unwrap();
  allocate(&cache, CENTER_A, Vec3::ONE);
  assert_eq!(
    cache.query(&query_at(CENTER_B)).resolution,
    Some(CellResolution::Exhausted)
  );

  cache.reset();
  assert_eq!(cache.stats().alloc_count, 0);
  assert_eq!(cache.stats().occupied_cells, 0);
  assert_eq!(cache.entry_at(CENTER_A), None);
  assert_eq!(cache.irradiance(0), Vec3::ZERO);

  assert_eq!(
    cache.query(&query_at(CENTER_B)).resolution,
    Some(CellResolution::Allocated(0))
  );
}

#[test]
fn test_aging_exposes_recycle_candidates() {
  let cache = small_cache();
  let old = allocate_ranked(&cache, CENTER_A, 3, Vec3::ONE);
  let young = allocate(&cache, CENTER_B, Vec3::ONE);
  assert_eq!(cache.life(old), 8);
  assert!(cache.recycle_candidates().is_empty());

  assert_eq!(cache.age_entries(1), 1);
  assert_eq!(cache.epoch(), 1);
  assert_eq!(cache.life(old), 7);
  assert_eq!(cache.life(young), 31);

  // A dying entry accepts proposals from any rank; the touch re-arms it
  let report = cache.query(&IrradianceQuery::new(CENTER_A, Vec3::NEG_Z).with_rank(3));
  assert!(!report.lookup.is_empty());
  assert_eq!(cache.life(old), 8);
  assert!(cache.recycle_candidates().is_empty());

  assert_eq!(cache.age_entries(1), 1);
  let candidates = cache.recycle_candidates();
  assert_eq!(candidates.len(), 1);
  assert_eq!(candidates[0].entry, old);
  assert_eq!(candidates[0].life, 7);
  assert_eq!(Some(candidates[0].owner_cell), cache.owner_cell(old));
  assert_eq!(candidates[0].proposal.map(|p| p.normal), Some(Vec3::NEG_Z));
}

/// An entry queried every frame stays alive; an ignored one drains.
#[test]
fn test_queried_entry_survives_aging() {
  let cache = small_cache();
  let hot = allocate(&cache, CENTER_A, Vec3::ONE);
  let cold = allocate(&cache, CENTER_B, Vec3::ONE);

  for frame in 0..64 {
    cache.query(&query_at(CENTER_A).with_rank(0));
    cache.age_entries(1);
    assert_eq!(cache.life(hot), 31, "frame {}", frame);
    assert!(
      cache.recycle_candidates().iter().all(|c| c.entry != hot),
      "frame {}",
      frame
    );
  }

  assert_eq!(cache.life(cold), 0);
  let candidates = cache.recycle_candidates();
  assert_eq!(candidates.len(), 1);
  assert_eq!(candidates[0].entry, cold);
}

#[test]
fn test_rearm_is_capped_at_allocation_life() {
  let cache = small_cache();
  let entry = allocate_ranked(&cache, CENTER_A, 2, Vec3::ONE);
  assert_eq!(cache.life(entry), 16);

  cache.age_entries(4);
  cache.query(&query_at(CENTER_A).with_rank(0));
  assert_eq!(cache.life(entry), 16, "rank 0 cannot lift past the allocation budget");

  // Later touches in the same epoch still only lower
  cache.query(&query_at(CENTER_A).with_rank(3));
  cache.query(&query_at(CENTER_A).with_rank(0));
  assert_eq!(cache.life(entry), 8);
}

#[test]
fn test_batch_preserves_order() {
  let cache = small_cache();
  allocate(&cache, CENTER_A, Vec3::new(1.0, 0.0, 0.0));
  allocate(&cache, CENTER_B, Vec3::new(0.0, 1.0, 0.0));

  let queries = [
    query_at(CENTER_B).frozen(),
    query_at(CENTER_A).frozen(),
    query_at(Vec3::new(-3.5, -3.5, -3.5)).frozen(),
  ];
  let estimates = cache.lookup_batch(&queries);
  assert_eq!(
    estimates,
    vec![Vec3::new(0.0, 1.0, 0.0), Vec3::new(1.0, 0.0, 0.0), Vec3::ZERO]
  );
}

#[test]
fn test_viewpoint_moves_cascade_window() {
  let mut cache = small_cache();
  allocate(&cache, CENTER_A, Vec3::ONE);

  cache.set_viewpoint(Vec3::new(1.5, 0.0, 0.0));
  assert_eq!(cache.viewpoint(), Vec3::new(1.5, 0.0, 0.0));
  // Same world point now maps to a different window coordinate
  assert_eq!(cache.entry_at(CENTER_A), None);
}

/// 1000 simultaneous first touches of one cell allocate exactly one entry.
#[test]
fn test_contended_first_touch_allocates_once() {
  let cache = small_cache();
  let before = allocate(&cache, Vec3::new(-1.5, 0.5, 0.5), Vec3::ZERO);

  let reports: Vec<QueryReport> = (0..1000)
    .into_par_iter()
    .map(|i| cache.query(&query_at(CENTER_A).with_rank(i % 4)))
    .collect();

  assert_eq!(cache.stats().alloc_count, 2);
  let allocated = reports
    .iter()
    .filter(|r| matches!(r.resolution, Some(CellResolution::Allocated(_))))
    .count();
  assert_eq!(allocated, 1);

  let owner = cache.entry_at(CENTER_A).expect("winner published");
  let seen: HashSet<u32> = reports
    .iter()
    .filter_map(|r| r.resolution.and_then(|res| res.entry()))
    .collect();
  assert_eq!(seen, HashSet::from([owner]));
  assert_ne!(owner, before);

  let after = allocate(&cache, Vec3::new(2.5, 0.5, 0.5), Vec3::ZERO);
  assert!(after != owner && after != before);
}

#[test]
fn test_parallel_queries_over_many_cells() {
  let cache = small_cache();
  let points: Vec<Vec3> = (0..64)
    .map(|i| Vec3::new((i % 4) as f32 - 1.5, ((i / 4) % 4) as f32 - 1.5, (i / 16) as f32 - 1.5))
    .collect();

  (0..8).into_par_iter().for_each(|_| {
    for &point in &points {
      cache.query(&query_at(point).with_rank(1));
    }
  });

  let stats = cache.stats();
  assert_eq!(stats.alloc_count, 64);
  assert_eq!(stats.entry_count, 64);
  assert_eq!(stats.occupied_cells, 64);

  let entries: HashSet<u32> = points.iter().filter_map(|&p| cache.entry_at(p)).collect();
  assert_eq!(entries.len(), 64);
}

/// Minimal grid: one cascade of 4³ unit cells anchored at the origin.
struct BoxGrid;

impl GridAddressing for BoxGrid {
  fn to_grid_coordinate(&self, point: Vec3, _viewpoint: Vec3) -> GridCoord {
    GridCoord {
      cascade: 0,
      coord: self.clamp_coordinate(point.floor().as_ivec3()),
    }
  }

  fn coordinate_to_cell_id(&self, coord: IVec3, _cascade: u32) -> u32 {
    let c = self.clamp_coordinate(coord).as_uvec3();
    c.x + c.y * 4 + c.z * 16
  }

  fn cell_center(&self, coord: IVec3, _cascade: u32, _viewpoint: Vec3) -> Vec3 {
    coord.as_vec3() + Vec3::splat(0.5)
  }

  fn cell_diameter(&self, _cascade: u32) -> f32 {
    1.0
  }

  fn cascade_size(&self) -> u32 {
    4
  }

  fn cascade_count(&self) -> u32 {
    1
  }
}

/// Grid whose cell count does not fit a 32-bit cell id.
struct OversizedGrid;

impl GridAddressing for OversizedGrid {
  fn to_grid_coordinate(&self, _point: Vec3, _viewpoint: Vec3) -> GridCoord {
    GridCoord {
      cascade: 0,
      coord: IVec3::ZERO,
    }
  }

  fn coordinate_to_cell_id(&self, _coord: IVec3, _cascade: u32) -> u32 {
    0
  }

  fn cell_center(&self, _coord: IVec3, _cascade: u32, _viewpoint: Vec3) -> Vec3 {
    Vec3::ZERO
  }

  fn cell_diameter(&self, _cascade: u32) -> f32 {
    1.0
  }

  fn cascade_size(&self) -> u32 {
    2048
  }

  fn cascade_count(&self) -> u32 {
    1
  }
}

#[test]
fn test_oversized_custom_grid_is_rejected() {
  let err = RadianceCache::with_grid(small_config(), OversizedGrid).unwrap_err();
  assert_eq!(
    err,
    ConfigError::TooManyCells {
      cascade_size: 2048,
      cascade_count: 1,
    }
  );
}

#[test]
fn test_custom_grid() {
  let cache = RadianceCache::with_grid(small_config(), BoxGrid).unwrap();
  assert_eq!(cache.stats().capacity, 64);

  allocate(&cache, Vec3::new(1.5, 1.5, 1.5), Vec3::new(0.0, 0.0, 1.0));
  allocate(&cache, Vec3::new(2.5, 1.5, 1.5), Vec3::new(1.0, 0.0, 0.0));
  let estimate = cache.lookup_irradiance(&query_at(Vec3::new(2.0, 1.5, 1.5)).frozen());
  assert_eq!(estimate, Vec3::new(0.5, 0.0, 0.5));
}

#[cfg(feature = "metrics")]
#[test]
fn test_metrics_track_queries() {
  let cache = small_cache();
  allocate(&cache, CENTER_A, Vec3::ONE);
  cache.query(&query_at(CENTER_A).with_rank(0));
  cache.query(&query_at(Vec3::new(-2.5, 0.5, 0.5)).frozen());

  let snapshot = cache.metrics();
  assert_eq!(snapshot.lookups, 3);
  assert_eq!(snapshot.hits, 2);
  assert_eq!(snapshot.allocations, 1);
  assert_eq!(snapshot.touches, 1);
  assert_eq!(snapshot.proposals, 1);
}

#[cfg(feature = "metrics")]
#[test]
fn test_metrics_count_border_duplicate_once() {
  let cache = small_cache();
  allocate(&cache, BORDER_CENTER, Vec3::ONE);
  cache.query(&query_at(BORDER_POINT).with_rank(0));

  let snapshot = cache.metrics();
  assert_eq!(snapshot.touches, 1);
  assert_eq!(snapshot.proposals, 1);
}
