use super::*;

#[test]
fn test_cascade_size_is_power_of_two() {
  assert!(DEFAULT_CASCADE_SIZE.is_power_of_two());
}

#[test]
fn test_corner_offsets_follow_bit_layout() {
  for (i, offset) in CORNER_OFFSETS.iter().enumerate() {
    let expected = IVec3::new((i & 1) as i32, ((i >> 1) & 1) as i32, ((i >> 2) & 1) as i32);
    assert_eq!(*offset, expected, "Corner {} has wrong offset", i);
  }
}

#[test]
fn test_default_table_fits_entry_index_bits() {
  assert!(DEFAULT_ENTRY_CAPACITY - 1 <= MAX_ENTRY_INDEX);
}

#[test]
fn test_recycle_threshold_is_lowest_rank_budget() {
  assert_eq!(DEFAULT_RECYCLE_THRESHOLD, DEFAULT_LIFE_PER_RANK);
}
