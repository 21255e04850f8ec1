//! Entry state store - per-entry irradiance, life, owner and proposal.
//!
//! Irradiance belongs to an external producer; it is stored as `f32` bit
//! patterns in relaxed atomics so readers may see a stale value but never a
//! torn one. Reposition proposals are last-writer-wins behind a per-entry
//! lock held for a single copy.
//!
//! # Life Word
//!
//! ```text
//!  63 ............ 32 31 ............. 0
//! ┌──────────────────┬──────────────────┐
//! │   touch epoch    │       life       │
//! └──────────────────┴──────────────────┘
//! ```
//!
//! Life and the epoch of the last touch share one atomic so a refresh is a
//! single read-modify-write. Within an epoch a refresh only lowers life. The
//! first refresh of a later epoch re-arms from the allocation-time life
//! instead, so entries that keep being queried survive aging.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use glam::Vec3;

/// Candidate relocation for an entry nearing recycling.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RepositionProposal {
  /// World-space point of the proposing query.
  pub position: Vec3,
  /// Surface normal at that point.
  pub normal: Vec3,
  /// Priority rank of the proposing query.
  pub rank: u32,
}

#[inline]
fn pack(epoch: u32, life: u32) -> u64 {
  (u64::from(epoch) << 32) | u64::from(life)
}

#[inline]
fn unpack(word: u64) -> (u32, u32) {
  ((word >> 32) as u32, word as u32)
}

#[derive(Default)]
struct EntrySlot {
  irradiance: [AtomicU32; 3],
  life: AtomicU64,
  armed_life: AtomicU32,
  owner_cell: AtomicU32,
  proposal: Mutex<Option<RepositionProposal>>,
}

/// Fixed-capacity array of entry state.
pub struct EntryStore {
  slots: Box<[EntrySlot]>,
}

impl EntryStore {
  pub fn new(capacity: u32) -> Self {
    Self {
      slots: (0..capacity).map(|_| EntrySlot::default()).collect(),
    }
  }

  pub fn len(&self) -> usize {
    self.slots.len()
  }

  pub fn is_empty(&self) -> bool {
    self.slots.is_empty()
  }

  #[inline]
  fn slot(&self, entry: u32) -> Option<&EntrySlot> {
    self.slots.get(entry as usize)
  }

  /// Arm a freshly allocated entry. Runs before the entry is published.
  ///
  /// `life` also becomes the ceiling later re-arms restore to.
  pub fn initialize(&self, entry: u32, life: u32, owner_cell: u32, epoch: u32) {
    if let Some(slot) = self.slot(entry) {
      slot.life.store(pack(epoch, life), Ordering::Relaxed);
      slot.armed_life.store(life, Ordering::Relaxed);
      slot.owner_cell.store(owner_cell, Ordering::Relaxed);
      *slot.proposal.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
  }

  /// Latest irradiance written by the producer. Zero until first write.
  #[inline]
  pub fn irradiance(&self, entry: u32) -> Vec3 {
    match self.slot(entry) {
      Some(slot) => {
        let [r, g, b] = &slot.irradiance;
        Vec3::new(
          f32::from_bits(r.load(Ordering::Relaxed)),
          f32::from_bits(g.load(Ordering::Relaxed)),
          f32::from_bits(b.load(Ordering::Relaxed)),
        )
      }
      None => Vec3::ZERO,
    }
  }

  /// Producer-side write of an irradiance estimate.
  pub fn write_irradiance(&self, entry: u32, value: Vec3) {
    if let Some(slot) = self.slot(entry) {
      for (channel, component) in slot.irradiance.iter().zip(value.to_array()) {
        channel.store(component.to_bits(), Ordering::Relaxed);
      }
    }
  }

  #[inline]
  pub fn life(&self, entry: u32) -> u32 {
    self
      .slot(entry)
      .map_or(0, |slot| unpack(slot.life.load(Ordering::Relaxed)).1)
  }

  /// Life the entry was allocated with.
  pub fn armed_life(&self, entry: u32) -> u32 {
    self
      .slot(entry)
      .map_or(0, |slot| slot.armed_life.load(Ordering::Relaxed))
  }

  pub fn owner_cell(&self, entry: u32) -> Option<u32> {
    self
      .slot(entry)
      .map(|slot| slot.owner_cell.load(Ordering::Relaxed))
  }

  /// Refresh life on behalf of a touch in `epoch`, returning the previous life.
  ///
  /// The new life is `min(base, target)`, where `base` is the current life
  /// for a repeat touch in the same epoch and the allocation-time life for
  /// the first touch of a newer one.
  #[inline]
  pub fn refresh_life(&self, entry: u32, target: u32, epoch: u32) -> Option<u32> {
    let slot = self.slot(entry)?;
    let ceiling = slot.armed_life.load(Ordering::Relaxed);
    let prev = slot
      .life
      .fetch_update(Ordering::AcqRel, Ordering::Acquire, |word| {
        let (touched, life) = unpack(word);
        let base = if touched == epoch { life } else { ceiling };
        Some(pack(epoch, base.min(target)))
      })
      .unwrap_or_else(|word| word);
    Some(unpack(prev).1)
  }

  /// Saturating decrement of life, returning the new life.
  pub fn decay_life(&self, entry: u32, amount: u32) -> Option<u32> {
    let slot = self.slot(entry)?;
    let prev = slot
      .life
      .fetch_update(Ordering::AcqRel, Ordering::Acquire, |word| {
        let (epoch, life) = unpack(word);
        Some(pack(epoch, life.saturating_sub(amount)))
      })
      .unwrap_or_else(|word| word);
    Some(unpack(prev).1.saturating_sub(amount))
  }

  /// Replace the entry's reposition proposal.
  pub fn store_proposal(&self, entry: u32, proposal: RepositionProposal) {
    if let Some(slot) = self.slot(entry) {
      *slot.proposal.lock().unwrap_or_else(PoisonError::into_inner) = Some(proposal);
    }
  }

  pub fn proposal(&self, entry: u32) -> Option<RepositionProposal> {
    let slot = self.slot(entry)?;
    let proposal = *slot.proposal.lock().unwrap_or_else(PoisonError::into_inner);
    proposal
  }

  /// Zero every entry for a new session.
  pub fn clear(&mut self) {
    for slot in self.slots.iter_mut() {
      for channel in slot.irradiance.iter_mut() {
        *channel.get_mut() = 0;
      }
      *slot.life.get_mut() = 0;
      *slot.armed_life.get_mut() = 0;
      *slot.owner_cell.get_mut() = 0;
      *slot
        .proposal
        .get_mut()
        .unwrap_or_else(PoisonError::into_inner) = None;
    }
  }
}

impl std::fmt::Debug for EntryStore {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "EntryStore([{} entries])", self.slots.len())
  }
}
