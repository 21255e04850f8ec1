//! Lifetime and recycling policy.
//!
//! Every query carries a priority rank (0 = highest). The rank maps to a
//! life budget. Within one aging epoch touches lower an entry's life to the
//! smallest budget requested; the first touch of a new epoch re-arms it to
//! its rank budget, never above the allocation-time life. Only aging
//! (`RadianceCache::age_entries`) drains life between epochs.
//!
//! The touch that observes a previous life of equal or worse rank wins the
//! right to propose where the entry should move once recycled; equal-rank
//! writers race and the last store stays.
//!
//! ```text
//! Free ──alloc──► Allocated(L) ──touch/decay──► Touched ──life < threshold──► RecycleEligible
//!  ▲                                                 ▲                             │    │
//!  │                                                 └──── touch (new epoch) ──────┘    │
//!  └─────────────────────────── maintenance pass (external) ────────────────────────────┘
//! ```

use glam::Vec3;

use crate::config::CacheConfig;
use crate::constants::{DEFAULT_LIFE_PER_RANK, DEFAULT_RANK_COUNT, DEFAULT_RECYCLE_THRESHOLD};
use crate::entry::{EntryStore, RepositionProposal};

/// Rank-to-life mapping and recycle threshold.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LifePolicy {
  /// Number of priority ranks.
  pub rank_count: u32,
  /// Life granted per rank step.
  pub life_per_rank: u32,
  /// Life below which an entry is a recycle candidate.
  pub recycle_threshold: u32,
}

/// What a single touch observed and changed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TouchOutcome {
  /// Life before the touch.
  pub previous_life: u32,
  /// The entry was below the recycle threshold when touched.
  pub recycle_candidate: bool,
  /// This touch stored a reposition proposal.
  pub proposed: bool,
}

impl LifePolicy {
  pub const DEFAULT: Self = Self {
    rank_count: DEFAULT_RANK_COUNT,
    life_per_rank: DEFAULT_LIFE_PER_RANK,
    recycle_threshold: DEFAULT_RECYCLE_THRESHOLD,
  };

  pub fn from_config(config: &CacheConfig) -> Self {
    Self {
      rank_count: config.rank_count,
      life_per_rank: config.life_per_rank,
      recycle_threshold: config.recycle_threshold,
    }
  }

  /// Ranks past the last one share its budget.
  #[inline]
  pub fn clamp_rank(&self, rank: u32) -> u32 {
    rank.min(self.rank_count.saturating_sub(1))
  }

  /// Life budget for a query rank. Monotone non-increasing in rank.
  #[inline]
  pub fn life_for_rank(&self, rank: u32) -> u32 {
    (self.rank_count - self.clamp_rank(rank)).saturating_mul(self.life_per_rank)
  }

  /// Rank class a life value belongs to. Inverts [`Self::life_for_rank`].
  #[inline]
  pub fn rank_for_life(&self, life: u32) -> u32 {
    let steps = life.div_ceil(self.life_per_rank);
    self.clamp_rank(self.rank_count.saturating_sub(steps))
  }

  #[inline]
  pub fn is_recycle_candidate(&self, life: u32) -> bool {
    life < self.recycle_threshold
  }

  /// Refresh an already-allocated entry on behalf of a query in `epoch`.
  #[cfg_attr(feature = "profiling", tracing::instrument(skip_all, name = "life::touch"))]
  pub fn touch(
    &self,
    store: &EntryStore,
    entry: u32,
    rank: u32,
    epoch: u32,
    position: Vec3,
    normal: Vec3,
  ) -> TouchOutcome {
    let rank = self.clamp_rank(rank);
    let Some(previous_life) = store.refresh_life(entry, self.life_for_rank(rank), epoch) else {
      return TouchOutcome::default();
    };

    let proposed = rank <= self.rank_for_life(previous_life);
    if proposed {
      store.store_proposal(
        entry,
        RepositionProposal {
          position,
          normal,
          rank,
        },
      );
    }

    TouchOutcome {
      previous_life,
      recycle_candidate: self.is_recycle_candidate(previous_life),
      proposed,
    }
  }
}

impl Default for LifePolicy {
  fn default() -> Self {
    Self::DEFAULT
  }
}

#[cfg(test)]
#[path = "life_test.rs"]
mod life_test;
