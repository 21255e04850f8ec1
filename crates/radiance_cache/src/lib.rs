//! radiance_cache - Concurrent spatio-temporal irradiance cache
//!
//! This crate amortizes expensive lighting evaluation across frames by
//! bucketing world points into a sparse, cascaded cell grid. Each occupied
//! cell owns one cache entry holding a running irradiance estimate that an
//! external producer refines over time.
//!
//! # Features
//!
//! - **Lazy allocation**: the first query to touch a cell claims it with a
//!   single atomic `fetch_or`; exactly one entry is allocated per cell no
//!   matter how many queries race for it
//! - **Nearest / Trilinear lookup**: one owning cell, or the 8-cell lattice
//!   around the point with renormalised weights
//! - **Priority lifetimes**: queries refresh entry life by priority rank and
//!   propose relocations for entries nearing recycling
//! - **Lock-free queries**: every query takes `&self`; run them from rayon
//!   or any other thread pool
//!
//! # Example
//!
//! ```ignore
//! use radiance_cache::{CacheConfig, IrradianceQuery, RadianceCache};
//! use glam::Vec3;
//!
//! let mut cache = RadianceCache::new(CacheConfig::default())?;
//! cache.set_viewpoint(camera_position);
//!
//! // First touch allocates; the estimate is zero until the producer writes
//! let query = IrradianceQuery::new(hit_point, hit_normal).with_rank(0);
//! let estimate = cache.lookup_irradiance(&query);
//!
//! if let Some(entry) = cache.entry_at(hit_point) {
//!     cache.write_irradiance(entry, traced_irradiance);
//! }
//! ```

pub mod cache;
pub mod cell;
pub mod config;
pub mod constants;
pub mod entry;
pub mod error;
pub mod grid;
pub mod life;
pub mod lookup;
pub mod metrics;
pub mod pool;

// Re-export commonly used items
pub use cache::{CacheStats, IrradianceQuery, QueryReport, RadianceCache, RecycleCandidate};
pub use cell::{CellState, CellTable};
pub use config::{CacheConfig, LookupStrategy};
pub use entry::{EntryStore, RepositionProposal};
pub use error::ConfigError;
pub use grid::{CascadedGrid, GridAddressing, GridCoord};
pub use life::{LifePolicy, TouchOutcome};
pub use lookup::{LookupEngine, LookupEntry, LookupResult};
pub use metrics::MetricsSnapshot;
pub use pool::{CellResolution, EntryPool, FreePool};
