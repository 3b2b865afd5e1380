#![doc = include_str!("../README.md")]
//!
//! ---
//!
//! # Code Reference
//!
//! ## Data Flow
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                        Emulation round-trip                          │
//! │                                                                      │
//! │  RequestLoader (shared, read-only)                                   │
//! │    │  slice i                                                        │
//! │    ▼                                                                 │
//! │  CacheEmu::step ──▶ hit statistics                                   │
//! │    │                candidates = cache contents ++ misses            │
//! │    │                candidate frequencies                            │
//! │    ▼                                                                 │
//! │  FeatureManager::features(candidates) ──▶ row-major matrix           │
//! │    │                                                                 │
//! │    ▼                external policy decides                          │
//! │  CacheEmu::update_cache(new occupancy) ──▶ next step                 │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Which Stepping Mode Should I Use?
//!
//! | Mode | One `step` consumes | Use when the policy... |
//! |------|---------------------|------------------------|
//! | Active | one whole time-slice | decides once per slice, on the full miss set |
//! | Passive | requests up to the first miss | reacts to each miss individually |
//!
//! ## Feature Extractors
//!
//! | Extractor | Feature per content `c` | Installed by |
//! |-----------|-------------------------|--------------|
//! | Id | `c` as a float | `use_id_feature` |
//! | LRU | negated age of last access | `use_lru_feature` |
//! | LFU | total access count | `use_lfu_feature` |
//! | SW-LFU | windowed count / window total | `use_swlfu_feature(len)` |
//! | OGD-Optimal / -LRU / -LFU | online-gradient weight | `use_ogd_feature(kind)` |
//!
//! ## Example
//!
//! ```rust
//! use cache_emu_rs::config::{EmuMode, EmulatorConfig, OgdKind};
//! use cache_emu_rs::{CacheEmu, RequestLoader};
//! use core::num::NonZeroUsize;
//! use std::sync::Arc;
//!
//! // Load and slice the trace once.
//! let mut loader = RequestLoader::new();
//! loader.load_dataset(&[1, 2, 1, 3], &[0, 0, 0, 1]);
//! loader.slice_by_time(0, 2, 1);
//! let loader = Arc::new(loader);
//!
//! // An emulator with three cache slots, stepping a slice at a time.
//! let mut emu = CacheEmu::init(
//!     EmulatorConfig {
//!         capacity: NonZeroUsize::new(3).unwrap(),
//!         mode: EmuMode::Active,
//!     },
//!     Arc::clone(&loader),
//! );
//! emu.use_lfu_feature();
//! emu.use_ogd_feature(OgdKind::Optimal);
//!
//! let outcome = emu.step().unwrap();
//! assert_eq!(outcome.processed, 3);
//!
//! // The policy inspects candidates and rewrites the cache.
//! let keep: Vec<i32> = emu.candidates().iter().copied().filter(|&c| c >= 0).collect();
//! emu.update_cache(&keep);
//! assert_eq!(emu.cache_contents().len(), 3);
//! ```
//!
//! ## Handle Surface
//!
//! Hosts that drive the engine through an FFI shim use the [`api`] module:
//! a process-wide registry of emulators addressed by integer handles over a
//! single shared dataset. See [`api`] for the operation table.

/// Request traces, borrowed slices, and the time-slicing loader.
pub mod trace;

/// Slot-addressed cache with position and frequency maps.
pub mod cache;

/// Configuration structures and mode enums.
pub mod config;

/// Error types; everything here is fatal to the host.
pub mod error;

/// Hit-rate accounting at global and episode scope.
pub mod metrics;

/// Feature extractors and their composition.
pub mod feature;

/// Cache emulators: the shared core and both stepping disciplines.
pub mod emulator;

/// Process-wide handle registry for FFI-style hosts.
pub mod api;

// Re-export the main types
pub use cache::Cache;
pub use emulator::{ActiveCacheEmu, CacheEmu, PassiveCacheEmu, StepResult};
pub use error::EmuError;
pub use feature::{
    FeatureExtractor, FeatureManager, FeatureMatrix, IdFeature, LfuFeature, LruFeature,
    OgdFeature, SwLfuFeature,
};
pub use metrics::HitStats;
pub use trace::{Content, Request, RequestLoader, Slice, Timestamp, EPS, NO_CONTENT};
