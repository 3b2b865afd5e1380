//! Emulator configuration.
//!
//! Configuration structs have all public fields for simple instantiation:
//! create the struct with every field set and hand it to `init`. There are
//! no builders.
//!
//! # Example
//!
//! ```
//! use cache_emu_rs::config::{EmulatorConfig, EmuMode};
//! use core::num::NonZeroUsize;
//!
//! let config = EmulatorConfig {
//!     capacity: NonZeroUsize::new(64).unwrap(),
//!     mode: EmuMode::Active,
//! };
//! assert_eq!(config.mode.as_str(), "Active");
//! ```

use core::num::NonZeroUsize;

/// Stepping discipline of an emulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmuMode {
    /// One `step` consumes one whole time-slice.
    Active,
    /// One `step` consumes requests up to (and including) the first miss
    /// within the current time-slice.
    Passive,
}

impl EmuMode {
    /// Short display name.
    pub fn as_str(&self) -> &'static str {
        match self {
            EmuMode::Active => "Active",
            EmuMode::Passive => "Passive",
        }
    }

    /// All stepping disciplines.
    pub fn all() -> Vec<EmuMode> {
        vec![EmuMode::Active, EmuMode::Passive]
    }
}

impl core::fmt::Display for EmuMode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Configuration for a cache emulator.
#[derive(Debug, Clone, Copy)]
pub struct EmulatorConfig {
    /// Number of cache slots.
    pub capacity: NonZeroUsize,
    /// Stepping discipline.
    pub mode: EmuMode,
}

/// Step-size rule of an online-gradient-descent extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OgdKind {
    /// `eta = 1 / sqrt(count + 1)`.
    Optimal,
    /// `eta = 1`.
    Lru,
    /// `eta = 1 / (count + 1)`.
    Lfu,
}

impl OgdKind {
    /// Short display name.
    pub fn as_str(&self) -> &'static str {
        match self {
            OgdKind::Optimal => "OGD-Optimal",
            OgdKind::Lru => "OGD-LRU",
            OgdKind::Lfu => "OGD-LFU",
        }
    }

    /// Step size for the given batch counter.
    #[inline]
    pub fn eta(&self, count: u64) -> f64 {
        match self {
            OgdKind::Optimal => 1.0 / ((count + 1) as f64).sqrt(),
            OgdKind::Lru => 1.0,
            OgdKind::Lfu => 1.0 / (count + 1) as f64,
        }
    }
}

/// How an OGD extractor consumes a slice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OgdUpdate {
    /// One gradient step per slice: `eta` is computed once and applied to
    /// every request of the slice, then expiration/normalization runs once.
    #[default]
    Batch,
    /// One gradient step per request, expiring/normalizing after each.
    PerRequest,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eta_rules() {
        assert_eq!(OgdKind::Lru.eta(0), 1.0);
        assert_eq!(OgdKind::Lru.eta(41), 1.0);
        assert_eq!(OgdKind::Lfu.eta(0), 1.0);
        assert_eq!(OgdKind::Lfu.eta(3), 0.25);
        assert_eq!(OgdKind::Optimal.eta(0), 1.0);
        assert!((OgdKind::Optimal.eta(3) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_mode_display() {
        assert_eq!(EmuMode::Active.to_string(), "Active");
        assert_eq!(EmuMode::Passive.to_string(), "Passive");
        assert_eq!(EmuMode::all().len(), 2);
    }
}
