//! Active stepping: one `step` consumes one whole time-slice.

use core::num::NonZeroUsize;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::emulator::{EmuCore, StepResult};
use crate::error::EmuError;
use crate::trace::{Content, RequestLoader};

/// Batch-per-slice emulator.
///
/// Every request of the slice is hit-tested and counted; the distinct
/// missed contents are collected into an ordered set and appended to the
/// cache contents as candidates. `remaining` is always zero.
#[derive(Debug)]
pub struct ActiveCacheEmu {
    core: EmuCore,
    missed: BTreeSet<Content>,
}

impl ActiveCacheEmu {
    /// Creates an active emulator of `capacity` slots over `loader`.
    pub fn init(capacity: NonZeroUsize, loader: Arc<RequestLoader>) -> Self {
        Self {
            core: EmuCore::new(capacity, loader),
            missed: BTreeSet::new(),
        }
    }

    pub(crate) fn core(&self) -> &EmuCore {
        &self.core
    }

    pub(crate) fn core_mut(&mut self) -> &mut EmuCore {
        &mut self.core
    }

    /// Returns all state to initial values (see [`CacheEmu::reset`]).
    ///
    /// [`CacheEmu::reset`]: crate::emulator::CacheEmu::reset
    pub fn reset(&mut self) {
        self.core.reset();
        self.missed.clear();
    }

    /// Consumes the next time-slice.
    ///
    /// Fails with an out-of-range error when the trace is exhausted; guard
    /// with `finished()`.
    pub fn step(&mut self) -> Result<StepResult, EmuError> {
        self.missed.clear();
        self.core.step_buf.clear();

        let loader = Arc::clone(&self.core.loader);
        let slice = loader.slice_at(self.core.i_slice)?;
        self.core.i_slice += 1;

        for r in slice.iter() {
            let hit = self.core.process_request(r.content_id);
            if !hit {
                self.missed.insert(r.content_id);
            }
        }

        self.core.features.update(&slice)?;

        self.core
            .publish_candidates(self.missed.iter().copied(), None);

        tracing::debug!(
            i_slice = self.core.i_slice,
            processed = slice.len(),
            missed = self.missed.len(),
            "active step"
        );

        Ok(StepResult {
            processed: slice.len(),
            missed: self.missed.len(),
            remaining: 0,
        })
    }
}
