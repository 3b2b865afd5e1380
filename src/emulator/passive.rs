//! Passive stepping: one `step` consumes requests up to the first miss.

use core::num::NonZeroUsize;
use std::sync::Arc;

use crate::emulator::{EmuCore, StepResult};
use crate::error::EmuError;
use crate::trace::{RequestLoader, NO_CONTENT};

/// One-miss-at-a-time emulator.
///
/// Keeps a residual of unprocessed requests across steps, stored as an
/// index range into the loader so no request data is ever copied. A step
/// loads the next slice only when the residual is empty (advancing
/// `i_slice` on load), scans forward until a miss or the end of the
/// residual, and reports at most one missed content. The frequency vector
/// is always zero-padded to `capacity + 1`.
#[derive(Debug)]
pub struct PassiveCacheEmu {
    core: EmuCore,
    /// Unprocessed `[beg, end)` request range of the current slice.
    residual: (usize, usize),
}

impl PassiveCacheEmu {
    /// Creates a passive emulator of `capacity` slots over `loader`.
    pub fn init(capacity: NonZeroUsize, loader: Arc<RequestLoader>) -> Self {
        Self {
            core: EmuCore::new(capacity, loader),
            residual: (0, 0),
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
        self.residual = (0, 0);
    }

    /// Consumes requests up to and including the first miss.
    ///
    /// Fails with an out-of-range error when the residual is empty and the
    /// trace is exhausted; guard with `finished()`.
    pub fn step(&mut self) -> Result<StepResult, EmuError> {
        self.core.step_buf.clear();
        let mut missed_element = NO_CONTENT;

        if self.residual.0 >= self.residual.1 {
            self.residual = self.core.loader.slice_range(self.core.i_slice)?;
            self.core.i_slice += 1;
        }

        let loader = Arc::clone(&self.core.loader);
        let slice = loader.slice(self.residual.0, self.residual.1)?;

        let mut idx = 0;
        while idx < slice.len() {
            let r = slice.get(idx);
            let hit = self.core.process_request(r.content_id);
            idx += 1;
            if !hit {
                missed_element = r.content_id;
                break;
            }
        }

        let processed = slice.sub_slice(0, idx);
        self.residual.0 += idx;

        self.core.features.update(&processed)?;

        let miss_occurred = missed_element != NO_CONTENT;
        self.core.publish_candidates(
            miss_occurred.then_some(missed_element),
            Some(self.core.capacity.get() + 1),
        );

        tracing::debug!(
            i_slice = self.core.i_slice,
            processed = idx,
            miss_occurred,
            remaining = self.residual.1 - self.residual.0,
            "passive step"
        );

        Ok(StepResult {
            processed: idx,
            missed: usize::from(miss_occurred),
            remaining: self.residual.1 - self.residual.0,
        })
    }
}
