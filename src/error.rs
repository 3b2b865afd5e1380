//! Error types for the emulation engine.
//!
//! Nothing in the engine is retried: every variant here marks a misuse of the
//! surface (a bad index, a bad handle, a mutation of a frozen dataset) that
//! the host is expected to treat as fatal. Internal structural preconditions
//! (duplicate content in a slot write, replacing a content that is not
//! cached) are programming errors and panic instead of reporting through
//! this type.

use crate::trace::Timestamp;

/// Errors surfaced by the loader and the handle-based boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EmuError {
    /// A time-slice index past the end of the sliced dataset.
    #[error("slice index {index} out of range ({num_slices} slices)")]
    SliceIndexOutOfRange {
        /// The offending slice index.
        index: usize,
        /// Number of slices the dataset was cut into.
        num_slices: usize,
    },

    /// A request range that does not fit the loaded dataset.
    #[error("request range {beg}..{end} out of range ({num_requests} requests)")]
    RequestRangeOutOfRange {
        /// Start of the offending range.
        beg: usize,
        /// End of the offending range.
        end: usize,
        /// Number of requests loaded.
        num_requests: usize,
    },

    /// A timestamp outside the interval declared to `slice_by_time`.
    #[error("timestamp {timestamp} outside sliced interval [{t_begin}, {t_end}]")]
    TimestampOutOfRange {
        /// The offending timestamp.
        timestamp: Timestamp,
        /// Start of the sliced interval.
        t_begin: Timestamp,
        /// End of the sliced interval (inclusive for lookups).
        t_end: Timestamp,
    },

    /// A handle that does not name a live emulator in the registry.
    #[error("invalid emulator handle {0}")]
    InvalidHandle(usize),

    /// The process-wide dataset can no longer be mutated: an emulator has
    /// already been created against it.
    #[error("dataset is frozen once an emulator has been created")]
    LoaderFrozen,
}
