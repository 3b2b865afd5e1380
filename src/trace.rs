//! Request traces and time-slicing.
//!
//! A trace is an ordered sequence of [`Request`]s (content id plus
//! timestamp) loaded once and then read by any number of emulators. The
//! [`RequestLoader`] owns the sequence and, after [`slice_by_time`] has run,
//! a list of `(beg, end)` ranges cutting the sequence into time-slices of a
//! fixed interval. [`Slice`] is a borrowed view into that sequence; it is
//! never an owning copy and cannot outlive the loader.
//!
//! # Slicing invariants
//!
//! - Slice ranges are contiguous, non-overlapping, and cover the requests in
//!   timestamp order.
//! - `num_slices == ceil((t_end - t_begin) / t_interval)`.
//! - Every request inside slice `i` maps back to `i` through
//!   [`slice_index_by_time`].
//!
//! ```text
//! requests:  [t=0] [t=0] [t=1] [t=3] [t=3] [t=4]
//!             └──────┬──────┘  └────┬─────┘ └─┬─┘
//! slices:        0 [0,2)   1 [2,3) (empty 2) 3 [3,5)  4 [5,6)
//!                     t_begin=0, t_end=5, t_interval=1
//! ```
//!
//! [`slice_by_time`]: RequestLoader::slice_by_time
//! [`slice_index_by_time`]: RequestLoader::slice_index_by_time

use crate::error::EmuError;

/// Identifier of a cacheable content.
pub type Content = i32;

/// Timestamp of a request, in the trace's own time unit.
pub type Timestamp = i32;

/// Reserved content id meaning "no content" (an empty cache slot, or the
/// absence of a miss).
pub const NO_CONTENT: Content = -1;

/// Floating-point epsilon used in every rate denominator.
pub const EPS: f32 = 1e-6;

/// A single recorded cache request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Request {
    /// Requested content id.
    pub content_id: Content,
    /// Time at which the request occurred.
    pub timestamp: Timestamp,
}

impl Request {
    /// Creates a new request.
    #[inline]
    pub fn new(content_id: Content, timestamp: Timestamp) -> Self {
        Self {
            content_id,
            timestamp,
        }
    }
}

/// A borrowed, half-open view of a contiguous request range.
///
/// Slices are cheap to copy and re-slice; they never own request data.
#[derive(Debug, Clone, Copy)]
pub struct Slice<'a> {
    requests: &'a [Request],
}

impl<'a> Slice<'a> {
    /// Wraps a request range in a slice view.
    #[inline]
    pub fn new(requests: &'a [Request]) -> Self {
        Self { requests }
    }

    /// Number of requests in the view.
    #[inline]
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    /// Returns `true` if the view contains no requests.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Request at `idx`.
    ///
    /// # Panics
    ///
    /// Panics if `idx` is out of bounds.
    #[inline]
    pub fn get(&self, idx: usize) -> Request {
        self.requests[idx]
    }

    /// Last request of the view, if any.
    #[inline]
    pub fn last(&self) -> Option<Request> {
        self.requests.last().copied()
    }

    /// Sub-view `[beg, end)` of this view.
    ///
    /// # Panics
    ///
    /// Panics if `beg > end` or `end > len()`.
    #[inline]
    pub fn sub_slice(&self, beg: usize, end: usize) -> Slice<'a> {
        Slice {
            requests: &self.requests[beg..end],
        }
    }

    /// Iterates the requests in order.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = Request> + 'a {
        self.requests.iter().copied()
    }

    /// The underlying request range.
    #[inline]
    pub fn requests(&self) -> &'a [Request] {
        self.requests
    }
}

/// Owner of the request sequence and its time-slicing.
///
/// The loader is populated once through [`load_dataset`], cut into slices
/// once through [`slice_by_time`], and read-only afterwards. It is shared
/// (typically behind an `Arc`) by every emulator instantiated against it.
///
/// [`load_dataset`]: RequestLoader::load_dataset
/// [`slice_by_time`]: RequestLoader::slice_by_time
#[derive(Debug, Clone, Default)]
pub struct RequestLoader {
    requests: Vec<Request>,
    slice_ranges: Vec<(usize, usize)>,
    t_begin: Timestamp,
    t_end: Timestamp,
    t_interval: Timestamp,
}

impl RequestLoader {
    /// Creates an empty loader.
    pub fn new() -> Self {
        Self {
            requests: Vec::new(),
            slice_ranges: Vec::new(),
            t_begin: 0,
            t_end: 0,
            t_interval: 1,
        }
    }

    /// Appends requests built from parallel id/timestamp columns.
    ///
    /// Timestamps are assumed non-decreasing across all calls; this is not
    /// enforced, but [`slice_by_time`] produces meaningless ranges otherwise.
    ///
    /// [`slice_by_time`]: RequestLoader::slice_by_time
    pub fn load_dataset(&mut self, content_ids: &[Content], timestamps: &[Timestamp]) {
        debug_assert_eq!(content_ids.len(), timestamps.len());
        self.requests.extend(
            content_ids
                .iter()
                .zip(timestamps)
                .map(|(&c, &t)| Request::new(c, t)),
        );
    }

    /// Appends a single request.
    #[inline]
    pub fn push(&mut self, request: Request) {
        self.requests.push(request);
    }

    /// Number of loaded requests.
    #[inline]
    pub fn num_requests(&self) -> usize {
        self.requests.len()
    }

    /// Number of time-slices (zero until [`slice_by_time`] has run).
    ///
    /// [`slice_by_time`]: RequestLoader::slice_by_time
    #[inline]
    pub fn num_slices(&self) -> usize {
        self.slice_ranges.len()
    }

    /// Cuts the request sequence into time-slices of `t_interval`, covering
    /// `[t_begin, t_end)`. Returns the number of slices,
    /// `ceil((t_end - t_begin) / t_interval)`.
    ///
    /// Slice `i` receives exactly the requests with
    /// `t_begin + i * t_interval <= timestamp < t_begin + (i + 1) * t_interval`.
    /// Re-slicing replaces any previous slicing.
    ///
    /// # Panics
    ///
    /// Panics if `t_interval <= 0` or `t_end < t_begin`.
    pub fn slice_by_time(
        &mut self,
        t_begin: Timestamp,
        t_end: Timestamp,
        t_interval: Timestamp,
    ) -> usize {
        assert!(t_interval > 0, "slice interval must be positive");
        assert!(t_end >= t_begin, "slice interval end precedes begin");

        self.t_begin = t_begin;
        self.t_end = t_end;
        self.t_interval = t_interval;
        self.slice_ranges.clear();

        let span = t_end - t_begin;
        let num_slices = ((span + t_interval - 1) / t_interval) as usize;

        let mut beg = 0usize;
        let mut end = 0usize;
        let mut next_time = t_begin;
        for _ in 0..num_slices {
            next_time += t_interval;
            while end < self.requests.len() && self.requests[end].timestamp < next_time {
                end += 1;
            }
            self.slice_ranges.push((beg, end));
            beg = end;
        }

        self.verify_slice_mapping();

        num_slices
    }

    // Every request of slice i must map back to i through the timestamp
    // mapping, otherwise the trace was not timestamp-ordered.
    fn verify_slice_mapping(&self) {
        if cfg!(debug_assertions) {
            for (i, &(beg, end)) in self.slice_ranges.iter().enumerate() {
                for r in &self.requests[beg..end] {
                    debug_assert_eq!(
                        self.slice_index_by_time(r.timestamp),
                        Ok(i),
                        "request at t={} landed in slice {i}",
                        r.timestamp
                    );
                }
            }
        }
    }

    /// `(beg, end)` request range of time-slice `i`.
    pub fn slice_range(&self, i: usize) -> Result<(usize, usize), EmuError> {
        self.slice_ranges
            .get(i)
            .copied()
            .ok_or(EmuError::SliceIndexOutOfRange {
                index: i,
                num_slices: self.slice_ranges.len(),
            })
    }

    /// Borrowed view of the request range `[beg, end)`.
    pub fn slice(&self, beg: usize, end: usize) -> Result<Slice<'_>, EmuError> {
        if beg > end || end > self.requests.len() {
            return Err(EmuError::RequestRangeOutOfRange {
                beg,
                end,
                num_requests: self.requests.len(),
            });
        }
        Ok(Slice::new(&self.requests[beg..end]))
    }

    /// Borrowed view of time-slice `i`.
    pub fn slice_at(&self, i: usize) -> Result<Slice<'_>, EmuError> {
        let (beg, end) = self.slice_range(i)?;
        self.slice(beg, end)
    }

    /// Index of the time-slice containing timestamp `t`.
    ///
    /// Defined for `t` in `[t_begin, t_end]`; integer division by the slice
    /// interval.
    pub fn slice_index_by_time(&self, t: Timestamp) -> Result<usize, EmuError> {
        if t < self.t_begin || t > self.t_end {
            return Err(EmuError::TimestampOutOfRange {
                timestamp: t,
                t_begin: self.t_begin,
                t_end: self.t_end,
            });
        }
        Ok(((t - self.t_begin) / self.t_interval) as usize)
    }
}
