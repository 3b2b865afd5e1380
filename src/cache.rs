//! Slot-addressed cache state.
//!
//! The cache is a fixed array of `capacity` content slots plus two maps: a
//! position map giving O(1) membership and slot lookup, and a frequency map
//! counting hit tests since the last [`clear_frequencies`]. It performs no
//! eviction of its own: an external policy rewrites its occupancy through
//! [`replace`] (driven by the emulator's `update_cache`).
//!
//! ```text
//! contents:  [ 7 ][ 3 ][ -1 ][ -1 ]          capacity = 4
//!               ▲    ▲
//! pos:       { 7→0, 3→1 }                    size = |pos| = 2
//! freq:      { 7→2, 5→1 }                    hit tests since last clear
//! ```
//!
//! Invariants, held after every operation:
//!
//! - `pos[contents[i]] == i` for every non-sentinel slot `i`
//! - no content occupies two slots
//! - `pos.len() <= capacity`
//!
//! Violating a precondition ([`set`] with a cached content, [`replace`] with
//! an `old` that is not cached) is a programming error and panics.
//!
//! [`clear_frequencies`]: Cache::clear_frequencies
//! [`set`]: Cache::set
//! [`replace`]: Cache::replace

use core::num::NonZeroUsize;

use hashbrown::HashMap;

use crate::trace::{Content, NO_CONTENT};

/// Slot-addressable content set with hit-frequency accounting.
pub struct Cache {
    contents: Vec<Content>,
    pos: HashMap<Content, usize>,
    freq: HashMap<Content, u64>,
    /// Reused buffer returned by [`Cache::frequencies`].
    freq_buf: Vec<f32>,
}

impl Cache {
    /// Creates a cache of `capacity` empty slots.
    pub fn init(capacity: NonZeroUsize) -> Self {
        Cache {
            contents: vec![NO_CONTENT; capacity.get()],
            pos: HashMap::with_capacity(capacity.get()),
            freq: HashMap::new(),
            freq_buf: Vec::with_capacity(capacity.get() + 1),
        }
    }

    /// Number of occupied slots.
    #[inline]
    pub fn size(&self) -> usize {
        self.pos.len()
    }

    /// Total number of slots.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.contents.len()
    }

    /// Returns `true` if every slot is occupied.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.size() >= self.capacity()
    }

    /// The slot array, in slot order. Empty slots read as [`NO_CONTENT`].
    #[inline]
    pub fn contents(&self) -> &[Content] {
        &self.contents
    }

    /// Slot index of `content`, or `None` if it is not cached.
    #[inline]
    pub fn find(&self, content: Content) -> Option<usize> {
        self.pos.get(&content).copied()
    }

    /// Content at slot `idx` ([`NO_CONTENT`] for an empty slot).
    ///
    /// # Panics
    ///
    /// Panics if `idx >= capacity()`.
    #[inline]
    pub fn get(&self, idx: usize) -> Content {
        assert!(idx < self.capacity(), "slot index {idx} out of capacity");
        self.contents[idx]
    }

    /// Writes `content` into slot `idx`, dropping whatever the slot held.
    ///
    /// # Panics
    ///
    /// Panics if `idx >= capacity()` or `content` already occupies a slot.
    pub fn set(&mut self, idx: usize, content: Content) {
        assert!(idx < self.capacity(), "slot index {idx} out of capacity");
        assert!(
            content == NO_CONTENT || !self.pos.contains_key(&content),
            "content {content} is already in the cache"
        );

        let old = self.contents[idx];
        if old != NO_CONTENT {
            self.pos.remove(&old);
        }

        self.contents[idx] = content;
        if content != NO_CONTENT {
            self.pos.insert(content, idx);
        }
    }

    /// Replaces `old` with `new`.
    ///
    /// When `old` is [`NO_CONTENT`] the write goes to the next unused slot
    /// (slot index `size()`); a caller filling the cache in occupancy order
    /// therefore passes sentinels until the cache is full and real contents
    /// afterwards.
    ///
    /// # Panics
    ///
    /// Panics if `old` is non-sentinel but not cached, if the cache is
    /// already full when `old` is the sentinel, or if `new` is already
    /// cached.
    pub fn replace(&mut self, new: Content, old: Content) {
        tracing::trace!(new, old, "cache replace");

        let idx = if old == NO_CONTENT {
            self.size()
        } else {
            self.find(old)
                .unwrap_or_else(|| panic!("content {old} to replace is not in the cache"))
        };

        self.set(idx, new);
    }

    /// Counts an access to `content` and reports whether it was a hit.
    ///
    /// The frequency is incremented unconditionally, so misses are counted
    /// against the missed content as well.
    #[inline]
    pub fn hit_test(&mut self, content: Content) -> bool {
        *self.freq.entry(content).or_insert(0) += 1;
        self.pos.contains_key(&content)
    }

    /// Hit-test count of `content` since the last [`clear_frequencies`].
    ///
    /// [`clear_frequencies`]: Cache::clear_frequencies
    #[inline]
    pub fn frequency(&self, content: Content) -> f32 {
        self.freq.get(&content).copied().unwrap_or(0) as f32
    }

    /// Frequencies of `elements`, in order, in a buffer reused across calls.
    pub fn frequencies(&mut self, elements: &[Content]) -> &[f32] {
        self.freq_buf.clear();
        for &e in elements {
            let f = self.freq.get(&e).copied().unwrap_or(0) as f32;
            self.freq_buf.push(f);
        }
        &self.freq_buf
    }

    /// Forgets all accumulated hit-test counts.
    #[inline]
    pub fn clear_frequencies(&mut self) {
        self.freq.clear();
    }

    /// Empties every slot and both maps.
    pub fn reset(&mut self) {
        tracing::debug!("cache reset");
        self.contents.fill(NO_CONTENT);
        self.pos.clear();
        self.freq.clear();
    }

    #[cfg(test)]
    pub(crate) fn assert_coherent(&self) {
        let occupied = self
            .contents
            .iter()
            .filter(|&&c| c != NO_CONTENT)
            .count();
        assert_eq!(occupied, self.pos.len());
        assert!(self.pos.len() <= self.capacity());
        for (i, &c) in self.contents.iter().enumerate() {
            if c != NO_CONTENT {
                assert_eq!(self.pos.get(&c), Some(&i));
            }
        }
    }
}

impl core::fmt::Debug for Cache {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Cache")
            .field("capacity", &self.capacity())
            .field("size", &self.size())
            .field("contents", &self.contents)
            .finish()
    }
}
