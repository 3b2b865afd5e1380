//! Online-gradient-descent weight features.
//!
//! Maintains a weight per content, raised by a step size `eta` on every
//! access, together with a min-heap over the weights so the smallest can be
//! expired when the table outgrows its high-water mark (`100 x` the cache
//! capacity). The three members of the family differ only in the step-size
//! rule (see [`OgdKind`]): a decaying `1/sqrt(count+1)` (Optimal), a
//! constant `1` (LRU-like), and a harmonic `1/(count+1)` (LFU-like).
//!
//! # Heap/table coherence
//!
//! Weights change in place, which would invalidate a plain heap. Instead of
//! re-heapifying per update, every weight mutation pushes a fresh
//! `(weight, content, generation)` entry and records the generation in the
//! table; entries whose generation no longer matches are dead and are
//! skipped when popped. Since expiration rescales every surviving weight
//! anyway, the heap is rebuilt from the table right after, which also drops
//! the dead entries. Between expirations the heap is compacted whenever
//! dead entries dominate.
//!
//! ```text
//! weights:  { 7 -> (0.53, gen 12), 9 -> (0.91, gen 10) }
//! heap:     [ (0.41, 7, gen 8)  <- dead, gen mismatch
//!             (0.53, 7, gen 12)
//!             (0.91, 9, gen 10) ]   root = smallest live weight
//! ```
//!
//! # Expiration and normalization
//!
//! After a batch, while the table exceeds the high-water mark the minimum
//! weight is popped from both structures and summed into `w_deleted`; if
//! anything was popped, every surviving weight is divided by
//! `(w_sum + eta - w_deleted)` and `w_sum` becomes the new total. When
//! nothing expires the weights are left as accumulated.

use core::cmp::Ordering;
use core::num::NonZeroUsize;
use std::collections::BinaryHeap;

use hashbrown::HashMap;

use crate::config::{OgdKind, OgdUpdate};
use crate::error::EmuError;
use crate::feature::{FeatureExtractor, FeatureMatrix};
use crate::trace::{Content, Slice};

/// Table entries kept per cache slot.
const TABLE_SLOTS_PER_CAPACITY: usize = 100;

/// Compact the heap when dead entries outnumber live ones this much.
const HEAP_SLACK: usize = 64;

#[derive(Debug, Clone, Copy)]
struct WeightSlot {
    weight: f64,
    generation: u64,
}

#[derive(Debug, Clone, Copy)]
struct HeapEntry {
    weight: f64,
    content: Content,
    generation: u64,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.weight
            .total_cmp(&other.weight)
            .then_with(|| self.content.cmp(&other.content))
            .then_with(|| self.generation.cmp(&other.generation))
    }
}

// BinaryHeap is a max-heap; orderings are reversed to pop the minimum.
type MinHeap = BinaryHeap<core::cmp::Reverse<HeapEntry>>;

/// Online-gradient-descent extractor.
///
/// A never-seen (or expired) content reads as weight `0`.
pub struct OgdFeature {
    kind: OgdKind,
    update_mode: OgdUpdate,
    max_w_len: usize,
    weights: HashMap<Content, WeightSlot>,
    heap: MinHeap,
    w_sum: f64,
    count: u64,
    next_generation: u64,
    matrix: FeatureMatrix,
}

impl OgdFeature {
    /// Creates an extractor for a cache of `capacity` slots, bounding the
    /// weight table at `100 x capacity` contents. Batched updates.
    pub fn new(kind: OgdKind, capacity: NonZeroUsize) -> Self {
        Self::with_update(kind, capacity, OgdUpdate::Batch)
    }

    /// Creates an extractor with an explicit update discipline.
    pub fn with_update(kind: OgdKind, capacity: NonZeroUsize, update_mode: OgdUpdate) -> Self {
        Self {
            kind,
            update_mode,
            max_w_len: capacity.get() * TABLE_SLOTS_PER_CAPACITY,
            weights: HashMap::new(),
            heap: BinaryHeap::new(),
            w_sum: 0.0,
            count: 0,
            next_generation: 0,
            matrix: FeatureMatrix::new(),
        }
    }

    /// Step-size rule of this extractor.
    #[inline]
    pub fn kind(&self) -> OgdKind {
        self.kind
    }

    /// Number of update steps taken (one per slice in batch mode, one per
    /// request otherwise).
    #[inline]
    pub fn step_count(&self) -> u64 {
        self.count
    }

    /// Number of contents currently holding a weight.
    #[inline]
    pub fn table_len(&self) -> usize {
        self.weights.len()
    }

    /// Current weight of `content`, if any.
    #[inline]
    pub fn weight(&self, content: Content) -> Option<f64> {
        self.weights.get(&content).map(|s| s.weight)
    }

    /// Sum of all weights, as maintained incrementally.
    #[inline]
    pub fn weight_sum(&self) -> f64 {
        self.w_sum
    }

    // Raises `content`'s weight by `eta` and records the new heap entry.
    fn bump(&mut self, content: Content, eta: f64) {
        let generation = self.next_generation;
        self.next_generation += 1;

        let slot = self.weights.entry(content).or_insert(WeightSlot {
            weight: 0.0,
            generation,
        });
        slot.weight += eta;
        slot.generation = generation;

        self.heap.push(core::cmp::Reverse(HeapEntry {
            weight: slot.weight,
            content,
            generation,
        }));
    }

    // Pops minimum weights while the table exceeds the high-water mark,
    // then rescales the survivors if anything was popped. `added` is the
    // sum of etas applied since the previous call.
    fn expire_and_normalize(&mut self, eta: f64, added: f64) {
        let mut w_deleted = 0.0;
        let mut expired = false;

        while self.weights.len() > self.max_w_len {
            let core::cmp::Reverse(top) = self
                .heap
                .pop()
                .expect("weight heap out of sync with weight table");
            let live = self
                .weights
                .get(&top.content)
                .is_some_and(|slot| slot.generation == top.generation);
            if !live {
                continue;
            }

            let slot = self.weights.remove(&top.content).expect("live heap entry");
            w_deleted += slot.weight;
            expired = true;
        }

        if expired {
            let denominator = self.w_sum + eta - w_deleted;
            let mut new_sum = 0.0;
            for slot in self.weights.values_mut() {
                slot.weight /= denominator;
                new_sum += slot.weight;
            }
            self.w_sum = new_sum;
            // Rescaling touched every entry; rebuilding here is free of
            // extra asymptotic cost and drops all dead heap entries.
            self.rebuild_heap();
        } else {
            self.w_sum += added;
            if self.heap.len() > 2 * self.weights.len() + HEAP_SLACK {
                self.rebuild_heap();
            }
        }
    }

    fn rebuild_heap(&mut self) {
        self.heap.clear();
        self.heap
            .extend(self.weights.iter().map(|(&content, slot)| {
                core::cmp::Reverse(HeapEntry {
                    weight: slot.weight,
                    content,
                    generation: slot.generation,
                })
            }));
    }

    fn update_batch(&mut self, slice: &Slice<'_>) {
        let eta = self.kind.eta(self.count);

        let mut added = 0.0;
        for r in slice.iter() {
            self.bump(r.content_id, eta);
            added += eta;
        }

        self.expire_and_normalize(eta, added);
        self.count += 1;
    }

    fn update_per_request(&mut self, slice: &Slice<'_>) {
        for r in slice.iter() {
            let eta = self.kind.eta(self.count);
            self.bump(r.content_id, eta);
            self.expire_and_normalize(eta, eta);
            self.count += 1;
        }
    }

    #[cfg(test)]
    pub(crate) fn assert_coherent(&self) {
        use std::collections::HashSet;

        assert!(self.weights.len() <= self.max_w_len);

        // Every live (content, generation) pair has its entry in the heap.
        let entries: HashSet<(Content, u64)> = self
            .heap
            .iter()
            .map(|core::cmp::Reverse(e)| (e.content, e.generation))
            .collect();
        for (&content, slot) in &self.weights {
            assert!(
                entries.contains(&(content, slot.generation)),
                "content {content} missing from heap"
            );
        }

        // The first live entry popped is the global minimum weight.
        let mut heap = self.heap.clone();
        while let Some(core::cmp::Reverse(top)) = heap.pop() {
            let live = self
                .weights
                .get(&top.content)
                .is_some_and(|slot| slot.generation == top.generation);
            if live {
                let min = self
                    .weights
                    .values()
                    .map(|s| s.weight)
                    .fold(f64::INFINITY, f64::min);
                assert!((top.weight - min).abs() < 1e-12);
                break;
            }
        }

        let sum: f64 = self.weights.values().map(|s| s.weight).sum();
        assert!((sum - self.w_sum).abs() < 1e-6 * (1.0 + sum.abs()));
    }
}

impl FeatureExtractor for OgdFeature {
    fn name(&self) -> &'static str {
        self.kind.as_str()
    }

    fn reset(&mut self) {
        tracing::debug!(kind = self.kind.as_str(), "OgdFeature reset");
        self.weights.clear();
        self.heap.clear();
        self.w_sum = 0.0;
        self.count = 0;
        self.next_generation = 0;
    }

    fn update(&mut self, slice: &Slice<'_>) -> Result<(), EmuError> {
        match self.update_mode {
            OgdUpdate::Batch => self.update_batch(slice),
            OgdUpdate::PerRequest => self.update_per_request(slice),
        }
        Ok(())
    }

    fn features(&mut self, contents: &[Content]) -> &FeatureMatrix {
        self.matrix.resize(contents.len(), 1);
        for (i, &c) in contents.iter().enumerate() {
            let w = self.weights.get(&c).map_or(0.0, |slot| slot.weight);
            self.matrix.set(i, 0, w as f32);
        }
        &self.matrix
    }
}

impl core::fmt::Debug for OgdFeature {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("OgdFeature")
            .field("kind", &self.kind)
            .field("table_len", &self.weights.len())
            .field("max_w_len", &self.max_w_len)
            .field("count", &self.count)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::Request;

    fn cap(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    fn slice_of(contents: &[Content]) -> Vec<Request> {
        contents.iter().map(|&c| Request::new(c, 0)).collect()
    }

    #[test]
    fn test_optimal_decay_accumulates_inverse_sqrt() {
        // A single content never trips the high-water mark, so the weight
        // is exactly the partial sum of 1/sqrt(k).
        let mut f = OgdFeature::new(OgdKind::Optimal, cap(1));
        let reqs = slice_of(&[7]);

        let mut expected = 0.0f64;
        for k in 1..=50u64 {
            f.update(&Slice::new(&reqs)).unwrap();
            expected += 1.0 / (k as f64).sqrt();
            assert!((f.weight(7).unwrap() - expected).abs() < 1e-9);
        }
        assert_eq!(f.table_len(), 1);
        f.assert_coherent();
    }

    #[test]
    fn test_lfu_eta_is_harmonic() {
        let mut f = OgdFeature::new(OgdKind::Lfu, cap(1));
        let reqs = slice_of(&[7]);
        f.update(&Slice::new(&reqs)).unwrap();
        f.update(&Slice::new(&reqs)).unwrap();
        assert!((f.weight(7).unwrap() - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_batch_applies_one_eta_per_slice() {
        // In batch mode both requests of the slice use the same eta.
        let mut f = OgdFeature::new(OgdKind::Lfu, cap(1));
        let reqs = slice_of(&[7, 7]);
        f.update(&Slice::new(&reqs)).unwrap();
        assert!((f.weight(7).unwrap() - 2.0).abs() < 1e-12);
        assert_eq!(f.step_count(), 1);
    }

    #[test]
    fn test_per_request_steps_eta_between_requests() {
        let mut f = OgdFeature::with_update(OgdKind::Lfu, cap(1), OgdUpdate::PerRequest);
        let reqs = slice_of(&[7, 7]);
        f.update(&Slice::new(&reqs)).unwrap();
        assert!((f.weight(7).unwrap() - 1.5).abs() < 1e-12);
        assert_eq!(f.step_count(), 2);
    }

    #[test]
    fn test_expiration_pops_minimum_and_normalizes() {
        // capacity 1 -> high-water mark 100. First batch: 60 contents at
        // weight 1. Second batch: 60 more, table reaches 120, the 20
        // smallest ids are expired, survivors divide by
        // w_sum + eta - w_deleted = 60 + 1 - 20 = 41.
        let mut f = OgdFeature::new(OgdKind::Lru, cap(1));

        let first: Vec<Content> = (0..60).collect();
        let second: Vec<Content> = (100..160).collect();
        f.update(&Slice::new(&slice_of(&first))).unwrap();
        assert_eq!(f.table_len(), 60);
        assert!((f.weight_sum() - 60.0).abs() < 1e-12);

        f.update(&Slice::new(&slice_of(&second))).unwrap();
        assert_eq!(f.table_len(), 100);

        for c in 0..20 {
            assert_eq!(f.weight(c), None, "content {c} should have expired");
        }
        for c in 20..60 {
            assert!((f.weight(c).unwrap() - 1.0 / 41.0).abs() < 1e-12);
        }
        assert!((f.weight_sum() - 100.0 / 41.0).abs() < 1e-9);
        f.assert_coherent();
    }

    #[test]
    fn test_table_stays_bounded() {
        let mut f = OgdFeature::new(OgdKind::Lru, cap(1));
        for i in 0..300 {
            let reqs = slice_of(&[i, i + 1000]);
            f.update(&Slice::new(&reqs)).unwrap();
            assert!(f.table_len() <= 100);
        }
        f.assert_coherent();
    }

    #[test]
    fn test_repeated_bumps_keep_heap_live() {
        // Re-accessing the same contents leaves dead generations behind;
        // the heap must still expire true minima afterwards.
        let mut f = OgdFeature::new(OgdKind::Lru, cap(1));
        let hot = slice_of(&[1, 2, 3]);
        for _ in 0..50 {
            f.update(&Slice::new(&hot)).unwrap();
        }
        f.assert_coherent();

        let flood: Vec<Content> = (10..110).collect();
        f.update(&Slice::new(&slice_of(&flood))).unwrap();
        assert_eq!(f.table_len(), 100);
        // The hot contents carry weight 50, far above the flood's; they
        // must survive expiration.
        assert!(f.weight(1).is_some());
        assert!(f.weight(2).is_some());
        assert!(f.weight(3).is_some());
        f.assert_coherent();
    }

    #[test]
    fn test_unseen_content_reads_zero() {
        let mut f = OgdFeature::new(OgdKind::Optimal, cap(1));
        let reqs = slice_of(&[7]);
        f.update(&Slice::new(&reqs)).unwrap();
        let m = f.features(&[7, 8]);
        assert!((m.get(0, 0) - 1.0).abs() < 1e-6);
        assert_eq!(m.get(1, 0), 0.0);
    }

    #[test]
    fn test_reset() {
        let mut f = OgdFeature::new(OgdKind::Optimal, cap(1));
        let reqs = slice_of(&[7]);
        f.update(&Slice::new(&reqs)).unwrap();
        f.reset();
        assert_eq!(f.table_len(), 0);
        assert_eq!(f.step_count(), 0);
        assert_eq!(f.weight_sum(), 0.0);
        assert_eq!(f.features(&[7]).as_slice(), &[0.0]);
    }
}
