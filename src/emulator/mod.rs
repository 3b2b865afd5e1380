//! Cache emulators.
//!
//! An emulator walks a time-sliced trace and, after every step, exposes to
//! an external replacement policy: the requests it processed, the candidate
//! contents (current cache occupancy followed by the step's misses), the
//! hit-test counts against those candidates, and the feature matrix of any
//! queried contents. The policy answers through [`update_cache`], declaring
//! the full intended occupancy; the engine itself never evicts.
//!
//! ```text
//!             ┌────────────┐   step()    ┌──────────────────────────┐
//! loader ───▶ │  emulator  │ ──────────▶ │ candidates, frequencies, │
//!             │ cache+feat │             │ features, step elements  │
//!             └────────────┘ ◀────────── └──────────────────────────┘
//!                              update_cache(new occupancy)
//! ```
//!
//! Two stepping disciplines share all of this behavior and differ only in
//! how much of the trace one `step` consumes:
//!
//! | Mode | One `step` consumes | Misses reported |
//! |------|---------------------|-----------------|
//! | [`ActiveCacheEmu`] | the next whole time-slice | deduplicated set, sorted |
//! | [`PassiveCacheEmu`] | requests up to the first miss | at most one |
//!
//! Both disciplines agree on statistics and candidate construction; over the
//! same trace with an untouched cache they report identical cumulative
//! counts.
//!
//! Output buffers (candidates, frequencies, step elements, features) are
//! owned by the emulator and valid until its next mutating call.
//!
//! [`update_cache`]: CacheEmu::update_cache

pub mod active;
pub mod passive;

pub use active::ActiveCacheEmu;
pub use passive::PassiveCacheEmu;

use core::num::NonZeroUsize;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::cache::Cache;
use crate::config::{EmuMode, EmulatorConfig, OgdKind};
use crate::error::EmuError;
use crate::feature::{
    FeatureExtractor, FeatureManager, FeatureMatrix, IdFeature, LfuFeature, LruFeature,
    OgdFeature, SwLfuFeature,
};
use crate::metrics::HitStats;
use crate::trace::{Content, RequestLoader, NO_CONTENT};

/// Per-step outcome: requests processed, misses reported, requests left in
/// the current slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepResult {
    /// Requests consumed by this step.
    pub processed: usize,
    /// Distinct missed contents (active) or whether a miss occurred
    /// (passive, `0` or `1`).
    pub missed: usize,
    /// Requests of the current slice not yet consumed (always `0` in
    /// active mode).
    pub remaining: usize,
}

/// State and behavior shared by both stepping disciplines.
///
/// The cache and feature manager are exclusively owned; the loader is
/// shared read-only with every other emulator built against it.
pub(crate) struct EmuCore {
    pub(crate) capacity: NonZeroUsize,
    pub(crate) cache: Cache,
    pub(crate) features: FeatureManager,
    pub(crate) loader: Arc<RequestLoader>,
    pub(crate) stats: HitStats,
    pub(crate) i_slice: usize,
    pub(crate) step_buf: Vec<Content>,
    pub(crate) candidate_buf: Vec<Content>,
    pub(crate) candidate_freq_buf: Vec<f32>,
}

impl EmuCore {
    pub(crate) fn new(capacity: NonZeroUsize, loader: Arc<RequestLoader>) -> Self {
        let mut core = EmuCore {
            capacity,
            cache: Cache::init(capacity),
            features: FeatureManager::new(),
            loader,
            stats: HitStats::new(),
            i_slice: 0,
            step_buf: Vec::new(),
            candidate_buf: Vec::with_capacity(capacity.get() + 1),
            candidate_freq_buf: Vec::with_capacity(capacity.get() + 1),
        };
        core.publish_candidates([], None);
        core
    }

    pub(crate) fn reset(&mut self) {
        tracing::debug!("emulator reset");
        self.stats.reset();
        self.i_slice = 0;
        self.cache.reset();
        self.features.reset();
        self.step_buf.clear();
        self.publish_candidates([], None);
    }

    /// Records one request against the cache and the counters. Returns
    /// whether it hit.
    pub(crate) fn process_request(&mut self, content: Content) -> bool {
        self.step_buf.push(content);
        let hit = self.cache.hit_test(content);
        self.stats.record_request(hit);
        hit
    }

    /// Rebuilds the candidate buffers: cache contents in slot order,
    /// followed by `missed`; frequencies in candidate order, zero-padded to
    /// `pad_to` if given. Clears the cache's frequency accounting.
    pub(crate) fn publish_candidates<I>(&mut self, missed: I, pad_to: Option<usize>)
    where
        I: IntoIterator<Item = Content>,
    {
        self.candidate_buf.clear();
        self.candidate_buf.extend_from_slice(self.cache.contents());
        self.candidate_buf.extend(missed);

        self.candidate_freq_buf.clear();
        let freqs = self.cache.frequencies(&self.candidate_buf);
        self.candidate_freq_buf.extend_from_slice(freqs);
        self.cache.clear_frequencies();

        if let Some(n) = pad_to {
            while self.candidate_freq_buf.len() < n {
                self.candidate_freq_buf.push(0.0);
            }
        }
    }

    /// Rewrites the cache occupancy to `new_contents` (see
    /// [`CacheEmu::update_cache`]).
    pub(crate) fn update_cache(&mut self, new_contents: &[Content]) {
        let mut s_old: BTreeSet<Content> = self
            .cache
            .contents()
            .iter()
            .copied()
            .filter(|&c| c != NO_CONTENT)
            .collect();
        let mut s_new: BTreeSet<Content> = new_contents
            .iter()
            .copied()
            .filter(|&c| c != NO_CONTENT)
            .collect();

        // Contents already cached survive without action.
        for &c in new_contents {
            if c != NO_CONTENT && self.cache.find(c).is_some() {
                s_old.remove(&c);
                s_new.remove(&c);
            }
        }

        tracing::debug!(?s_old, ?s_new, "update_cache");

        // Pair the trimmed sets in ascending content order; once the olds
        // run out the remaining news fill empty slots.
        let mut olds = s_old.iter();
        for &new in &s_new {
            match olds.next() {
                Some(&old) => self.cache.replace(new, old),
                None => self.cache.replace(new, NO_CONTENT),
            }
        }
    }

    pub(crate) fn finished(&self) -> bool {
        self.i_slice >= self.loader.num_slices()
    }

    pub(crate) fn use_ogd_feature(&mut self, kind: OgdKind) {
        self.features
            .add_extractor(Box::new(OgdFeature::new(kind, self.capacity)));
    }

    pub(crate) fn use_swlfu_feature(&mut self, window_len: usize) {
        self.features.add_extractor(Box::new(SwLfuFeature::new(
            window_len,
            Arc::clone(&self.loader),
        )));
    }
}

impl core::fmt::Debug for EmuCore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EmuCore")
            .field("capacity", &self.capacity)
            .field("i_slice", &self.i_slice)
            .field("features", &self.features)
            .finish()
    }
}

/// A cache emulator in either stepping discipline.
///
/// Thin dispatch over [`ActiveCacheEmu`] and [`PassiveCacheEmu`]; the
/// boundary registry and the driver handle emulators through this type.
#[derive(Debug)]
pub enum CacheEmu {
    /// Batch-per-slice discipline.
    Active(ActiveCacheEmu),
    /// One-miss-at-a-time discipline.
    Passive(PassiveCacheEmu),
}

impl CacheEmu {
    /// Creates an emulator per `config` against the shared `loader`.
    ///
    /// The emulator starts with no feature extractors; install them through
    /// the `use_*` methods before the first step.
    pub fn init(config: EmulatorConfig, loader: Arc<RequestLoader>) -> Self {
        match config.mode {
            EmuMode::Active => CacheEmu::Active(ActiveCacheEmu::init(config.capacity, loader)),
            EmuMode::Passive => CacheEmu::Passive(PassiveCacheEmu::init(config.capacity, loader)),
        }
    }

    /// This emulator's stepping discipline.
    pub fn mode(&self) -> EmuMode {
        match self {
            CacheEmu::Active(_) => EmuMode::Active,
            CacheEmu::Passive(_) => EmuMode::Passive,
        }
    }

    fn core(&self) -> &EmuCore {
        match self {
            CacheEmu::Active(e) => e.core(),
            CacheEmu::Passive(e) => e.core(),
        }
    }

    fn core_mut(&mut self) -> &mut EmuCore {
        match self {
            CacheEmu::Active(e) => e.core_mut(),
            CacheEmu::Passive(e) => e.core_mut(),
        }
    }

    /// Processes the next batch of requests (see the mode docs).
    pub fn step(&mut self) -> Result<StepResult, EmuError> {
        match self {
            CacheEmu::Active(e) => e.step(),
            CacheEmu::Passive(e) => e.step(),
        }
    }

    /// Returns counters, cache, and extractor state to their initial
    /// values. Installed extractors and the archived episode history are
    /// kept.
    pub fn reset(&mut self) {
        match self {
            CacheEmu::Active(e) => e.reset(),
            CacheEmu::Passive(e) => e.reset(),
        }
    }

    /// Rewrites the cache occupancy to `new_contents`: contents already
    /// cached stay put, departing and arriving contents are paired in
    /// ascending order and swapped slot-for-slot, and surplus arrivals fill
    /// empty slots. Applying the same occupancy twice is a no-op after the
    /// first.
    ///
    /// # Panics
    ///
    /// Panics if `new_contents` lists a content twice, or lists more new
    /// contents than the cache has slots to hold.
    pub fn update_cache(&mut self, new_contents: &[Content]) {
        self.core_mut().update_cache(new_contents);
    }

    /// Current cache occupancy in slot order (empty slots read as `-1`).
    pub fn cache_contents(&self) -> &[Content] {
        self.core().cache.contents()
    }

    /// Candidates of the last step: cache contents, then its misses.
    pub fn candidates(&self) -> &[Content] {
        &self.core().candidate_buf
    }

    /// Hit-test counts of the last step, one per candidate (passive mode
    /// zero-pads to `capacity + 1`).
    pub fn candidate_frequencies(&self) -> &[f32] {
        &self.core().candidate_freq_buf
    }

    /// Requests processed by the last step, in order.
    pub fn step_elements(&self) -> &[Content] {
        &self.core().step_buf
    }

    /// Feature matrix of `contents` under the installed extractors.
    pub fn features(&mut self, contents: &[Content]) -> &FeatureMatrix {
        self.core_mut().features.features(contents)
    }

    /// Total feature columns across installed extractors.
    pub fn feature_dims(&self) -> usize {
        self.core().features.feature_dims()
    }

    /// Returns `true` once every time-slice has been stepped through.
    pub fn finished(&self) -> bool {
        self.core().finished()
    }

    /// Index of the next time-slice to load.
    pub fn i_slice(&self) -> usize {
        self.core().i_slice
    }

    /// Number of time-slices in the shared trace.
    pub fn num_slices(&self) -> usize {
        self.core().loader.num_slices()
    }

    /// Hit rate over every request processed since the last reset.
    pub fn mean_hit_rate(&self) -> f32 {
        self.core().stats.mean_hit_rate()
    }

    /// Index of the current episode.
    pub fn i_episode(&self) -> usize {
        self.core().stats.i_episode()
    }

    /// Closes the current episode and returns its hit rate.
    pub fn on_episode_end(&mut self) -> f32 {
        let rate = self.core_mut().stats.end_episode();
        tracing::debug!(
            episode = self.i_episode(),
            rate,
            mean = self.mean_hit_rate(),
            "episode end"
        );
        rate
    }

    /// Hit rates of every closed episode, oldest first.
    pub fn episode_hit_rates(&self) -> &[f32] {
        self.core().stats.episode_hit_rates()
    }

    /// Request/hit counters.
    pub fn stats(&self) -> &HitStats {
        &self.core().stats
    }

    /// Installs the identity feature.
    pub fn use_id_feature(&mut self) {
        self.core_mut()
            .features
            .add_extractor(Box::new(IdFeature::new()));
    }

    /// Installs the plain recency feature.
    pub fn use_lru_feature(&mut self) {
        self.core_mut()
            .features
            .add_extractor(Box::new(LruFeature::new()));
    }

    /// Installs the plain frequency feature.
    pub fn use_lfu_feature(&mut self) {
        self.core_mut()
            .features
            .add_extractor(Box::new(LfuFeature::new()));
    }

    /// Installs a sliding-window frequency feature over `window_len`
    /// slices.
    pub fn use_swlfu_feature(&mut self, window_len: usize) {
        self.core_mut().use_swlfu_feature(window_len);
    }

    /// Installs an online-gradient-descent feature of the given kind.
    pub fn use_ogd_feature(&mut self, kind: OgdKind) {
        self.core_mut().use_ogd_feature(kind);
    }

    /// Installs a custom extractor.
    pub fn add_feature_extractor(&mut self, extractor: Box<dyn FeatureExtractor>) {
        self.core_mut().features.add_extractor(extractor);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::NO_CONTENT;

    fn loader(ids: &[Content], ts: &[i32], t_end: i32) -> Arc<RequestLoader> {
        let mut l = RequestLoader::new();
        l.load_dataset(ids, ts);
        l.slice_by_time(0, t_end, 1);
        Arc::new(l)
    }

    fn emu(capacity: usize, mode: EmuMode, loader: Arc<RequestLoader>) -> CacheEmu {
        CacheEmu::init(
            EmulatorConfig {
                capacity: NonZeroUsize::new(capacity).unwrap(),
                mode,
            },
            loader,
        )
    }

    #[test]
    fn test_update_cache_fills_empty_slots() {
        let l = loader(&[1], &[0], 1);
        let mut e = emu(3, EmuMode::Active, l);
        e.update_cache(&[1, 2, 3]);
        assert_eq!(e.cache_contents(), &[1, 2, 3]);
    }

    #[test]
    fn test_update_cache_is_idempotent() {
        let l = loader(&[1], &[0], 1);
        let mut e = emu(3, EmuMode::Active, l);
        e.update_cache(&[5, 9, 7]);
        let after_first = e.cache_contents().to_vec();
        e.update_cache(&[5, 9, 7]);
        assert_eq!(e.cache_contents(), &after_first[..]);
    }

    #[test]
    fn test_update_cache_pairs_in_sorted_order() {
        let l = loader(&[1], &[0], 1);
        let mut e = emu(3, EmuMode::Active, l);
        e.update_cache(&[10, 20, 30]); // slots [10, 20, 30]

        // 20 survives in place; {10, 30} depart, {5, 40} arrive: sorted
        // pairing puts 5 into 10's slot and 40 into 30's slot.
        e.update_cache(&[20, 40, 5]);
        assert_eq!(e.cache_contents(), &[5, 20, 40]);
    }

    #[test]
    fn test_update_cache_with_sentinels_keeps_leftovers() {
        let l = loader(&[1], &[0], 1);
        let mut e = emu(3, EmuMode::Active, l);
        e.update_cache(&[10, 20, 30]);

        // Fewer news than olds: unmatched olds stay cached.
        e.update_cache(&[40, NO_CONTENT, NO_CONTENT]);
        assert_eq!(e.cache_contents(), &[40, 20, 30]);
    }

    #[test]
    fn test_converges_to_target_occupancy() {
        let l = loader(&[1], &[0], 1);
        let mut e = emu(4, EmuMode::Active, l);
        e.update_cache(&[1, 2, 3, 4]);
        e.update_cache(&[3, 9, 8, 1]);

        let got: BTreeSet<Content> = e.cache_contents().iter().copied().collect();
        let want: BTreeSet<Content> = [1, 3, 8, 9].into_iter().collect();
        assert_eq!(got, want);
    }

    #[test]
    fn test_reset_preserves_extractors() {
        let l = loader(&[1, 2], &[0, 0], 1);
        let mut e = emu(2, EmuMode::Active, l);
        e.use_lfu_feature();
        e.use_ogd_feature(OgdKind::Optimal);
        assert_eq!(e.feature_dims(), 2);

        e.step().unwrap();
        e.reset();

        assert_eq!(e.feature_dims(), 2);
        assert_eq!(e.i_slice(), 0);
        assert_eq!(e.stats().requests, 0);
        assert_eq!(e.cache_contents(), &[NO_CONTENT, NO_CONTENT]);
        // Extractor state was cleared along with the counters.
        assert_eq!(e.features(&[1]).as_slice(), &[0.0, 0.0]);
    }

    #[test]
    fn test_candidates_seeded_from_empty_cache() {
        let l = loader(&[1], &[0], 1);
        let e = emu(2, EmuMode::Active, l);
        assert_eq!(e.candidates(), &[NO_CONTENT, NO_CONTENT]);
        assert_eq!(e.candidate_frequencies(), &[0.0, 0.0]);
    }
}
