//! Hit-rate accounting.
//!
//! Tracks request and hit counts at two scopes: globally over the life of
//! the emulator, and per episode (a caller-delimited segment of steps). The
//! engine never decides an episode boundary itself; the caller closes one
//! with [`end_episode`], which archives the episode's rate and clears the
//! episode counters.
//!
//! Rates use the `EPS` denominator (`hits / (requests + EPS)`), so an empty
//! scope reports a rate of zero instead of dividing by zero.
//!
//! Reports use `BTreeMap` for deterministic key ordering, which keeps logs
//! and exported results reproducible across runs.
//!
//! [`end_episode`]: HitStats::end_episode

use std::collections::BTreeMap;

use crate::trace::EPS;

/// Request/hit counters with per-episode history.
#[derive(Debug, Default, Clone)]
pub struct HitStats {
    /// Requests processed since construction or the last [`HitStats::reset`].
    pub requests: u64,
    /// Hits among [`HitStats::requests`].
    pub hits: u64,
    /// Requests processed in the current episode.
    pub episode_requests: u64,
    /// Hits among [`HitStats::episode_requests`].
    pub episode_hits: u64,
    i_episode: usize,
    episode_hit_rates: Vec<f32>,
}

impl HitStats {
    /// Creates zeroed statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one processed request at both scopes.
    #[inline]
    pub fn record_request(&mut self, hit: bool) {
        self.requests += 1;
        self.episode_requests += 1;
        if hit {
            self.hits += 1;
            self.episode_hits += 1;
        }
    }

    /// Hit rate over every request processed so far.
    #[inline]
    pub fn mean_hit_rate(&self) -> f32 {
        self.hits as f32 / (self.requests as f32 + EPS)
    }

    /// Hit rate of the current (unfinished) episode.
    #[inline]
    pub fn episode_hit_rate(&self) -> f32 {
        self.episode_hits as f32 / (self.episode_requests as f32 + EPS)
    }

    /// Closes the current episode: archives its hit rate, clears the episode
    /// counters, advances the episode index, and returns the rate.
    pub fn end_episode(&mut self) -> f32 {
        let rate = self.episode_hit_rate();
        self.episode_hit_rates.push(rate);

        self.episode_requests = 0;
        self.episode_hits = 0;
        self.i_episode += 1;

        rate
    }

    /// Index of the current episode.
    #[inline]
    pub fn i_episode(&self) -> usize {
        self.i_episode
    }

    /// Hit rates of every closed episode, oldest first.
    #[inline]
    pub fn episode_hit_rates(&self) -> &[f32] {
        &self.episode_hit_rates
    }

    /// Zeroes all counters and the episode index.
    ///
    /// The archived episode hit rates survive a reset, so the history spans
    /// multiple runs over the same trace.
    pub fn reset(&mut self) {
        self.requests = 0;
        self.hits = 0;
        self.episode_requests = 0;
        self.episode_hits = 0;
        self.i_episode = 0;
    }

    /// All counters and rates as key-value pairs in deterministic order.
    pub fn to_btreemap(&self) -> BTreeMap<String, f64> {
        let mut metrics = BTreeMap::new();
        metrics.insert("episode_hits".to_string(), self.episode_hits as f64);
        metrics.insert("episode_requests".to_string(), self.episode_requests as f64);
        metrics.insert("episodes_ended".to_string(), self.i_episode as f64);
        metrics.insert("hits".to_string(), self.hits as f64);
        metrics.insert("mean_hit_rate".to_string(), f64::from(self.mean_hit_rate()));
        metrics.insert("requests".to_string(), self.requests as f64);
        metrics
    }
}
