//! Synthetic trace generation.
//!
//! Produces a `timestamp,content_id` CSV with a popularity split: a small
//! fraction of the objects receives most of the traffic, the classic shape
//! of CDN request logs. Timestamps spread the requests uniformly over the
//! requested number of time units, so slicing the result at interval 1
//! yields evenly filled slices.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Parameters for generating a synthetic trace.
#[derive(Debug, Clone)]
pub struct TraceConfig {
    /// Total requests to generate.
    pub requests: u32,
    /// Number of unique objects.
    pub unique_objects: u32,
    /// Percentage of traffic aimed at popular objects.
    pub popular_traffic_percent: u8,
    /// Percentage of objects considered popular.
    pub popular_objects_percent: u8,
    /// Number of time units to spread the trace over.
    pub duration: u32,
    /// Output file.
    pub output: PathBuf,
    /// RNG seed, for reproducible traces.
    pub seed: u64,
}

/// Generator for synthetic request traces.
#[derive(Debug)]
pub struct TraceGenerator {
    config: TraceConfig,
}

impl TraceGenerator {
    /// Creates a generator with the given configuration.
    pub fn new(config: TraceConfig) -> Self {
        Self { config }
    }

    /// Writes the trace to the configured output file. Returns the number
    /// of requests written.
    pub fn generate(&self) -> std::io::Result<u32> {
        let cfg = &self.config;
        let popular_objects =
            (u64::from(cfg.unique_objects) * u64::from(cfg.popular_objects_percent) / 100) as u32;
        let popular_objects = popular_objects.max(1).min(cfg.unique_objects);

        println!("Generating {} requests:", cfg.requests);
        println!("  Unique objects: {}", cfg.unique_objects);
        println!(
            "  Traffic split: {}% of requests to {} popular objects",
            cfg.popular_traffic_percent, popular_objects
        );
        println!("  Duration: {} time units", cfg.duration);
        println!("  Output: {}", cfg.output.display());

        let mut rng = StdRng::seed_from_u64(cfg.seed);
        let file = File::create(&cfg.output)?;
        let mut out = BufWriter::with_capacity(1024 * 1024, file);

        writeln!(out, "timestamp,content_id")?;

        let duration = cfg.duration.max(1);
        for i in 0..cfg.requests {
            // Requests are written in timestamp order.
            let timestamp = (u64::from(i) * u64::from(duration) / u64::from(cfg.requests)) as u32;

            let content_id = if rng.gen_range(0..100u8) < cfg.popular_traffic_percent {
                rng.gen_range(0..popular_objects)
            } else if popular_objects < cfg.unique_objects {
                rng.gen_range(popular_objects..cfg.unique_objects)
            } else {
                rng.gen_range(0..cfg.unique_objects)
            };

            writeln!(out, "{timestamp},{content_id}")?;
        }

        out.flush()?;
        Ok(cfg.requests)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_trace_parses_back() {
        let path = std::env::temp_dir().join("emu_driver_generator_test.csv");
        let config = TraceConfig {
            requests: 500,
            unique_objects: 50,
            popular_traffic_percent: 80,
            popular_objects_percent: 20,
            duration: 10,
            output: path.clone(),
            seed: 7,
        };
        TraceGenerator::new(config).generate().unwrap();

        let (ids, ts) = crate::input::read_trace(&path).unwrap();
        assert_eq!(ids.len(), 500);
        assert!(ts.windows(2).all(|w| w[0] <= w[1]));
        assert!(ids.iter().all(|&c| (0..50).contains(&c)));
        assert!(ts.iter().all(|&t| (0..10).contains(&t)));
        std::fs::remove_file(&path).ok();
    }
}
