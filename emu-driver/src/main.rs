//! CLI driver for the cache emulation engine.
//!
//! `simulate` replays a CSV trace (`timestamp,content_id`) through
//! emulators in one or both stepping modes under baseline replacement
//! policies and reports per-run hit rates; `generate` writes a synthetic
//! trace with a popularity split.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use cache_emu_rs::config::{EmuMode, EmulatorConfig, OgdKind};
use cache_emu_rs::{CacheEmu, RequestLoader, Timestamp};

mod generator;
mod input;
mod policy;

use policy::Policy;

/// Cache emulation driver CLI
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

/// Subcommands for the CLI
#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay a trace through the emulation engine
    Simulate {
        /// Trace CSV file (timestamp,content_id)
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Cache capacity (number of slots)
        #[arg(short, long, default_value = "100")]
        capacity: usize,

        /// Time-slice interval, in trace time units
        #[arg(long, default_value = "1")]
        interval: Timestamp,

        /// Stepping mode: active, passive, or both
        #[arg(long, default_value = "both")]
        mode: String,

        /// Policies to run (noop, top-frequency, feature-score)
        /// If not provided, all policies will be used
        #[arg(short, long, value_name = "POLICIES", num_args = 1.., value_delimiter = ',')]
        policies: Option<Vec<String>>,

        /// Sliding-window LFU features to install, one per window length
        #[arg(long, value_name = "SLICES", num_args = 0.., value_delimiter = ',')]
        swlfu_windows: Vec<usize>,

        /// Close an episode every N steps
        #[arg(long, value_name = "N")]
        episode_steps: Option<usize>,

        /// Export results to CSV file
        #[arg(long, value_name = "PATH")]
        output_csv: Option<PathBuf>,
    },

    /// Generate a synthetic trace
    Generate {
        /// Total requests to generate
        #[arg(long, default_value = "100000")]
        requests: u32,

        /// Number of unique objects
        #[arg(long, default_value = "10000")]
        objects: u32,

        /// Percentage of traffic from popular objects
        #[arg(long, default_value = "80")]
        popular_traffic: u8,

        /// Percentage of objects that are popular
        #[arg(long, default_value = "20")]
        popular_objects: u8,

        /// Time units to spread the trace over
        #[arg(long, default_value = "1000")]
        duration: u32,

        /// Output file
        #[arg(short, long, default_value = "trace.csv")]
        output: PathBuf,

        /// RNG seed
        #[arg(long, default_value = "42")]
        seed: u64,
    },
}

/// Outcome of one policy+mode run.
#[derive(Debug, Serialize)]
struct RunResult {
    policy: String,
    mode: String,
    capacity: usize,
    requests: u64,
    hits: u64,
    mean_hit_rate: f32,
    episodes: usize,
    elapsed_ms: u64,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    match Args::parse().command {
        Commands::Generate {
            requests,
            objects,
            popular_traffic,
            popular_objects,
            duration,
            output,
            seed,
        } => {
            let config = generator::TraceConfig {
                requests,
                unique_objects: objects,
                popular_traffic_percent: popular_traffic,
                popular_objects_percent: popular_objects,
                duration,
                output,
                seed,
            };
            generator::TraceGenerator::new(config).generate()?;
            Ok(())
        }

        Commands::Simulate {
            input,
            capacity,
            interval,
            mode,
            policies,
            swlfu_windows,
            episode_steps,
            output_csv,
        } => {
            let modes = parse_modes(&mode)?;
            let policies = parse_policies(policies.as_deref())?;

            let (ids, ts) = input::read_trace(&input)?;
            println!("Loaded {} requests from {}", ids.len(), input.display());

            let mut loader = RequestLoader::new();
            loader.load_dataset(&ids, &ts);
            let t_begin = ts.first().copied().unwrap_or(0);
            let t_end = ts.last().copied().unwrap_or(0) + 1;
            let num_slices = loader.slice_by_time(t_begin, t_end, interval);
            println!("Sliced into {num_slices} slices of interval {interval}");
            let loader = Arc::new(loader);

            let mut results = Vec::new();
            for &mode in &modes {
                for &policy in &policies {
                    let result = run_one(
                        &loader,
                        capacity,
                        mode,
                        policy,
                        &swlfu_windows,
                        episode_steps,
                    )?;
                    results.push(result);
                }
            }

            print_table(&results);
            if let Some(path) = output_csv {
                export_csv(&path, &results)?;
                println!("Results written to {}", path.display());
            }
            Ok(())
        }
    }
}

fn parse_modes(mode: &str) -> Result<Vec<EmuMode>, String> {
    match mode.to_ascii_lowercase().as_str() {
        "active" => Ok(vec![EmuMode::Active]),
        "passive" => Ok(vec![EmuMode::Passive]),
        "both" => Ok(EmuMode::all()),
        other => Err(format!("unknown mode: {other}")),
    }
}

fn parse_policies(names: Option<&[String]>) -> Result<Vec<Policy>, String> {
    match names {
        None => Ok(Policy::all()),
        Some(names) => names
            .iter()
            .map(|n| Policy::parse(n).ok_or_else(|| format!("unknown policy: {n}")))
            .collect(),
    }
}

fn run_one(
    loader: &Arc<RequestLoader>,
    capacity: usize,
    mode: EmuMode,
    policy: Policy,
    swlfu_windows: &[usize],
    episode_steps: Option<usize>,
) -> Result<RunResult, Box<dyn std::error::Error>> {
    let config = EmulatorConfig {
        capacity: std::num::NonZeroUsize::new(capacity).ok_or("capacity must be non-zero")?,
        mode,
    };
    let mut emu = CacheEmu::init(config, Arc::clone(loader));

    emu.use_lfu_feature();
    emu.use_lru_feature();
    emu.use_ogd_feature(OgdKind::Optimal);
    for &len in swlfu_windows {
        emu.use_swlfu_feature(len);
    }

    let started = Instant::now();
    let mut steps = 0usize;

    // Passive mode keeps draining the last slice after finished() flips,
    // so the exit check looks at the step's own remainder.
    while emu.num_slices() > 0 {
        let outcome = emu.step()?;
        if let Some(target) = policy.decide(&mut emu, capacity) {
            emu.update_cache(&target);
        }

        steps += 1;
        if let Some(n) = episode_steps {
            if steps % n == 0 {
                emu.on_episode_end();
            }
        }

        if emu.finished() && outcome.remaining == 0 {
            break;
        }
    }
    emu.on_episode_end();

    Ok(RunResult {
        policy: policy.to_string(),
        mode: mode.to_string(),
        capacity,
        requests: emu.stats().requests,
        hits: emu.stats().hits,
        mean_hit_rate: emu.mean_hit_rate(),
        episodes: emu.i_episode(),
        elapsed_ms: started.elapsed().as_millis() as u64,
    })
}

fn print_table(results: &[RunResult]) {
    println!();
    println!(
        "{:<15} {:<8} {:>10} {:>10} {:>10} {:>9} {:>11}",
        "Policy", "Mode", "Requests", "Hits", "Hit Rate", "Episodes", "Elapsed"
    );
    println!("{}", "-".repeat(78));
    for r in results {
        println!(
            "{:<15} {:<8} {:>10} {:>10} {:>9.2}% {:>9} {:>9}ms",
            r.policy,
            r.mode,
            r.requests,
            r.hits,
            r.mean_hit_rate * 100.0,
            r.episodes,
            r.elapsed_ms
        );
    }
    println!();
}

fn export_csv(path: &PathBuf, results: &[RunResult]) -> Result<(), Box<dyn std::error::Error>> {
    let mut writer = csv::Writer::from_path(path)?;
    for r in results {
        writer.serialize(r)?;
    }
    writer.flush()?;
    Ok(())
}
