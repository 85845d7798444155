// Copyright 2026 foyer Project Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Multi-threaded load generator for the in-memory block cache.

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    thread::JoinHandle,
    time::{Duration, Instant},
};

use anyhow::{anyhow, ensure, Result};
use blockcache_memory::{Cache, CacheBuilder, MigrationMode, Stats};
use bytes::Bytes;
use bytesize::{ByteSize, MIB};
use clap::Parser;
use hdrhistogram::Histogram;
use itertools::Itertools;
use rand::{rngs::SmallRng, Rng, SeedableRng};
use rand_distr::{Distribution as _, Zipf};

/// Bench arguments.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
pub struct Args {
    /// In-memory cache capacity. (MiB)
    #[arg(long, default_value_t = 64)]
    capacity: u64,

    /// Worker threads.
    #[arg(long, default_value_t = 8)]
    threads: usize,

    /// Operations per worker thread.
    #[arg(long, default_value_t = 1_000_000)]
    ops: u64,

    /// Keys are drawn from `[0, key_range)`.
    #[arg(long, default_value_t = 100_000)]
    key_range: u64,

    /// Namespaces are drawn from `[0, namespaces)`.
    #[arg(long, default_value_t = 4)]
    namespaces: u64,

    /// (B)
    #[arg(long, default_value_t = 4 * 1024)]
    value_size_min: usize,

    /// (B)
    #[arg(long, default_value_t = 16 * 1024)]
    value_size_max: usize,

    /// Share of operations that are lookups. A miss is followed by a set.
    #[arg(long, default_value_t = 0.8)]
    get_ratio: f64,

    /// Share of operations that are deletes.
    #[arg(long, default_value_t = 0.01)]
    delete_ratio: f64,

    /// Parallelism factor of the cache index.
    #[arg(long, default_value_t = blockcache_memory::DEFAULT_SHARDS)]
    shards: usize,

    /// Key distribution.
    ///
    /// Available values: "uniform", "zipf".
    #[arg(long, default_value = "uniform")]
    distribution: String,

    /// For `--distribution zipf` only.
    #[arg(long, default_value_t = 0.8)]
    zipf_s: f64,

    /// Migrate index buckets only on access instead of with a background migrator.
    #[arg(long, default_value_t = false)]
    lazy: bool,
}

#[derive(Debug, Clone)]
enum KeyDistribution {
    Uniform { n: u64 },
    Zipf { dist: Zipf<f64> },
}

impl KeyDistribution {
    fn new(args: &Args) -> Result<Self> {
        match args.distribution.as_str() {
            "uniform" => Ok(Self::Uniform { n: args.key_range }),
            "zipf" => {
                let dist = Zipf::new(args.key_range as f64, args.zipf_s).map_err(|e| anyhow!("invalid zipf: {e}"))?;
                Ok(Self::Zipf { dist })
            }
            other => Err(anyhow!("unsupported distribution: {other}")),
        }
    }

    fn sample(&self, rng: &mut SmallRng) -> u64 {
        match self {
            Self::Uniform { n } => rng.random_range(0..*n),
            // Zipf samples ranks in `[1, n]`.
            Self::Zipf { dist } => dist.sample(rng) as u64 - 1,
        }
    }
}

#[derive(Debug, Default)]
struct Counts {
    gets: AtomicU64,
    hits: AtomicU64,
    sets: AtomicU64,
    rejects: AtomicU64,
    deletes: AtomicU64,
}

struct Context {
    cache: Cache,
    args: Args,
    keys: KeyDistribution,
    payload: Bytes,
    counts: Counts,
}

fn init_logger() {
    use tracing_subscriber::{prelude::*, EnvFilter};

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_line_number(true))
        .with(EnvFilter::from_default_env())
        .init();
}

#[cfg(feature = "deadlock")]
fn spawn_deadlock_detector() {
    std::thread::spawn(move || loop {
        std::thread::sleep(Duration::from_secs(1));
        let deadlocks = parking_lot::deadlock::check_deadlock();
        if deadlocks.is_empty() {
            continue;
        }

        println!("{} deadlocks detected", deadlocks.len());
        for (i, threads) in deadlocks.iter().enumerate() {
            println!("Deadlock #{}", i);
            for t in threads {
                println!("Thread Id {:#?}", t.thread_id());
                println!("{:#?}", t.backtrace());
            }
        }
        panic!()
    });
}

fn validate(args: &Args) -> Result<()> {
    ensure!(args.threads > 0, "\"--threads\" value must be greater than 0");
    ensure!(args.key_range > 0, "\"--key-range\" value must be greater than 0");
    ensure!(args.namespaces > 0, "\"--namespaces\" value must be greater than 0");
    ensure!(
        args.value_size_min > 0 && args.value_size_min <= args.value_size_max,
        "\"--value-size-min\" must be in (0, \"--value-size-max\"]"
    );
    ensure!(
        (0.0..=1.0).contains(&args.get_ratio)
            && (0.0..=1.0).contains(&args.delete_ratio)
            && args.get_ratio + args.delete_ratio <= 1.0,
        "\"--get-ratio\" and \"--delete-ratio\" must sum to at most 1"
    );
    Ok(())
}

fn run(context: &Context, seed: u64) -> Result<Histogram<u64>> {
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut histogram = Histogram::<u64>::new(3)?;
    let args = &context.args;

    for _ in 0..args.ops {
        let namespace = rng.random_range(0..args.namespaces);
        let key = context.keys.sample(&mut rng);
        let op: f64 = rng.random();

        let start = Instant::now();
        if op < args.get_ratio {
            context.counts.gets.fetch_add(1, Ordering::Relaxed);
            match context.cache.get(namespace, key) {
                Some(handle) => {
                    context.counts.hits.fetch_add(1, Ordering::Relaxed);
                    if let Some(value) = handle.load() {
                        std::hint::black_box(value.len());
                    }
                    handle.release();
                }
                None => set(context, &mut rng, namespace, key),
            }
        } else if op < args.get_ratio + args.delete_ratio {
            context.cache.delete(namespace, key);
            context.counts.deletes.fetch_add(1, Ordering::Relaxed);
        } else {
            set(context, &mut rng, namespace, key);
        }
        histogram.saturating_record(start.elapsed().as_nanos() as u64);
    }

    Ok(histogram)
}

fn set(context: &Context, rng: &mut SmallRng, namespace: u64, key: u64) {
    let size = rng.random_range(context.args.value_size_min..=context.args.value_size_max);
    match context.cache.try_set(namespace, key, context.payload.slice(..size)) {
        Ok(()) => context.counts.sets.fetch_add(1, Ordering::Relaxed),
        Err(e) => {
            tracing::trace!("[bench]: set rejected: {e}");
            context.counts.rejects.fetch_add(1, Ordering::Relaxed)
        }
    };
}

fn report(args: &Args, elapsed: Duration, histogram: &Histogram<u64>, counts: &Counts, stats: &Stats) {
    let ops = args.ops * args.threads as u64;
    let secs = elapsed.as_secs_f64();
    let gets = counts.gets.load(Ordering::Relaxed);
    let hits = counts.hits.load(Ordering::Relaxed);
    let hit_ratio = if gets == 0 { 0.0 } else { hits as f64 / gets as f64 };

    println!();
    println!("Total:");
    println!("elapsed: {:.3}s", secs);
    println!("ops: {} ({:.0} ops/s)", ops, ops as f64 / secs);
    println!("gets: {} hits: {} (hit ratio: {:.2}%)", gets, hits, hit_ratio * 100.0);
    println!(
        "sets: {} rejects: {} deletes: {}",
        counts.sets.load(Ordering::Relaxed),
        counts.rejects.load(Ordering::Relaxed),
        counts.deletes.load(Ordering::Relaxed)
    );

    let latency = [
        ("p50", histogram.value_at_quantile(0.5)),
        ("p90", histogram.value_at_quantile(0.9)),
        ("p99", histogram.value_at_quantile(0.99)),
        ("p999", histogram.value_at_quantile(0.999)),
        ("max", histogram.max()),
    ]
    .iter()
    .map(|(label, ns)| format!("{label}: {:?}", Duration::from_nanos(*ns)))
    .join(", ");
    println!("latency: {latency}");

    println!(
        "usage: {} / {} (nodes: {}, buckets: {}, grows: {}, shrinks: {}, evictions: {})",
        ByteSize::b(stats.usage.max(0) as u64),
        ByteSize::b(stats.capacity.max(0) as u64),
        stats.nodes,
        stats.buckets,
        stats.grows,
        stats.shrinks,
        stats.evictions,
    );
    println!("{:#?}", stats);
}

fn main() -> Result<()> {
    init_logger();

    #[cfg(feature = "deadlock")]
    spawn_deadlock_detector();

    let args = Args::parse();
    println!("{:#?}", args);
    validate(&args)?;

    let keys = KeyDistribution::new(&args)?;

    let builder = CacheBuilder::new((args.capacity * MIB) as i64)
        .with_name("bench")
        .with_shards(args.shards)
        .with_migration_mode(if args.lazy {
            MigrationMode::Lazy
        } else {
            MigrationMode::Background
        });

    #[cfg(feature = "prometheus")]
    let registry = blockcache_memory::PrometheusMetricsRegistry::new(prometheus::Registry::new());
    #[cfg(feature = "prometheus")]
    let builder = builder.with_metrics_registry(registry.clone());

    let cache = builder.build()?;

    let context = Arc::new(Context {
        cache: cache.clone(),
        payload: Bytes::from(vec![b'x'; args.value_size_max]),
        args: args.clone(),
        keys,
        counts: Counts::default(),
    });

    let start = Instant::now();
    let workers: Vec<JoinHandle<Result<Histogram<u64>>>> = (0..args.threads as u64)
        .map(|i| {
            let context = context.clone();
            std::thread::Builder::new()
                .name(format!("bench-worker-{i}"))
                .spawn(move || run(&context, i))
        })
        .try_collect()?;

    let mut histogram = Histogram::<u64>::new(3)?;
    for worker in workers {
        let h = worker.join().map_err(|_| anyhow!("bench worker panicked"))??;
        histogram.add(&h)?;
    }
    let elapsed = start.elapsed();

    report(&args, elapsed, &histogram, &context.counts, &cache.stats());

    #[cfg(feature = "prometheus")]
    {
        use prometheus::Encoder;

        let mut buf = vec![];
        prometheus::TextEncoder::new().encode(&registry.registry().gather(), &mut buf)?;
        println!("{}", String::from_utf8_lossy(&buf));
    }

    cache.close(false);
    Ok(())
}
