//! Concurrency policy & sharded field kernels
//!
//! Nothing in this crate reads hardware or environment state implicitly: the
//! commit path receives a [`ConcurrencyPolicy`], and the only environment
//! read is [`ConcurrencyPolicy::detect`], which callers invoke (or not)
//! themselves.
//!
//! A [`CpuLimiter`] is a bounded rayon pool. Clones share the pool, so the
//! bound holds across every call that runs inside it.
//!
//! The kernels below split work into contiguous shards the same way the
//! block iterators in this crate family split a trace: `[s·len, (s+1)·len)`
//! with a shorter final shard. Sequential recurrences run in increasing index
//! order inside each shard; shard carries are then combined left to right.

#![forbid(unsafe_code)]

use std::sync::Arc;

use ark_ff::{batch_inversion, One};
use rayon::prelude::*;

use crate::F;

/// Environment override for [`ConcurrencyPolicy::detect`].
pub const NUM_THREADS_ENV: &str = "TINYKZG_NUM_THREADS";

/// Above this many hardware threads, an unlimited commit splits its MSM in two.
pub const DEFAULT_SPLIT_THRESHOLD: usize = 16;

// Rough cost of one inversion in multiplications; below one shard per this
// many elements, sharding the batch inversion is not worth it.
const INV_MUL_RATIO: usize = 1000 / 17;

// Minimum shard length for the prefix-product recurrence.
const MIN_PREFIX_SHARD: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum ParallelError {
    #[error("a concurrency limiter needs at least one thread")]
    ZeroThreads,
    #[error("failed to build bounded thread pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// Bounded-concurrency handle: at most `threads()` workers run inside it.
#[derive(Debug, Clone)]
pub struct CpuLimiter {
    pool: Arc<rayon::ThreadPool>,
}

impl CpuLimiter {
    /// Create a limiter backed by a dedicated pool of `threads` workers.
    pub fn new(threads: usize) -> Result<Self, ParallelError> {
        if threads == 0 {
            return Err(ParallelError::ZeroThreads);
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("tinykzg-{i}"))
            .build()?;
        Ok(Self { pool: Arc::new(pool) })
    }

    /// Worker bound of this limiter.
    #[inline]
    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Run `op` with all nested parallel work confined to this limiter.
    pub fn install<R, OP>(&self, op: OP) -> R
    where
        OP: FnOnce() -> R + Send,
        R: Send,
    {
        self.pool.install(op)
    }
}

/// Explicit concurrency policy for multi-scalar multiplications.
#[derive(Debug, Clone)]
pub struct ConcurrencyPolicy {
    /// When set, every MSM is a single call bounded by this limiter.
    pub limiter: Option<CpuLimiter>,
    /// Hardware parallelism the caller wants the heuristic to assume.
    pub available: usize,
    /// Split an unlimited MSM in two when `available > split_threshold`.
    pub split_threshold: usize,
}

impl ConcurrencyPolicy {
    /// Read `TINYKZG_NUM_THREADS`, falling back to the OS-reported parallelism.
    pub fn detect() -> Self {
        let available = std::env::var(NUM_THREADS_ENV)
            .ok()
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|&n| n > 0)
            .or_else(|| std::thread::available_parallelism().ok().map(|n| n.get()))
            .unwrap_or(1);
        Self::with_available(available)
    }

    /// Policy assuming `available` hardware threads and the default threshold.
    pub fn with_available(available: usize) -> Self {
        Self { limiter: None, available, split_threshold: DEFAULT_SPLIT_THRESHOLD }
    }

    /// Policy that routes every MSM through `limiter`.
    pub fn limited(limiter: CpuLimiter) -> Self {
        let available = limiter.threads();
        Self { limiter: Some(limiter), available, split_threshold: DEFAULT_SPLIT_THRESHOLD }
    }

    /// Whether an MSM over `len` terms should be evaluated as two halves.
    #[inline]
    pub fn should_split(&self, len: usize) -> bool {
        self.limiter.is_none() && self.available > self.split_threshold && len >= 2
    }
}

impl Default for ConcurrencyPolicy {
    fn default() -> Self {
        Self::detect()
    }
}

/// Shard length splitting `n` items into at most `shards` contiguous shards (≥ 1).
#[inline]
pub fn shard_len(n: usize, shards: usize) -> usize {
    let shards = shards.max(1);
    ((n + shards - 1) / shards).max(1)
}

/// `v[i] ← v[0]·v[1]·…·v[i]`, sharded with a left-to-right carry pass.
pub fn prefix_products_in_place(v: &mut [F]) {
    if v.len() < 2 {
        return;
    }
    let shards = rayon::current_num_threads()
        .min(v.len() / MIN_PREFIX_SHARD)
        .max(1);
    let chunk = shard_len(v.len(), shards);

    let totals: Vec<F> = v
        .par_chunks_mut(chunk)
        .map(|shard| {
            for i in 1..shard.len() {
                let prev = shard[i - 1];
                shard[i] *= prev;
            }
            shard[shard.len() - 1]
        })
        .collect();

    let mut carries = Vec::with_capacity(totals.len());
    let mut carry = F::one();
    for t in &totals {
        carries.push(carry);
        carry *= t;
    }

    v.par_chunks_mut(chunk)
        .zip(carries.par_iter())
        .skip(1)
        .for_each(|(shard, c)| {
            for x in shard.iter_mut() {
                *x *= c;
            }
        });
}

/// Invert every non-zero entry of `v` (zeros stay zero), one batch per shard.
pub fn batch_invert_in_place(v: &mut [F]) {
    if v.is_empty() {
        return;
    }
    let tasks = (v.len() / INV_MUL_RATIO).clamp(1, rayon::current_num_threads());
    let chunk = shard_len(v.len(), tasks);
    v.par_chunks_mut(chunk).for_each(|shard| batch_inversion(shard));
}
