//! Execution engine: worker pool and chunked fork-join dispatch
//!
//! Every operator call decomposes into independent chunks that disjointly
//! tile the output, dispatched fork-join over a rayon pool owned by the
//! [`Engine`]. There are no process-wide singletons: the pool and its tuning
//! knobs live here and are torn down with the engine.
//!
//! Chained phases (a reduction pass feeding a later pass) are sequential
//! compositions of fork-joins; writers and readers of the same buffer never
//! overlap.

use crate::error::{Error, Result};

/// Tuning knobs for an [`Engine`]
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Worker threads in the engine-owned pool; `None` uses the process-wide
    /// rayon pool
    pub num_threads: Option<usize>,
    /// Minimum output elements per chunk before a dispatch goes parallel
    pub min_parallel_len: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            num_threads: None,
            min_parallel_len: 4096,
        }
    }
}

/// Tensor-execution engine
///
/// Construct one per inference session and call operators on it. All
/// operators are synchronous: the call returns once every chunk of the
/// dispatch has completed.
pub struct Engine {
    #[cfg(feature = "rayon")]
    pool: Option<rayon::ThreadPool>,
    min_parallel_len: usize,
}

impl Engine {
    /// Create an engine from a configuration
    pub fn new(config: EngineConfig) -> Result<Self> {
        #[cfg(feature = "rayon")]
        let pool = match config.num_threads {
            Some(n) => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .build()
                    .map_err(|e| Error::invalid_argument("num_threads", e.to_string()))?,
            ),
            None => None,
        };
        #[cfg(not(feature = "rayon"))]
        let _ = &config.num_threads;

        Ok(Self {
            #[cfg(feature = "rayon")]
            pool,
            min_parallel_len: config.min_parallel_len.max(1),
        })
    }

    /// Minimum output elements per parallel chunk
    #[inline]
    pub(crate) fn min_parallel_len(&self) -> usize {
        self.min_parallel_len
    }

    /// Worker count available to a dispatch
    #[inline]
    pub(crate) fn threads(&self) -> usize {
        #[cfg(feature = "rayon")]
        {
            self.pool
                .as_ref()
                .map(|p| p.current_num_threads())
                .unwrap_or_else(rayon::current_num_threads)
        }
        #[cfg(not(feature = "rayon"))]
        {
            1
        }
    }

    /// Run a closure inside the engine's pool (or inline without one)
    #[cfg(feature = "rayon")]
    pub(crate) fn install<R: Send>(&self, f: impl FnOnce() -> R + Send) -> R {
        match &self.pool {
            Some(pool) => pool.install(f),
            None => f(),
        }
    }

    #[cfg(not(feature = "rayon"))]
    pub(crate) fn install<R>(&self, f: impl FnOnce() -> R) -> R {
        f()
    }

    /// Fork-join over task indices `0..tasks`
    ///
    /// Each task must write a disjoint region of the output; the call blocks
    /// until all tasks complete. `weight` is the per-task output element
    /// count used to decide whether going parallel is worth it.
    pub(crate) fn for_each_task(&self, tasks: usize, weight: usize, f: impl Fn(usize) + Send + Sync) {
        #[cfg(feature = "rayon")]
        {
            if tasks > 1 && tasks * weight >= self.min_parallel_len {
                use rayon::prelude::*;
                self.install(|| (0..tasks).into_par_iter().for_each(|t| f(t)));
                return;
            }
        }
        let _ = weight;
        for t in 0..tasks {
            f(t);
        }
    }

    /// Fork-join over contiguous `(start, len)` ranges tiling `0..total`
    ///
    /// Ranges are multiples of `unit` (the innermost span length) so no chunk
    /// straddles a span boundary.
    pub(crate) fn for_each_range(
        &self,
        total: usize,
        unit: usize,
        f: impl Fn(usize, usize) + Send + Sync,
    ) {
        if total == 0 {
            return;
        }
        let unit = unit.max(1);
        debug_assert_eq!(total % unit, 0);
        let spans = total / unit;

        #[cfg(feature = "rayon")]
        {
            if total >= self.min_parallel_len && spans > 1 {
                let threads = self.threads();
                // At most 4 chunks per thread keeps scheduling overhead low
                // while still balancing uneven chunk costs.
                let chunks = spans.min(threads * 4).max(1);
                let spans_per_chunk = spans.div_ceil(chunks);
                let chunk_len = spans_per_chunk * unit;
                let n_chunks = total.div_ceil(chunk_len);
                self.for_each_task(n_chunks, chunk_len, |c| {
                    let start = c * chunk_len;
                    let len = chunk_len.min(total - start);
                    f(start, len);
                });
                return;
            }
        }
        let _ = spans;
        f(0, total);
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default()).expect("default engine config is valid")
    }
}
