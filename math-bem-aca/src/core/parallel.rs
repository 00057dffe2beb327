//! Portable parallel iteration abstractions
//!
//! - `native` feature: uses rayon, optionally inside a dedicated pool sized
//!   from [`ParallelizationOptions`]
//! - otherwise: falls back to sequential iteration
//!
//! ## Usage
//!
//! ```ignore
//! use crate::core::parallel::*;
//!
//! let blocks = with_thread_pool(&options.parallelization, || {
//!     parallel_map(&leaves, |leaf| assemble(leaf))
//! })?;
//! ```

use crate::core::config::{ParallelizationOptions, ThreadCount};
use crate::core::error::{AssemblyError, Result};

/// Parallel map over a slice
#[cfg(feature = "native")]
pub fn parallel_map<T, U, F>(data: &[T], f: F) -> Vec<U>
where
    T: Sync,
    U: Send,
    F: Fn(&T) -> U + Sync + Send,
{
    use rayon::prelude::*;
    data.par_iter().map(f).collect()
}

/// Sequential map (fallback when parallel is not available)
#[cfg(not(feature = "native"))]
pub fn parallel_map<T, U, F>(data: &[T], f: F) -> Vec<U>
where
    F: Fn(&T) -> U,
{
    data.iter().map(f).collect()
}

/// Fallible parallel map; the first error aborts the whole map
pub fn try_parallel_map<T, U, F>(data: &[T], f: F) -> Result<Vec<U>>
where
    T: Sync,
    U: Send,
    F: Fn(&T) -> Result<U> + Sync + Send,
{
    parallel_map(data, f).into_iter().collect()
}

/// Run `f` with at most the configured number of worker threads.
///
/// `Auto` uses the global rayon pool; a fixed count installs a dedicated pool
/// for the duration of the call. Without the `native` feature `f` simply runs
/// on the calling thread.
#[cfg(feature = "native")]
pub fn with_thread_pool<R, F>(options: &ParallelizationOptions, f: F) -> Result<R>
where
    R: Send,
    F: FnOnce() -> R + Send,
{
    match options.max_thread_count {
        ThreadCount::Auto => Ok(f()),
        ThreadCount::Fixed(0) => Err(AssemblyError::InvalidConfiguration(
            "thread count must be positive or auto".to_string(),
        )),
        ThreadCount::Fixed(n) => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(n)
                .build()
                .map_err(|e| {
                    AssemblyError::InvalidConfiguration(format!(
                        "cannot create a pool of {n} threads: {e}"
                    ))
                })?;
            Ok(pool.install(f))
        }
    }
}

/// Run `f` on the calling thread (fallback)
#[cfg(not(feature = "native"))]
pub fn with_thread_pool<R, F>(options: &ParallelizationOptions, f: F) -> Result<R>
where
    R: Send,
    F: FnOnce() -> R + Send,
{
    if options.max_thread_count == ThreadCount::Fixed(0) {
        return Err(AssemblyError::InvalidConfiguration(
            "thread count must be positive or auto".to_string(),
        ));
    }
    Ok(f())
}
