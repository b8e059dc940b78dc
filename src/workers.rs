use anyhow::{Context, Result};

/// Resolve the worker-sizing mode to a thread count: `> 0` a fixed count,
/// `-1` every hardware thread, anything else all but one hardware thread.
pub(crate) fn resolve_worker_count(mode: i32) -> usize {
    match mode {
        n if n > 0 => n as usize,
        -1 => num_cpus::get(),
        _ => num_cpus::get().saturating_sub(1).max(1),
    }
}

/// Build a stage-scoped worker pool. Pools are created and dropped per
/// processing stage per region; workers share no mutable state.
pub(crate) fn build_pool(mode: i32) -> Result<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(resolve_worker_count(mode))
        .build()
        .context("Failed to build worker pool")
}
