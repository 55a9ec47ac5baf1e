// rayon thread pool behind the per-pixel merge kernels

/// Size the global rayon pool used by image merges. Only the first call in a
/// process takes effect; later calls report the pool that already exists.
pub fn init_merge_pool(threads: Option<usize>) -> usize {
    let n = threads.unwrap_or_else(num_cpus::get).max(1);
    rayon::ThreadPoolBuilder::new()
        .num_threads(n)
        .build_global()
        .ok();
    rayon::current_num_threads()
}
