use rayon::prelude::*;

/// Evaluate `op` at every index in `0..n` across the thread pool,
/// collecting the results in index order.
///
/// `op` must not rely on evaluation order; each call writes only its
/// own slot.
pub fn parallel_map<T: Send>(n: usize, op: impl Fn(usize) -> T + Send + Sync) -> Vec<T> {
    (0..n).into_par_iter().map(op).collect()
}
