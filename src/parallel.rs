//! This module provides the work-partition primitive shared by the FFT, the
//! exponent-table builder, and the pointwise passes of the prover.
//!
//! Iterations are split into contiguous ranges whose sizes differ by at most
//! one, so peer workers finish together regardless of where the remainder
//! lands.

/// Splits `nb_iterations` into contiguous half-open ranges for `nb_tasks` workers.
///
/// When there are fewer iterations than workers, each range holds exactly one
/// index. Otherwise the remainder `nb_iterations % nb_tasks` is spread over the
/// first ranges, one extra index each. The union of the returned ranges is
/// `[0, nb_iterations)` and the ranges are pairwise disjoint.
pub fn partition(nb_iterations: usize, nb_tasks: usize) -> Vec<(usize, usize)> {
  if nb_iterations == 0 {
    return Vec::new();
  }

  let nb_tasks = nb_tasks.max(1).min(nb_iterations);
  let base = nb_iterations / nb_tasks;
  let mut extra = nb_iterations % nb_tasks;

  let mut ranges = Vec::with_capacity(nb_tasks);
  let mut start = 0;
  for _ in 0..nb_tasks {
    let mut end = start + base;
    if extra > 0 {
      end += 1;
      extra -= 1;
    }
    ranges.push((start, end));
    start = end;
  }
  ranges
}

/// Runs `work` over contiguous chunks of `v` on at most `nb_tasks` concurrent
/// workers, returning only after every chunk has been processed.
///
/// `work` receives each chunk together with the offset of its first element in
/// `v`, and must not rely on any particular chunk-to-worker assignment.
pub fn parallelize_with<T, F>(nb_tasks: usize, v: &mut [T], work: F)
where
  T: Send,
  F: Fn(&mut [T], usize) + Send + Sync,
{
  let ranges = partition(v.len(), nb_tasks);
  if ranges.len() <= 1 {
    if !v.is_empty() {
      work(v, 0);
    }
    return;
  }

  rayon::scope(|scope| {
    let mut rest = v;
    let mut consumed = 0;
    let work = &work;
    for (start, end) in ranges {
      let (chunk, tail) = std::mem::take(&mut rest).split_at_mut(end - consumed);
      rest = tail;
      consumed = end;
      scope.spawn(move |_| work(chunk, start));
    }
  });
}

/// `parallelize_with` on as many workers as the ambient rayon pool provides.
pub fn parallelize<T, F>(v: &mut [T], work: F)
where
  T: Send,
  F: Fn(&mut [T], usize) + Send + Sync,
{
  parallelize_with(rayon::current_num_threads(), v, work);
}
