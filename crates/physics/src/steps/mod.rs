//! Stages of a world sub-step.
//!
//! Parallel stages read shared state and write one result per index into
//! pre-partitioned output ranges; the world applies the results on the owner
//! thread between stages.

pub(crate) mod contact;
pub(crate) mod integration;
pub(crate) mod islands;
pub(crate) mod joint;
pub(crate) mod solver;

use compute::{SpinLock, ThreadPool};

use crate::body::Body;
use crate::types::BodyId;

/// Computes `f(thread_index, index)` for every index in `0..len` and returns
/// the results in index order.
///
/// The output is split into one contiguous range per thread. Each range sits
/// behind its own lock, which only its thread ever takes.
pub(crate) fn parallel_map<T, F>(pool: &ThreadPool, len: usize, f: F) -> Vec<T>
where
    T: Default + Send,
    F: Fn(usize, usize) -> T + Sync,
{
    let mut out: Vec<T> = std::iter::repeat_with(T::default).take(len).collect();
    if len == 0 {
        return out;
    }

    let chunk = len.div_ceil(pool.thread_count());
    let ranges: Vec<SpinLock<(usize, &mut [T])>> = out
        .chunks_mut(chunk)
        .enumerate()
        .map(|(i, values)| SpinLock::new((i * chunk, values)))
        .collect();

    pool.parallel_execute(&|thread_index, _| {
        if let Some(range) = ranges.get(thread_index) {
            let mut range = range.lock();
            let (start, values) = &mut *range;
            for (offset, value) in values.iter_mut().enumerate() {
                *value = f(thread_index, *start + offset);
            }
        }
    });

    drop(ranges);
    out
}

pub(crate) fn lookup(bodies: &[Option<Body>], id: BodyId) -> Option<&Body> {
    bodies.get(id.index()).and_then(Option::as_ref)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn results_keep_index_order() {
        let mut pool = ThreadPool::new("map");
        pool.set_thread_count(4);
        let squares = pool.bracket(|pool| parallel_map(pool, 37, |_, i| i * i));
        assert_eq!(squares, (0..37).map(|i| i * i).collect::<Vec<_>>());
    }

    #[test]
    fn empty_input() {
        let pool = ThreadPool::new("map");
        let out: Vec<u32> = parallel_map(&pool, 0, |_, _| 1);
        assert!(out.is_empty());
    }
}
