//! Per-vertex pass sharding
//!
//! Vertex passes have no cross-vertex dependency. Above a vertex-count
//! threshold they run on the rayon pool; below it they stay on the calling
//! thread.

use rayon::prelude::*;

/// Default minimum vertex count for sharding
pub const DEFAULT_PARALLEL_VERTEX_THRESHOLD: usize = 4096;

/// When to run a per-vertex pass in parallel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParallelPolicy {
    pub enabled: bool,
    pub min_vertices: usize,
}

impl Default for ParallelPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            min_vertices: DEFAULT_PARALLEL_VERTEX_THRESHOLD,
        }
    }
}

impl ParallelPolicy {
    /// Always run on the calling thread
    pub const fn serial() -> Self {
        Self {
            enabled: false,
            min_vertices: usize::MAX,
        }
    }

    #[inline]
    pub fn use_parallel(&self, vertex_count: usize) -> bool {
        self.enabled && vertex_count >= self.min_vertices
    }

    /// Run `f(index, item)` over every element.
    pub fn for_each_indexed<T, F>(&self, items: &mut [T], f: F)
    where
        T: Send,
        F: Fn(usize, &mut T) + Sync + Send,
    {
        if self.use_parallel(items.len()) {
            items
                .par_iter_mut()
                .enumerate()
                .for_each(|(i, item)| f(i, item));
        } else {
            items.iter_mut().enumerate().for_each(|(i, item)| f(i, item));
        }
    }

    /// Fallible variant of [`Self::for_each_indexed`].
    ///
    /// Stops at the first failure on the serial path. On the parallel path
    /// some failure is returned, not necessarily the lowest-indexed one.
    pub fn try_for_each_indexed<T, E, F>(&self, items: &mut [T], f: F) -> Result<(), E>
    where
        T: Send,
        E: Send,
        F: Fn(usize, &mut T) -> Result<(), E> + Sync + Send,
    {
        if self.use_parallel(items.len()) {
            items
                .par_iter_mut()
                .enumerate()
                .try_for_each(|(i, item)| f(i, item))
        } else {
            items
                .iter_mut()
                .enumerate()
                .try_for_each(|(i, item)| f(i, item))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold() {
        let policy = ParallelPolicy {
            enabled: true,
            min_vertices: 100,
        };
        assert!(!policy.use_parallel(99));
        assert!(policy.use_parallel(100));
        assert!(!ParallelPolicy::serial().use_parallel(usize::MAX));
    }

    #[test]
    fn test_parallel_and_serial_agree() {
        let parallel = ParallelPolicy {
            enabled: true,
            min_vertices: 1,
        };
        let mut a = vec![0usize; 10_000];
        let mut b = a.clone();
        parallel.for_each_indexed(&mut a, |i, v| *v = i * 3);
        ParallelPolicy::serial().for_each_indexed(&mut b, |i, v| *v = i * 3);
        assert_eq!(a, b);
    }

    #[test]
    fn test_try_for_each_reports_failure() {
        let policy = ParallelPolicy {
            enabled: true,
            min_vertices: 1,
        };
        let mut items = vec![0u32; 5000];
        let result = policy.try_for_each_indexed(&mut items, |i, _| {
            if i == 4321 { Err(i) } else { Ok(()) }
        });
        assert_eq!(result, Err(4321));
    }
}
