//! Stateless instance selection.

use rand::Rng;

/// Picks which pool instance receives the next slice.
///
/// Implementations must return an index in `[0, pool_size)` for any
/// `pool_size >= 1`.
pub trait InstanceSelector: Send + Sync {
    fn select(&self, pool_size: usize) -> usize;
}

/// Uniform random selection with no affinity and no failure awareness.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomSelector;

impl InstanceSelector for RandomSelector {
    fn select(&self, pool_size: usize) -> usize {
        if pool_size <= 1 {
            return 0;
        }
        rand::thread_rng().gen_range(0..pool_size)
    }
}
