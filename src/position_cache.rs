//! The position cache: `g -> (A, B)` arrays built once per layer, in
//! parallel, and then indexed directly by every later solver pass.

use rayon::prelude::*;

use crate::goedel::{degoedel, CONFIGS};

/// A `g -> (A, B)` lookup table for one piece-count layer.
///
/// Built by partitioning `0..configs[n]` into equal chunks across the
/// `rayon` global thread pool; each worker decodes its own range with
/// `degoedel` and writes into its own disjoint slice, so no synchronization
/// is needed beyond the final join.
pub struct PositionCache {
    pub n: u8,
    positions: Vec<(u32, u32)>,
}

impl PositionCache {
    /// Builds the cache for layer `n`.
    pub fn build(n: u8) -> Self {
        let len = CONFIGS[n as usize];
        let mut positions = vec![(0u32, 0u32); len];
        positions
            .par_iter_mut()
            .enumerate()
            .for_each(|(g, slot)| {
                *slot = degoedel(g, n);
            });
        Self { n, positions }
    }

    /// The number of positions in this layer.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Looks up `(A, B)` for Gödel index `g`.
    #[inline]
    pub fn get(&self, g: usize) -> (u32, u32) {
        self.positions[g]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::goedel::goedel;

    #[test]
    fn cache_matches_degoedel_directly() {
        let cache = PositionCache::build(4);
        for g in (0..cache.len()).step_by(37) {
            assert_eq!(cache.get(g), degoedel(g, 4));
        }
    }

    #[test]
    fn cache_round_trips_through_goedel() {
        let cache = PositionCache::build(3);
        for g in 0..cache.len() {
            let (a, b) = cache.get(g);
            assert_eq!(goedel(a, b, 3), g);
        }
    }
}
