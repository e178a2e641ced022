//! The drop-phase solver (C6): backward induction over the eight layers
//! `n = 0..=7`, each keyed off the next-highest layer's already-solved
//! table. Unlike the play phase, the drop phase has no cycles — a drop
//! only ever increases the piece count — so each layer is a single
//! `rayon` pass over `bestScore`, no retrograde loop required.

use log::debug;
use rayon::prelude::*;

use crate::board::is_winning;
use crate::goedel::goedel;
use crate::position_cache::PositionCache;
use crate::score::{best_score, Score, SCORE_B_WIN, SCORE_TIE};
use crate::SIZE;

/// Solves every drop-phase layer given the already-solved play-phase table
/// (layer 8). Returns all nine layers, index `n` holding layer `n`'s table;
/// index 8 is `play_table` unchanged.
pub fn solve_drop_phase(play_table: Vec<Score>) -> Vec<Vec<Score>> {
    let mut tables: Vec<Vec<Score>> = vec![Vec::new(); 9];
    tables[8] = play_table;

    // Layer 7: one side has already dropped all four pieces, so only a B
    // win is possible before A's last drop; everything else propagates
    // from the play-phase table.
    let cache7 = PositionCache::build(7);
    let mut table7 = vec![SCORE_TIE; cache7.len()];
    table7.par_iter_mut().enumerate().for_each(|(g, slot)| {
        let (_, b) = cache7.get(g);
        if is_winning(b) {
            *slot = SCORE_B_WIN;
        }
    });
    propagate(&cache7, &mut table7, &tables[8]);
    debug!("drop-phase layer 7 solved ({} positions)", table7.len());
    tables[7] = table7;

    for n in (0u8..=6).rev() {
        let cache = PositionCache::build(n);
        let mut table = vec![SCORE_TIE; cache.len()];
        propagate(&cache, &mut table, &tables[n as usize + 1]);
        debug!("drop-phase layer {n} solved ({} positions)", table.len());
        tables[n as usize] = table;
    }

    tables
}

/// Fills in every position in `current` that isn't already a detected win,
/// by combining its drop successors' scores (read from `next`, the
/// already-solved layer `n + 1` table) via `bestScore`.
fn propagate(cache: &PositionCache, current: &mut [Score], next: &[Score]) {
    let n = cache.n;
    current.par_iter_mut().enumerate().for_each(|(g, slot)| {
        if *slot != SCORE_TIE {
            return; // preserve a win detected by the caller
        }
        let (a, b) = cache.get(g);
        let ab = a | b;

        let mut successors = Vec::new();
        for square in 0..SIZE {
            let bit = 1u32 << square;
            if ab & bit == 0 {
                successors.push(goedel(b, a | bit, n + 1));
            }
        }
        *slot = best_score(successors, |idx| next[idx]);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::goedel::CONFIGS;

    #[test]
    fn layer_seven_detects_immediate_b_wins() {
        let cache = PositionCache::build(7);
        let mut found_one = false;
        for g in 0..cache.len() {
            let (_, b) = cache.get(g);
            if is_winning(b) {
                found_one = true;
                break;
            }
        }
        assert!(found_one, "layer 7 should contain at least one winning B mask");
    }

    #[test]
    fn propagate_matches_hand_solved_two_layer_case() {
        // Every layer-1 position scores 100 (an A forced win 26 plies out);
        // regardless of which of the 25 squares the empty board's single
        // drop lands on, every successor sees the same next-layer score, so
        // the propagated value is exactly that score negated and decayed by
        // one ply: -100 -> -99.
        let next_cache = PositionCache::build(1);
        let next = vec![100; next_cache.len()];

        let cache = PositionCache::build(0);
        let mut current = vec![SCORE_TIE; cache.len()];
        propagate(&cache, &mut current, &next);

        assert_eq!(cache.len(), 1);
        assert_eq!(current[0], -99);
    }

    #[test]
    fn preserves_preset_wins() {
        let cache = PositionCache::build(7);
        let mut table = vec![SCORE_TIE; cache.len()];
        table[0] = SCORE_B_WIN;
        propagate(&cache, &mut table, &vec![SCORE_TIE; CONFIGS[8]]);
        assert_eq!(table[0], SCORE_B_WIN);
    }
}
