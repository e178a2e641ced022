//! Precomputed bitmask tables describing the 5x5 Teeko board.
//!
//! Squares are numbered `0..25`, row-major, with `0` the top-left corner.
//! A *mask* is a `u32` whose set bits are occupied squares. All move
//! generation and win detection in this crate is expressed as constant-time
//! bit operations over these masks; see `DESIGN.md` for why a set-of-squares
//! representation would not meet the solver's runtime budget.

use std::collections::HashSet;
use std::sync::OnceLock;

use crate::SIZE;

/// One step of movement in any of the 8 compass directions, clipped to the board.
///
/// `NEIGHBORS[s]` is the mask of squares reachable from `s` in a single
/// slide during the play phase. Values are fixed constants derived from the
/// board geometry (not computed at runtime, to keep this table branch-free).
pub const NEIGHBORS: [u32; SIZE] = [
    98, 229, 458, 916, 776, 3139, 7335, 14670, 29340, 24856, 100448, 234720, 469440, 938880,
    795392, 3214336, 7511040, 15022080, 30044160, 25452544, 2195456, 5472256, 10944512, 21889024,
    9175040,
];

/// The 44 winning patterns: 10 horizontal and 10 vertical 4-in-a-rows, 8
/// diagonal 4-in-a-rows, and 16 2x2 sub-squares.
///
/// This is the set form (membership only matters for `is_winning`); order
/// is not significant. Values are fixed constants taken from the board
/// geometry.
pub const WINNING_MASKS: [u32; 44] = [
    99, 198, 396, 792, 3168, 6336, 12672, 25344, 101376, 202752, 405504, 811008, 3244032, 6488064,
    12976128, 25952256, 15, 30, 480, 960, 15360, 30720, 491520, 983040, 15728640, 31457280, 33825,
    67650, 135300, 270600, 541200, 1082400, 2164800, 4329600, 8659200, 17318400, 266305, 532610,
    8521760, 17043520, 34952, 69904, 1118464, 2236928,
];

static WINNING_SET: OnceLock<HashSet<u32>> = OnceLock::new();

/// Returns `true` if `mask` is exactly one of the 44 winning patterns.
///
/// Backed by a `HashSet` built once on first use, giving O(1) win tests in
/// the hot retrograde loops of `play_solver`/`drop_solver`.
pub fn is_winning(mask: u32) -> bool {
    WINNING_SET
        .get_or_init(|| WINNING_MASKS.iter().copied().collect())
        .contains(&mask)
}

/// The four corner squares: `0, 4, 20, 24`.
pub const CORNERS_MASK: u32 = bit(0) | bit(4) | bit(20) | bit(24);

/// The 12 non-corner border squares.
pub const EDGES_MASK: u32 =
    bit(1) | bit(2) | bit(3) | bit(21) | bit(22) | bit(23) | bit(5) | bit(10) | bit(15) | bit(9) | bit(14) | bit(19);

/// The 4 corners of the central 3x3 region: `6, 8, 16, 18`.
pub const INNER_CORNERS_MASK: u32 = bit(6) | bit(8) | bit(16) | bit(18);

/// The 4 edge squares of the central 3x3 region: `7, 11, 13, 17`.
pub const INNER_EDGES_MASK: u32 = bit(7) | bit(11) | bit(13) | bit(17);

/// The single center square: `12`.
pub const CENTER_MASK: u32 = bit(12);

/// The five mutually disjoint priority masks, ordered corners, edges,
/// inner-corners, inner-edges, center. Used only by the heuristic evaluator
/// (`heuristic.rs`) for move ordering.
pub const PRIORITY_MASKS: [u32; 5] = [
    CORNERS_MASK,
    EDGES_MASK,
    INNER_CORNERS_MASK,
    INNER_EDGES_MASK,
    CENTER_MASK,
];

/// The central 3x3 region of the board, used by the heuristic evaluator to
/// reward central control.
pub const CENTRAL_MASK: u32 = INNER_CORNERS_MASK | INNER_EDGES_MASK | CENTER_MASK;

const fn bit(square: usize) -> u32 {
    1 << square
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_masks_partition_the_board() {
        let union = PRIORITY_MASKS.iter().fold(0u32, |acc, m| acc | m);
        assert_eq!(union, (1u32 << SIZE) - 1);

        let mut seen = 0u32;
        for &mask in &PRIORITY_MASKS {
            assert_eq!(mask & seen, 0, "priority masks must be disjoint");
            seen |= mask;
        }
    }

    #[test]
    fn central_mask_is_the_inner_3x3() {
        let expected: u32 = [6, 7, 8, 11, 12, 13, 16, 17, 18]
            .iter()
            .fold(0u32, |acc, &s| acc | bit(s));
        assert_eq!(CENTRAL_MASK, expected);
    }

    #[test]
    fn winning_masks_has_44_entries() {
        assert_eq!(WINNING_MASKS.len(), 44);
    }

    #[test]
    fn known_row_is_winning() {
        // top row, squares 0..4
        assert!(is_winning(0b11111));
    }

    #[test]
    fn neighbors_of_top_left_corner() {
        // square 0 neighbors: 1 (right), 5 (down), 6 (down-right)
        assert_eq!(NEIGHBORS[0], bit(1) | bit(5) | bit(6));
    }
}
