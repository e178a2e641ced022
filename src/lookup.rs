//! The public lookup API (§6.2): a pure function from a validated position
//! to its score and every successor move's score. No I/O, no JSON — those
//! belong to the CLI's `serve` collaborator.
//!
//! Grounded on the reference solver's `handler`: the same turn-detection,
//! move-generation, and outcome-classification logic, split out of the HTTP
//! transport so it can be called directly and unit tested.

use std::fmt;

use crate::board::NEIGHBORS;
use crate::db::Database;
use crate::score::{classify, Outcome, Score};
use crate::{MAX_PIECES, SIZE};

/// Rejects a lookup before it ever touches a score table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupError {
    SquareOutOfRange(u32),
    OverlappingMasks,
    TooManyPieces { side: char, count: u32 },
    InconsistentCounts { a_count: u32, b_count: u32 },
}

impl fmt::Display for LookupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupError::SquareOutOfRange(sq) => write!(f, "invalid square: {sq}"),
            LookupError::OverlappingMasks => write!(f, "overlapping pieces"),
            LookupError::TooManyPieces { side, count } => {
                write!(f, "too many pieces for {side}: {count}")
            }
            LookupError::InconsistentCounts { a_count, b_count } => write!(
                f,
                "invalid counts: A={a_count}, B={b_count}"
            ),
        }
    }
}

impl std::error::Error for LookupError {}

/// Which side is queried to move when the position is ambiguous: at
/// `n == 8`, both an A-to-move and a B-to-move reading are legal Teeko
/// positions (whoever just slid leaves an identical board either way).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Turn {
    A,
    B,
}

/// One legal move out of the queried position, with its resulting score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveScore {
    /// Source square, only present for play-phase (slide) moves.
    pub from: Option<u32>,
    pub to: u32,
    pub score: Score,
    pub outcome: Outcome,
    pub distance: Option<u8>,
}

/// The result of a lookup: the position's own score plus every legal move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lookup {
    pub turn: Turn,
    pub phase: Phase,
    pub pieces: u8,
    pub score: Score,
    pub outcome: Outcome,
    pub distance: Option<u8>,
    pub moves: Vec<MoveScore>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Drop,
    Play,
}

/// Validates and looks up a position.
///
/// `turn` disambiguates the side to move at `n == 8` (both readings are
/// legal there); it is ignored at every other piece count, where the side
/// to move is implicit in the drop-alternation parity.
pub fn lookup(db: &Database, a: u32, b: u32, turn_hint: Turn) -> Result<Lookup, LookupError> {
    validate(a, b)?;

    let a_count = a.count_ones();
    let b_count = b.count_ones();
    let n = (a_count + b_count) as u8;
    let phase = if n < MAX_PIECES as u8 { Phase::Drop } else { Phase::Play };

    let a_to_move = if n == MAX_PIECES as u8 {
        turn_hint != Turn::B
    } else {
        n % 2 == 0
    };

    let (mover, other) = if a_to_move { (a, b) } else { (b, a) };
    let score = db.score(mover, other, n);
    let (outcome, distance) = classify(score);

    let moves = if phase == Phase::Play {
        play_moves(db, mover, other)
    } else {
        drop_moves(db, mover, other, n)
    };

    Ok(Lookup {
        turn: if a_to_move { Turn::A } else { Turn::B },
        phase,
        pieces: n,
        score,
        outcome,
        distance,
        moves,
    })
}

fn validate(a: u32, b: u32) -> Result<(), LookupError> {
    if a >> SIZE != 0 {
        return Err(LookupError::SquareOutOfRange(highest_bit(a)));
    }
    if b >> SIZE != 0 {
        return Err(LookupError::SquareOutOfRange(highest_bit(b)));
    }
    if a & b != 0 {
        return Err(LookupError::OverlappingMasks);
    }
    let a_count = a.count_ones();
    let b_count = b.count_ones();
    if a_count > MAX_PIECES as u32 / 2 {
        return Err(LookupError::TooManyPieces { side: 'a', count: a_count });
    }
    if b_count > MAX_PIECES as u32 / 2 {
        return Err(LookupError::TooManyPieces { side: 'b', count: b_count });
    }
    if a_count < b_count || a_count - b_count > 1 {
        return Err(LookupError::InconsistentCounts { a_count, b_count });
    }
    Ok(())
}

fn highest_bit(mask: u32) -> u32 {
    31 - mask.leading_zeros()
}

fn play_moves(db: &Database, mover: u32, other: u32) -> Vec<MoveScore> {
    let ab = mover | other;
    let mut moves = Vec::new();
    let mut pieces = mover;
    while pieces != 0 {
        let piece = pieces & pieces.wrapping_neg();
        pieces ^= piece;
        let from = piece.trailing_zeros();
        let new_mover = mover ^ piece;

        let mut dests = NEIGHBORS[from as usize] & !ab;
        while dests != 0 {
            let dest = dests & dests.wrapping_neg();
            dests ^= dest;
            let raw = db.score(other, new_mover | dest, 8);
            let s = raw.wrapping_neg();
            let (outcome, distance) = classify(s);
            moves.push(MoveScore { from: Some(from), to: dest.trailing_zeros(), score: s, outcome, distance });
        }
    }
    moves
}

fn drop_moves(db: &Database, mover: u32, other: u32, n: u8) -> Vec<MoveScore> {
    let ab = mover | other;
    let mut moves = Vec::new();
    for square in 0..SIZE as u32 {
        let bit = 1u32 << square;
        if ab & bit != 0 {
            continue;
        }
        let raw = db.score(other, mover | bit, n + 1);
        let s = raw.wrapping_neg();
        let (outcome, distance) = classify(s);
        moves.push(MoveScore { from: None, to: square, score: s, outcome, distance });
    }
    moves
}
