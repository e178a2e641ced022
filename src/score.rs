//! The signed-byte score domain and the `bestScore` combination rule shared
//! by the play-phase and drop-phase solvers.

/// A position's score: distance-to-win in plies, a heuristic draw
/// evaluation, or one of the two sentinel values below. See the module
/// documentation of `play_solver` for the full state machine.
pub type Score = i8;

/// A already has four in a winning pattern.
pub const SCORE_A_WIN: Score = 126;
/// B already has four in a winning pattern.
pub const SCORE_B_WIN: Score = -126;
/// Sentinel: no legal successor / scratch marker during retrograde analysis.
/// Never appears in a persisted table (see `db`'s load-time validation).
pub const SCORE_NONE: Score = -127;
/// Sentinel: both sides are simultaneously in a winning pattern.
pub const SCORE_ILLEGAL: Score = -128;
/// A known game-theoretic tie with no heuristic opinion yet.
pub const SCORE_TIE: Score = 0;

/// The edge of the draw band: `-80..=80` are draws (heuristic magnitude),
/// everything outside is a forced win or loss.
pub const DRAW_BAND: Score = 80;

/// The side a score favors, or a terminal/illegal classification.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    AWin,
    BWin,
    Draw,
    Illegal,
}

/// Classifies a persisted score into its outcome and, for forced wins and
/// losses, the distance in plies. Draws (including heuristic draws) have no
/// distance.
///
/// # Panics
/// Panics if given the `SCORE_NONE` sentinel: that value must never survive
/// into a persisted table (invariant 3 of the solver), so seeing it here
/// indicates a programming error upstream, not bad input.
pub fn classify(s: Score) -> (Outcome, Option<u8>) {
    match s {
        SCORE_A_WIN => (Outcome::AWin, Some(0)),
        81..=125 => (Outcome::AWin, Some((SCORE_A_WIN - s) as u8)),
        -DRAW_BAND..=DRAW_BAND => (Outcome::Draw, None),
        -125..=-81 => (Outcome::BWin, Some((s - SCORE_B_WIN) as u8)),
        SCORE_B_WIN => (Outcome::BWin, Some(0)),
        SCORE_ILLEGAL => (Outcome::Illegal, None),
        SCORE_NONE => panic!("SCORE_NONE must never appear in a persisted table"),
        other => unreachable!("score byte {other} outside the documented domain"),
    }
}

/// Combines the scores of a position's legal successors into its own score,
/// from the current side's perspective.
///
/// For each successor score: the `SCORE_NONE` sentinel is treated as a tie;
/// anything else outside `[SCORE_B_WIN, SCORE_A_WIN]` (i.e. `SCORE_ILLEGAL`)
/// is skipped. The remaining scores are negated (successors are from the
/// opponent's perspective) and win/loss magnitudes are decayed by one ply
/// toward zero — the heuristic draw band is never decayed, since it is not
/// a ply count. The maximum survives. With no valid successor, the position
/// is a tie.
pub fn best_score<F>(successors: impl IntoIterator<Item = usize>, score_at: F) -> Score
where
    F: Fn(usize) -> Score,
{
    let mut best: Option<Score> = None;
    for idx in successors {
        let raw = score_at(idx);
        let s = if raw == SCORE_NONE {
            SCORE_TIE
        } else if raw < SCORE_B_WIN || raw > SCORE_A_WIN {
            continue;
        } else {
            raw
        };

        let mut s = -s;
        if s > DRAW_BAND {
            s -= 1;
        } else if s < -DRAW_BAND {
            s += 1;
        }

        best = Some(match best {
            Some(b) if b >= s => b,
            _ => s,
        });
    }
    best.unwrap_or(SCORE_TIE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_successors_is_a_tie() {
        assert_eq!(best_score(std::iter::empty(), |_| SCORE_TIE), SCORE_TIE);
    }

    #[test]
    fn none_sentinel_treated_as_tie() {
        assert_eq!(best_score([0], |_| SCORE_NONE), SCORE_TIE);
    }

    #[test]
    fn illegal_successor_is_skipped() {
        assert_eq!(best_score([0, 1], |i| if i == 0 { SCORE_ILLEGAL } else { 10 }), -10);
    }

    #[test]
    fn win_loss_magnitude_decays_toward_zero() {
        // successor score 100 (a forced win for the mover there) becomes
        // -99 for the side to move here (one ply closer to the loss).
        assert_eq!(best_score([0], |_| 100), -99);
        assert_eq!(best_score([0], |_| -100), 99);
    }

    #[test]
    fn heuristic_band_is_not_decayed() {
        assert_eq!(best_score([0], |_| 50), -50);
        assert_eq!(best_score([0], |_| -50), 50);
    }

    #[test]
    fn takes_the_maximum_successor() {
        // successors score 10, 90, 40 from the mover's perspective; negated
        // and decayed, the least bad for the side to move is -10.
        assert_eq!(best_score([0, 1, 2], |i| [10, 90, 40][i]), -10);
    }

    #[test]
    fn classify_terminal_scores() {
        assert_eq!(classify(SCORE_A_WIN), (Outcome::AWin, Some(0)));
        assert_eq!(classify(SCORE_B_WIN), (Outcome::BWin, Some(0)));
        assert_eq!(classify(SCORE_TIE), (Outcome::Draw, None));
        assert_eq!(classify(SCORE_ILLEGAL), (Outcome::Illegal, None));
    }

    #[test]
    fn classify_mid_wins_and_losses() {
        assert_eq!(classify(100), (Outcome::AWin, Some(26)));
        assert_eq!(classify(-100), (Outcome::BWin, Some(26)));
    }
}
