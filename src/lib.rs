//! The complete game-theoretic solution to Teeko.
//!
//! This crate computes and serves a strong solution for Teeko, a two-player
//! abstract strategy game played on a 5x5 board. Each player owns four
//! pieces. Play has two phases: a **drop** phase, where players alternately
//! place a piece until each has four on the board, and a **play** phase,
//! where players alternately slide a piece to an adjacent empty square. A
//! player wins by arranging their four pieces into one of 44 winning
//! patterns.
//!
//! # Basic Usage
//!
//! ```
//! use teeko_core::db::Database;
//! use teeko_core::goedel::CONFIGS;
//! use teeko_core::lookup::{lookup, Turn};
//! use teeko_core::score::SCORE_TIE;
//!
//! let tables = (0..9u8).map(|n| vec![SCORE_TIE; CONFIGS[n as usize]]).collect();
//! let db = Database::from_tables(tables);
//!
//! let result = lookup(&db, 0, 0, Turn::A).unwrap();
//! assert_eq!(result.pieces, 0);
//! assert_eq!(result.moves.len(), 25);
//! ```

use static_assertions::*;
pub use anyhow;

pub mod board;
pub mod db;
pub mod drop_solver;
pub mod goedel;
pub mod heuristic;
pub mod lookup;
pub mod play_solver;
pub mod position_cache;
pub mod score;
pub mod symmetry;

/// The side length of the Teeko board.
pub const EDGE: usize = 5;

/// The number of squares on the board.
pub const SIZE: usize = EDGE * EDGE;

/// The number of pieces each player owns.
pub const PIECES_PER_SIDE: usize = 4;

/// The highest piece count layer (both players fully dropped).
pub const MAX_PIECES: usize = 2 * PIECES_PER_SIDE;

// ensure the board fits comfortably inside the 32-bit masks used throughout the crate
const_assert!(SIZE < 32);
