/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! An endgame search engine, built on [`chessie`] for the rules of chess.
//!
//! The search core only talks to the rules through the [`Rules`] trait, so it can be driven by
//! anything that can enumerate and apply moves.

/// Command-line interface.
mod cli;

/// The engine instance that owns an evaluator and its transposition table.
mod engine;

/// Errors raised by the search core.
mod error;

/// Evaluation of chess positions.
mod eval;

/// AI-vs-AI matches between search configurations.
mod experiment;

/// Move ordering.
mod ordering;

/// Chess positions with game history, implementing [`Rules`] through `chessie`.
mod position;

/// The interface between the search and the rules of the game it plays.
mod rules;

/// Centipawn and mate scores.
mod score;

/// Main engine logic; all search related code.
mod search;

/// Transposition table.
mod ttable;

/// Misc utility functions, constants, and types.
mod utils;

pub use chessie::{Color, PieceKind};
pub use cli::*;
pub use engine::*;
pub use error::*;
pub use eval::*;
pub use experiment::*;
pub use ordering::*;
pub use position::*;
pub use rules::*;
pub use score::*;
pub use search::*;
pub use ttable::*;
pub use utils::*;
