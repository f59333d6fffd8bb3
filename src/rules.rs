/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{fmt, hash::Hash, str::FromStr};

use anyhow::bail;
use chessie::{Color, PieceKind};

use crate::{OracleError, SearchError};

/// Why a position has no further play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerminalReason {
    /// The side to move is in check and has no legal moves.
    Checkmate,

    /// The side to move is not in check and has no legal moves.
    Stalemate,

    /// Neither side can possibly deliver mate.
    InsufficientMaterial,

    /// The same position has occurred three times in the game's history.
    ThreefoldRepetition,

    /// One hundred plies have passed without a capture or a pawn move.
    FiftyMoveRule,
}

impl TerminalReason {
    /// All reasons, in the order they are reported in experiment summaries.
    pub const ALL: [Self; 5] = [
        Self::Checkmate,
        Self::Stalemate,
        Self::InsufficientMaterial,
        Self::ThreefoldRepetition,
        Self::FiftyMoveRule,
    ];

    /// Returns `true` if this reason ends the game in a draw.
    #[inline(always)]
    pub const fn is_draw(&self) -> bool {
        !matches!(self, Self::Checkmate)
    }

    /// A short, machine-friendly name for this reason.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Checkmate => "checkmate",
            Self::Stalemate => "stalemate",
            Self::InsufficientMaterial => "insufficient_material",
            Self::ThreefoldRepetition => "threefold",
            Self::FiftyMoveRule => "fifty_move",
        }
    }
}

impl fmt::Display for TerminalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for TerminalReason {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match Self::ALL.into_iter().find(|reason| reason.name() == s) {
            Some(reason) => Ok(reason),
            None => bail!("unknown terminal reason {s:?}"),
        }
    }
}

/// What a move does, as far as move ordering is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MoveClass {
    /// The move leaves the opponent in check.
    pub gives_check: bool,

    /// Kind of the piece removed from the board by this move, if any.
    pub captured: Option<PieceKind>,

    /// Kind of the piece a pawn promotes to, if this is a promotion.
    pub promotion: Option<PieceKind>,
}

impl MoveClass {
    /// A move that neither checks, captures, nor promotes.
    pub const QUIET: Self = Self {
        gives_check: false,
        captured: None,
        promotion: None,
    };

    /// Returns `true` if this move removes a piece from the board.
    #[inline(always)]
    pub const fn is_capture(&self) -> bool {
        self.captured.is_some()
    }
}

/// The legality oracle.
///
/// Everything the search knows about the rules of the game comes through this trait.
/// Implementors are immutable values: [`Rules::apply`] returns a new position and leaves `self` untouched.
pub trait Rules: Clone {
    /// A legal transition from one position to another.
    type Move: Copy + Eq + Hash + fmt::Debug + fmt::Display;

    /// Identity of a position, used to key the transposition table.
    type Key: Copy + Eq + Hash + fmt::Debug;

    /// Checks that this is a position the search can start from.
    fn validate(&self) -> Result<(), SearchError>;

    /// All legal moves in this position, in the oracle's enumeration order.
    fn legal_moves(&self) -> Result<Vec<Self::Move>, OracleError>;

    /// The position reached by playing `mv`.
    fn apply(&self, mv: Self::Move) -> Result<Self, OracleError>;

    /// Why this position has no further play, or `None` if play continues.
    fn terminal(&self) -> Result<Option<TerminalReason>, OracleError>;

    /// The side whose turn it is.
    fn side_to_move(&self) -> Color;

    /// Identity of this position for caching purposes.
    fn key(&self) -> Self::Key;

    /// Classifies `mv` for move ordering.
    fn classify(&self, mv: Self::Move) -> Result<MoveClass, OracleError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_names_round_trip() {
        for reason in TerminalReason::ALL {
            assert_eq!(reason.name().parse::<TerminalReason>().unwrap(), reason);
        }
        assert!("resignation".parse::<TerminalReason>().is_err());
    }

    #[test]
    fn test_only_checkmate_is_decisive() {
        assert!(!TerminalReason::Checkmate.is_draw());
        assert!(TerminalReason::Stalemate.is_draw());
        assert!(TerminalReason::ThreefoldRepetition.is_draw());
    }
}
