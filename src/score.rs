/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::fmt;

use crate::{TerminalReason, MAX_PLY};

/// A numerical representation of the evaluation of a position / move, in units of ["centipawns"](https://www.chessprogramming.org/Score).
///
/// Scores are always relative to the side to move.
/// This value is internally capped at [`Self::INF`], and every heuristic (non-mate) score
/// lies strictly between [`-Self::MAX_EVAL`](Self::MAX_EVAL) and [`Self::MAX_EVAL`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct Score(pub i32);

impl Score {
    /// Largest possible score ever achievable.
    ///
    /// Only used as a search window bound; no position ever evaluates to this.
    pub const INF: Self = Self(i16::MAX as i32);

    /// Score of the side to move having mated its opponent in the current position.
    ///
    /// `-Score::MATE` is therefore the score of a position where the side to move is checkmated.
    pub const MATE: Self = Self(Self::INF.0 - 1);

    /// Score of a draw.
    pub const DRAW: Self = Self(0);

    /// Lowest possible score for mate.
    ///
    /// This is only obtainable if mate is found [`MAX_PLY`] plies from the root.
    pub const LOWEST_MATE: Self = Self(Self::MATE.0 - MAX_PLY as i32);

    /// Largest score the static evaluator may ever produce.
    pub const MAX_EVAL: Self = Self(Self::LOWEST_MATE.0 - 1);

    /// Score of a terminal position found `ply` plies away from the root of a search.
    ///
    /// Mates are offset by `ply` so that faster mates are preferred.
    #[inline(always)]
    pub const fn terminal(reason: TerminalReason, ply: i32) -> Self {
        match reason {
            TerminalReason::Checkmate => Self(ply - Self::MATE.0),
            _ => Self::DRAW,
        }
    }

    /// Returns `true` if the score is a mate score.
    #[inline(always)]
    pub const fn is_mate(&self) -> bool {
        self.0.abs() >= Self::LOWEST_MATE.0
    }

    /// Returns the number of plies (half moves) this score is from mate.
    #[inline(always)]
    pub const fn plies_to_mate(&self) -> i32 {
        Self::MATE.0 - self.0.abs()
    }

    /// Returns the number of moves (full moves) this score is from mate.
    ///
    /// Positive if the side to move is mating, negative if it is being mated.
    #[inline(always)]
    pub const fn moves_to_mate(&self) -> i32 {
        let plies = self.plies_to_mate();

        // The mating side has to play the mating move itself, hence the `+ 1`
        let relative_to_side = if self.0 > 0 { plies + 1 } else { -plies };

        relative_to_side / 2
    }

    /// Normalize the score to the provided ply.
    ///
    /// The input is relative to the root of the search; the output is relative to a node `ply` plies deep.
    #[inline(always)]
    pub const fn relative(self, ply: i32) -> Self {
        if !self.is_mate() {
            self
        } else if self.0 > 0 {
            Self(self.0 + ply)
        } else {
            Self(self.0 - ply)
        }
    }

    /// De-normalize the score from the provided ply.
    ///
    /// Inverse of [`Score::relative`]: the output is relative to the root (0 ply).
    #[inline(always)]
    pub const fn absolute(self, ply: i32) -> Self {
        if !self.is_mate() {
            self
        } else if self.0 > 0 {
            Self(self.0 - ply)
        } else {
            Self(self.0 + ply)
        }
    }

    /// Clamps a heuristic score so that it can never be mistaken for a mate score.
    #[inline(always)]
    pub const fn clamp_eval(self) -> Self {
        if self.0 > Self::MAX_EVAL.0 {
            Self::MAX_EVAL
        } else if self.0 < -Self::MAX_EVAL.0 {
            Self(-Self::MAX_EVAL.0)
        } else {
            self
        }
    }
}

macro_rules! impl_binary_op {
    ($trait:tt, $fn:ident) => {
        impl std::ops::$trait for Score {
            type Output = Self;

            #[inline(always)]
            fn $fn(self, rhs: Self) -> Self::Output {
                Self(self.0.$fn(rhs.0))
            }
        }

        impl std::ops::$trait<i32> for Score {
            type Output = Self;

            #[inline(always)]
            fn $fn(self, rhs: i32) -> Self::Output {
                Self(self.0.$fn(rhs))
            }
        }
    };
}

macro_rules! impl_binary_op_assign {
    ($trait:tt, $fn:ident) => {
        impl std::ops::$trait for Score {
            #[inline(always)]
            fn $fn(&mut self, rhs: Self) {
                self.0.$fn(rhs.0);
            }
        }

        impl std::ops::$trait<i32> for Score {
            #[inline(always)]
            fn $fn(&mut self, rhs: i32) {
                self.0.$fn(rhs);
            }
        }
    };
}

impl_binary_op!(Add, add);
impl_binary_op!(Sub, sub);

impl_binary_op_assign!(AddAssign, add_assign);
impl_binary_op_assign!(SubAssign, sub_assign);

impl std::ops::Neg for Score {
    type Output = Self;

    #[inline(always)]
    fn neg(self) -> Self::Output {
        Self(self.0.neg())
    }
}

impl fmt::Display for Score {
    /// Scores print like UCI scores: `cp 35` or `mate -2`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_mate() {
            write!(f, "mate {}", self.moves_to_mate())
        } else {
            write!(f, "cp {}", self.0)
        }
    }
}

impl fmt::Debug for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_mate() {
            write!(
                f,
                "{} (mate in {} plies {} moves)",
                self.0,
                self.plies_to_mate(),
                self.moves_to_mate()
            )
        } else {
            write!(f, "{}", self.0)
        }
    }
}
