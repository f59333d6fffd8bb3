/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::fmt;

use chessie::{compute_attacks_by, Board, Color, File, PieceKind, Rank, Square};

use crate::{Position, Rules, Score, SearchError};

/// Initial material value of all pieces in a standard setup.
const INITIAL_MATERIAL_VALUE: i32 = value_of(PieceKind::Pawn) * 16
    + value_of(PieceKind::Knight) * 4
    + value_of(PieceKind::Bishop) * 4
    + value_of(PieceKind::Rook) * 4
    + value_of(PieceKind::Queen) * 2;

/// Penalty per centre-distance step of a king, at full endgame weight.
const KING_CENTER_WEIGHT: i32 = 30;

/// Bonus per step the defending king is pushed toward the edge.
const EDGE_PRESSURE_WEIGHT: i32 = 40;

/// Bonus per step the stronger king is closer to the weaker king.
const KING_PROXIMITY_WEIGHT: i32 = 20;

/// Bonus per rank a pawn has advanced beyond its starting rank.
const PAWN_ADVANCE_WEIGHT: i32 = 10;

/// Bonus for a pawn with no enemy pawns ahead of it on its own or adjacent files.
const PASSED_PAWN_BONUS: i32 = 50;

/// Penalty for every pawn beyond the first on a single file.
const DOUBLED_PAWN_PENALTY: i32 = 20;

/// Penalty for a pawn with no friendly pawns on adjacent files.
const ISOLATED_PAWN_PENALTY: i32 = 30;

/// Bonus per square attacked.
const MOBILITY_WEIGHT: i32 = 5;

/// Material lead needed before the mop-up terms apply.
const MOP_UP_MARGIN: i32 = 200;

/// Scores positions for the search.
///
/// Every score is relative to the side to move: positive is good for whoever is about to play.
pub trait Evaluate<P: Rules> {
    /// Static score of a non-terminal position.
    fn heuristic(&self, position: &P) -> Score;

    /// Score of `position` from the side to move's perspective.
    ///
    /// A checkmated side to move scores [`-Score::MATE`](Score::MATE) and every draw scores [`Score::DRAW`].
    /// Heuristic scores are clamped so they can never be confused with a mate.
    fn evaluate(&self, position: &P) -> Result<Score, SearchError> {
        match position.terminal()? {
            Some(reason) => Ok(Score::terminal(reason, 0)),
            None => Ok(self.heuristic(position).clamp_eval()),
        }
    }
}

impl<P: Rules, E: Evaluate<P>> Evaluate<P> for &E {
    #[inline(always)]
    fn heuristic(&self, position: &P) -> Score {
        (*self).heuristic(position)
    }
}

/// The hand-written endgame evaluator.
///
/// Combines material, king activity, mop-up pressure, pawn structure, and mobility.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EndgameEvaluator;

impl Evaluate<Position> for EndgameEvaluator {
    #[inline(always)]
    fn heuristic(&self, position: &Position) -> Score {
        Evaluation::new(position).score()
    }
}

/// Every term of an evaluation, for both sides.
///
/// Indexed by [`Color::index`]. Printing an [`Evaluation`] shows the breakdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    /// Whose perspective [`Evaluation::score`] is from.
    side_to_move: Color,

    /// Percentage of game completion, in the range `[0, 100]`.
    ///
    /// Higher number means fewer pieces are on the board
    pub(crate) endgame_weight: i32,

    pub material: [i32; Color::COUNT],
    pub king_activity: [i32; Color::COUNT],
    pub mop_up: [i32; Color::COUNT],
    pub pawns: [i32; Color::COUNT],
    pub mobility: [i32; Color::COUNT],
}

impl Evaluation {
    /// Evaluates every term of `position`.
    pub fn new(position: &Position) -> Self {
        let game = position.game();
        let board: &Board = game;
        let endgame_weight = endgame_weight(board);

        let mut eval = Self {
            side_to_move: game.side_to_move(),
            endgame_weight,
            material: [0; Color::COUNT],
            king_activity: [0; Color::COUNT],
            mop_up: [0; Color::COUNT],
            pawns: [0; Color::COUNT],
            mobility: [0; Color::COUNT],
        };

        for color in Color::all() {
            eval.material[color.index()] = material_of(board, color);
            eval.mobility[color.index()] =
                compute_attacks_by(board, color).population() as i32 * MOBILITY_WEIGHT;
            eval.pawns[color.index()] = pawn_structure(board, color);
        }

        let kings = Color::all().map(|color| board.king(color).to_square());
        let [Some(white_king), Some(black_king)] = kings else {
            // Positions are validated before they are evaluated; a missing king contributes nothing.
            return eval;
        };

        for (color, king) in [(Color::White, white_king), (Color::Black, black_king)] {
            eval.king_activity[color.index()] =
                -center_distance(king) * KING_CENTER_WEIGHT * endgame_weight / 100;
        }

        // Mop-up only helps the side that is clearly ahead and can force mate with a heavy piece
        for color in Color::all() {
            let us = eval.material[color.index()];
            let them = eval.material[color.opponent().index()];
            let has_heavy = (board.rooks(color) | board.queens(color)).is_nonempty();

            if us >= them + MOP_UP_MARGIN && has_heavy {
                let (ours, theirs) = if color.is_white() {
                    (white_king, black_king)
                } else {
                    (black_king, white_king)
                };

                let edge = (3 - edge_distance(theirs)) * EDGE_PRESSURE_WEIGHT;
                let proximity = (7 - king_distance(ours, theirs)) * KING_PROXIMITY_WEIGHT;
                eval.mop_up[color.index()] = edge + proximity;
            }
        }

        eval
    }

    /// Sum of every term for `color`.
    #[inline(always)]
    pub fn total(&self, color: Color) -> i32 {
        let i = color.index();
        self.material[i] + self.king_activity[i] + self.mop_up[i] + self.pawns[i] + self.mobility[i]
    }

    /// Score of this evaluation from the side-to-move's perspective.
    #[inline(always)]
    pub fn score(&self) -> Score {
        let stm = self.side_to_move;
        Score(self.total(stm) - self.total(stm.opponent())).clamp_eval()
    }
}

impl fmt::Display for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let terms = [
            ("Material", &self.material),
            ("King activity", &self.king_activity),
            ("Mop-up", &self.mop_up),
            ("Pawns", &self.pawns),
            ("Mobility", &self.mobility),
        ];

        writeln!(f, "+---------------+-------+-------+")?;
        writeln!(f, "| Term          | White | Black |")?;
        writeln!(f, "+---------------+-------+-------+")?;
        for (name, values) in terms {
            writeln!(
                f,
                "| {name:<13} | {:>5} | {:>5} |",
                values[Color::White.index()],
                values[Color::Black.index()]
            )?;
        }
        writeln!(f, "+---------------+-------+-------+")?;
        writeln!(
            f,
            "| {:<13} | {:>5} | {:>5} |",
            "Total",
            self.total(Color::White),
            self.total(Color::Black)
        )?;
        writeln!(f, "+---------------+-------+-------+")?;

        let score = self.score();
        let winning_side = if score > Score::DRAW {
            Some(self.side_to_move)
        } else if score < Score::DRAW {
            Some(self.side_to_move.opponent())
        } else {
            None
        };

        writeln!(f, "\nEndgame: {}%", self.endgame_weight)?;
        writeln!(
            f,
            "Winning side: {}",
            winning_side.map(|c| c.name()).unwrap_or("N/A")
        )?;
        write!(f, "Score: {score} ({} to move)", self.side_to_move.name())
    }
}

/// Returns a value of the provided `PieceKind`.
///
/// Values are obtained from here: <https://www.chessprogramming.org/Simplified_Evaluation_Function>
#[inline(always)]
pub const fn value_of(kind: PieceKind) -> i32 {
    match kind {
        PieceKind::Pawn => 100,
        PieceKind::Knight => 320,
        PieceKind::Bishop => 330,
        PieceKind::Rook => 500,
        PieceKind::Queen => 900,
        PieceKind::King => 0, // King is invaluable, but 0 is easier to work with in computations
    }
}

/// Counts the material value of all of `color`'s pieces.
#[inline(always)]
fn material_of(board: &Board, color: Color) -> i32 {
    PieceKind::all_except_king()
        .into_iter()
        .fold(0, |score, kind| {
            score + board.piece_parts(color, kind).population() as i32 * value_of(kind)
        })
}

/// Counts the material value of all pieces on the board
///
/// Does NOT count the material of the King, as it cannot be removed from the board.
#[inline(always)]
fn material_remaining(board: &Board) -> i32 {
    PieceKind::all_except_king()
        .into_iter()
        .fold(0, |score, kind| {
            score + board.kind(kind).population() as i32 * value_of(kind)
        })
}

/// Divides the original material value of the board by the current material value, yielding an `i32` in the range `[0, 100]`
///
/// Lower numbers are closer to the beginning of the game. Higher numbers are closer to the end of the game.
///
/// The King is ignored when performing this calculation.
#[inline(always)]
fn endgame_weight(board: &Board) -> i32 {
    let remaining = (INITIAL_MATERIAL_VALUE - material_remaining(board)).max(0);
    remaining * 100 / INITIAL_MATERIAL_VALUE
}

/// Doubled, isolated, passed, and advanced pawns of `color`.
fn pawn_structure(board: &Board, color: Color) -> i32 {
    let ours = board.pawns(color).into_iter().collect::<Vec<Square>>();
    let theirs = board.pawns(color.opponent()).into_iter().collect::<Vec<Square>>();

    let mut per_file = [0; File::COUNT];
    for sq in &ours {
        per_file[sq.file().index()] += 1;
    }

    let mut score = 0;

    for count in per_file {
        if count > 1 {
            score -= DOUBLED_PAWN_PENALTY * (count - 1);
        }
    }

    for &sq in &ours {
        let file = sq.file().index();
        let rank = relative_rank(sq, color);

        score += (rank - 1) * PAWN_ADVANCE_WEIGHT;

        let isolated = ours
            .iter()
            .all(|other| other.file().index().abs_diff(file) != 1);
        if isolated {
            score -= ISOLATED_PAWN_PENALTY;
        }

        let passed = theirs.iter().all(|&other| {
            other.file().index().abs_diff(file) > 1 || relative_rank(other, color) <= rank
        });
        if passed {
            score += PASSED_PAWN_BONUS;
        }
    }

    score
}

/// Rank of `square` counted from `color`'s back rank, in `[0, 7]`.
#[inline(always)]
fn relative_rank(square: Square, color: Color) -> i32 {
    let rank = square.rank().index() as i32;
    if color.is_white() {
        rank
    } else {
        Rank::COUNT as i32 - 1 - rank
    }
}

/// Chebyshev distance of `square` from the four centre squares, in `[0, 3]`.
#[inline(always)]
fn center_distance(square: Square) -> i32 {
    let from_center = |i: usize| (2 * i as i32 - 7).abs() / 2;
    from_center(square.file().index()).max(from_center(square.rank().index()))
}

/// Number of steps from `square` to the nearest edge, in `[0, 3]`.
#[inline(always)]
fn edge_distance(square: Square) -> i32 {
    let file = square.file().index() as i32;
    let rank = square.rank().index() as i32;
    file.min(7 - file).min(rank).min(7 - rank)
}

/// Number of king moves between two squares.
#[inline(always)]
fn king_distance(a: Square, b: Square) -> i32 {
    let files = a.file().index().abs_diff(b.file().index());
    let ranks = a.rank().index().abs_diff(b.rank().index());
    files.max(ranks) as i32
}
