/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{fmt, str::FromStr};

use anyhow::{bail, Context, Result};
use chessie::{Color, Game, Move, PieceKind, ZobristKey};

use crate::{MoveClass, OracleError, Rules, SearchError, TerminalReason, MAX_DEPTH};

/// Number of plies without a capture or pawn move after which the game is drawn.
const FIFTY_MOVE_PLIES: usize = 100;

/// Number of times a position must occur for the game to be drawn by repetition.
const REPETITION_LIMIT: usize = 3;

/// Cache identity of a [`Position`].
///
/// Two positions with the same placement, rights, and side to move share a Zobrist key.
/// The half-move clock only becomes part of the identity once the fifty-move rule is
/// within reach of a search, since before that it cannot change any result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PositionKey {
    zobrist: ZobristKey,
    halfmove_bucket: u16,
}

/// A chess position as seen by the search, backed by [`chessie`].
///
/// The position also remembers the Zobrist keys of every position that preceded it in the game,
/// which is how threefold repetition is detected. Positions produced by [`Rules::apply`] start
/// with an empty history, so repetition is only ever detected where a game handed one in.
#[derive(Debug, Clone)]
pub struct Position {
    /// Current state of the board.
    game: Game,

    /// Keys of all earlier positions in the game, oldest first.
    history: Vec<ZobristKey>,
}

impl Position {
    /// Parses and validates a position from a FEN string.
    pub fn from_fen(fen: &str) -> Result<Self, SearchError> {
        check_placement(fen)?;
        let game = Game::from_fen(fen.trim())
            .map_err(|err| SearchError::InvalidPosition(format!("{fen:?}: {err:#}")))?;

        let position = Self::from_game(game);
        position.validate()?;
        Ok(position)
    }

    /// Wraps a [`Game`] without validating it.
    #[inline(always)]
    pub fn from_game(game: Game) -> Self {
        Self {
            game,
            history: Vec::new(),
        }
    }

    /// The underlying [`Game`].
    #[inline(always)]
    pub const fn game(&self) -> &Game {
        &self.game
    }

    /// Keys of every position that came before this one in the game.
    #[inline(always)]
    pub fn history(&self) -> &[ZobristKey] {
        &self.history
    }

    /// FEN string of this position.
    #[inline(always)]
    pub fn to_fen(&self) -> String {
        self.game.to_fen()
    }

    /// Number of pieces of `color` on the board, kings included.
    pub fn piece_count(&self, color: Color) -> usize {
        self.game
            .board()
            .iter()
            .filter(|(_, piece)| piece.color() == color)
            .count()
    }

    /// Plays `mv` as part of a game, remembering the current position for repetition detection.
    ///
    /// Unlike [`Rules::apply`], this checks that `mv` is legal in this position.
    pub fn play(&self, mv: Move) -> Result<Self> {
        if !self.game.get_legal_moves().contains(&mv) {
            bail!("{mv} is not a legal move in {}", self.to_fen());
        }

        let mut history = self.history.clone();
        history.push(self.game.key());

        Ok(Self {
            game: self.game.with_move_made(mv),
            history,
        })
    }

    /// Parses `mv` as a UCI move string and plays it.
    pub fn play_uci(&self, mv: &str) -> Result<Self> {
        let mv = Move::from_uci(&self.game, mv)
            .with_context(|| format!("Failed to parse move {mv:?} in {}", self.to_fen()))?;
        self.play(mv)
    }

    /// Returns the mirror image of this position: the board is reflected top to bottom and every
    /// piece changes colour, while the side to move stays the same.
    ///
    /// The side to move's evaluation of the mirror is the negation of its evaluation of `self`.
    pub fn mirror(&self) -> Result<Self, SearchError> {
        let fen = mirror_fen(&self.to_fen())
            .map_err(|err| SearchError::InvalidPosition(format!("{err:#}")))?;
        let game = Game::from_fen(&fen)
            .map_err(|err| SearchError::InvalidPosition(format!("{fen:?}: {err:#}")))?;

        Ok(Self::from_game(game))
    }

    /// Returns the colour-flipped variant of this position, where the side to move changes as well.
    ///
    /// The side to move is in exactly the same situation as before, so evaluations are unchanged.
    pub fn flipped(&self) -> Result<Self, SearchError> {
        let mirrored = mirror_fen(&self.to_fen())
            .map_err(|err| SearchError::InvalidPosition(format!("{err:#}")))?;
        let fen = with_side_to_move(&mirrored, self.side_to_move().opponent(), true);
        let game = Game::from_fen(&fen)
            .map_err(|err| SearchError::InvalidPosition(format!("{fen:?}: {err:#}")))?;

        Ok(Self::from_game(game))
    }

    /// Number of times the current position occurs in the game, including now.
    fn occurrences(&self) -> usize {
        let key = self.game.key();
        1 + self.history.iter().filter(|&&prev| prev == key).count()
    }
}

impl Rules for Position {
    type Move = Move;
    type Key = PositionKey;

    /// A position is playable if each side has exactly one king and the side that just moved did not leave its king in check.
    fn validate(&self) -> Result<(), SearchError> {
        for color in [Color::White, Color::Black] {
            let kings = self
                .game
                .board()
                .iter()
                .filter(|(_, piece)| piece.color() == color && piece.kind() == PieceKind::King)
                .count();

            if kings != 1 {
                return Err(SearchError::InvalidPosition(format!(
                    "{} has {kings} kings in {}",
                    color.name(),
                    self.to_fen()
                )));
            }
        }

        // Hand the move to the other side; if they are in check now, the previous move was illegal.
        let fen = with_side_to_move(&self.to_fen(), self.side_to_move().opponent(), true);
        let passed = Game::from_fen(&fen)
            .map_err(|err| SearchError::InvalidPosition(format!("{fen:?}: {err:#}")))?;

        if passed.is_in_check() {
            return Err(SearchError::InvalidPosition(format!(
                "{} is in check but it is not their move in {}",
                self.side_to_move().opponent().name(),
                self.to_fen()
            )));
        }

        Ok(())
    }

    #[inline(always)]
    fn legal_moves(&self) -> Result<Vec<Move>, OracleError> {
        Ok(self.game.get_legal_moves().into_iter().collect())
    }

    #[inline(always)]
    fn apply(&self, mv: Move) -> Result<Self, OracleError> {
        Ok(Self::from_game(self.game.with_move_made(mv)))
    }

    fn terminal(&self) -> Result<Option<TerminalReason>, OracleError> {
        if self.game.get_legal_moves().is_empty() {
            return Ok(Some(if self.game.is_in_check() {
                TerminalReason::Checkmate
            } else {
                TerminalReason::Stalemate
            }));
        }

        if self.game.can_draw_by_insufficient_material() {
            Ok(Some(TerminalReason::InsufficientMaterial))
        } else if self.game.halfmove() >= FIFTY_MOVE_PLIES {
            Ok(Some(TerminalReason::FiftyMoveRule))
        } else if self.occurrences() >= REPETITION_LIMIT {
            Ok(Some(TerminalReason::ThreefoldRepetition))
        } else {
            Ok(None)
        }
    }

    #[inline(always)]
    fn side_to_move(&self) -> Color {
        self.game.side_to_move()
    }

    #[inline(always)]
    fn key(&self) -> PositionKey {
        let bucket = (self.game.halfmove() + MAX_DEPTH as usize).saturating_sub(FIFTY_MOVE_PLIES);

        PositionKey {
            zobrist: self.game.key(),
            halfmove_bucket: bucket.min(u16::MAX as usize) as u16,
        }
    }

    fn classify(&self, mv: Move) -> Result<MoveClass, OracleError> {
        let captured = if mv.is_en_passant() {
            Some(PieceKind::Pawn)
        } else if mv.is_capture() {
            let victim = self.game.piece_at(mv.to()).ok_or_else(|| {
                OracleError::new(format!(
                    "capture {mv} has no victim on {} in {}",
                    mv.to(),
                    self.to_fen()
                ))
            })?;
            Some(victim.kind())
        } else {
            None
        };

        Ok(MoveClass {
            gives_check: self.game.with_move_made(mv).is_in_check(),
            captured,
            promotion: mv.promotion(),
        })
    }
}

impl FromStr for Position {
    type Err = SearchError;
    #[inline(always)]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_fen(s)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.game)
    }
}

/// Checks the shape of a FEN's placement field and that each side has exactly one king.
///
/// [`Game`] assumes both kings exist when it computes legal moves, so this runs before parsing.
fn check_placement(fen: &str) -> Result<(), SearchError> {
    let invalid = |reason: String| SearchError::InvalidPosition(format!("{fen:?}: {reason}"));
    let placement = fen.split_ascii_whitespace().next().unwrap_or_default();

    let ranks = placement.split('/').collect::<Vec<_>>();
    if ranks.len() != 8 {
        return Err(invalid(format!("expected 8 ranks, found {}", ranks.len())));
    }

    for rank in ranks {
        let width = rank
            .chars()
            .map(|c| c.to_digit(10).map_or(1, |empty| empty as usize))
            .sum::<usize>();
        if width != 8 {
            return Err(invalid(format!("rank {rank:?} spans {width} files")));
        }
    }

    for (king, color) in [('K', Color::White), ('k', Color::Black)] {
        let kings = placement.matches(king).count();
        if kings != 1 {
            return Err(invalid(format!("{} has {kings} kings", color.name())));
        }
    }

    Ok(())
}

/// Reflects a FEN string top to bottom and swaps the colour of every piece, keeping the side to move.
pub fn mirror_fen(fen: &str) -> Result<String> {
    let fields = fen.split_ascii_whitespace().collect::<Vec<_>>();
    let [placement, stm, castling, ep, rest @ ..] = fields.as_slice() else {
        bail!("FEN {fen:?} has fewer than four fields");
    };

    let placement = placement
        .split('/')
        .rev()
        .map(swap_case)
        .collect::<Vec<_>>()
        .join("/");

    // Castling rights keep their order convention: White's first
    let mut castling = swap_case(castling).chars().collect::<Vec<_>>();
    castling.sort_by_key(|c| (c.is_ascii_lowercase(), *c));
    let castling = castling.into_iter().collect::<String>();

    let ep = match ep.as_bytes() {
        [file, rank] if rank.is_ascii_digit() => {
            format!("{}{}", *file as char, (b'1' + b'8' - rank) as char)
        }
        _ => String::from("-"),
    };

    let mut mirrored = vec![placement, stm.to_string(), castling, ep];
    mirrored.extend(rest.iter().map(|s| s.to_string()));
    Ok(mirrored.join(" "))
}

/// Swaps upper case for lower case and vice versa.
fn swap_case(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_ascii_uppercase() {
                c.to_ascii_lowercase()
            } else {
                c.to_ascii_uppercase()
            }
        })
        .collect()
}

/// Replaces the side to move of a FEN string, optionally clearing its en passant square.
fn with_side_to_move(fen: &str, color: Color, clear_ep: bool) -> String {
    fen.split_ascii_whitespace()
        .enumerate()
        .map(|(i, field)| match i {
            1 => String::from(if color.is_white() { "w" } else { "b" }),
            3 if clear_ep => String::from("-"),
            _ => field.to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mirror_fen() {
        let fen = "8/8/8/4k3/8/8/4P3/R3K3 w Q - 3 40";
        assert_eq!(
            mirror_fen(fen).unwrap(),
            "r3k3/4p3/8/8/4K3/8/8/8 w q - 3 40"
        );

        let ep = "4k3/8/8/3pP3/8/8/8/4K3 w - d6 0 2";
        assert_eq!(mirror_fen(ep).unwrap(), "4k3/8/8/8/3Pp3/8/8/4K3 w - d3 0 2");

        assert!(mirror_fen("8/8/8").is_err());
    }

    #[test]
    fn test_rejects_missing_and_extra_kings() {
        assert!(matches!(
            Position::from_fen("8/8/8/4k3/8/8/8/8 w - - 0 1"),
            Err(SearchError::InvalidPosition(_))
        ));
        assert!(matches!(
            Position::from_fen("8/8/8/4k3/8/8/8/K6K w - - 0 1"),
            Err(SearchError::InvalidPosition(_))
        ));
        assert!(matches!(
            Position::from_fen("not a fen"),
            Err(SearchError::InvalidPosition(_))
        ));
    }

    #[test]
    fn test_rejects_malformed_placements() {
        for fen in [
            "8/8/8/8/8/8/8/8 w - - 0 1",
            "8/8/4k3/8/8/3K4/8 w - - 0 1",
            "8/8/4k4/8/8/3K4/8/8 w - - 0 1",
            "8/8/4k3/8/8/3K3/8/8 w - - 0 1",
            "",
        ] {
            assert!(
                matches!(Position::from_fen(fen), Err(SearchError::InvalidPosition(_))),
                "{fen:?}"
            );
        }
    }

    #[test]
    fn test_rejects_opponent_in_check() {
        // White to move, but Black is already in check from the rook
        let fen = "4k3/8/8/8/8/8/8/K3R3 w - - 0 1";
        assert!(matches!(
            Position::from_fen(fen),
            Err(SearchError::InvalidPosition(_))
        ));
    }

    #[test]
    fn test_terminal_reasons() {
        let mated = Position::from_fen("k7/1Q6/1K6/8/8/8/8/8 b - - 0 1").unwrap();
        assert_eq!(mated.terminal().unwrap(), Some(TerminalReason::Checkmate));

        let stalemate = Position::from_fen("k7/8/1Q6/8/8/8/8/7K b - - 0 1").unwrap();
        assert_eq!(stalemate.terminal().unwrap(), Some(TerminalReason::Stalemate));

        let bare = Position::from_fen("8/8/4k3/8/8/3K4/8/8 w - - 0 1").unwrap();
        assert_eq!(
            bare.terminal().unwrap(),
            Some(TerminalReason::InsufficientMaterial)
        );

        let fifty = Position::from_fen("8/8/4k3/8/8/3K4/8/R7 w - - 100 80").unwrap();
        assert_eq!(fifty.terminal().unwrap(), Some(TerminalReason::FiftyMoveRule));

        let krk = Position::from_fen("8/8/4k3/8/8/3K4/8/R7 w - - 0 1").unwrap();
        assert_eq!(krk.terminal().unwrap(), None);
    }

    #[test]
    fn test_threefold_repetition_needs_history() {
        let mut position = Position::from_fen("8/8/4k3/8/8/3K4/8/R7 w - - 0 1").unwrap();
        let shuffle = ["a1a2", "e6e7", "a2a1", "e7e6"];

        for mv in shuffle.iter().chain(shuffle.iter()) {
            assert_eq!(position.terminal().unwrap(), None);
            position = position.play_uci(mv).unwrap();
        }

        // Third occurrence of the starting position
        assert_eq!(
            position.terminal().unwrap(),
            Some(TerminalReason::ThreefoldRepetition)
        );

        // The same board reached through the search has no history
        let fresh = Position::from_fen(&position.to_fen()).unwrap();
        assert_eq!(fresh.terminal().unwrap(), None);
        assert_eq!(fresh.key(), position.key());
    }

    #[test]
    fn test_play_rejects_illegal_moves() {
        let position = Position::from_fen("8/8/4k3/8/8/3K4/8/R7 w - - 0 1").unwrap();
        assert!(position.play_uci("d3d5").is_err());
        assert!(position.play_uci("a1b2").is_err());
        assert!(position.play_uci("d3e4").is_ok());
        assert!(position.play_uci("a1a8").is_ok());
    }

    #[test]
    fn test_classify() {
        let position = Position::from_fen("4k3/8/8/8/q7/8/5P2/R3K2R w - - 0 1").unwrap();

        let check = Move::from_uci(position.game(), "h1h8").unwrap();
        let class = position.classify(check).unwrap();
        assert!(class.gives_check);
        assert!(!class.is_capture());

        let capture = Move::from_uci(position.game(), "a1a4").unwrap();
        let class = position.classify(capture).unwrap();
        assert_eq!(class.captured, Some(PieceKind::Queen));

        let quiet = Move::from_uci(position.game(), "f2f3").unwrap();
        assert_eq!(position.classify(quiet).unwrap(), MoveClass::QUIET);
    }

    #[test]
    fn test_halfmove_only_keys_near_the_fifty_move_rule() {
        let early = Position::from_fen("8/8/4k3/8/8/3K4/8/R7 w - - 3 10").unwrap();
        let earlier = Position::from_fen("8/8/4k3/8/8/3K4/8/R7 w - - 0 1").unwrap();
        assert_eq!(early.key(), earlier.key());

        let late = Position::from_fen("8/8/4k3/8/8/3K4/8/R7 w - - 90 60").unwrap();
        assert_ne!(late.key(), earlier.key());
    }

    #[test]
    fn test_piece_counts() {
        let position = Position::from_fen("8/8/4k3/8/8/3K4/5P2/R7 w - - 0 1").unwrap();
        assert_eq!(position.piece_count(Color::White), 3);
        assert_eq!(position.piece_count(Color::Black), 1);
    }
}
