/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{fs, path::Path};

use anyhow::{bail, Context, Result};
use rand::{prelude::IndexedRandom, seq::SliceRandom, Rng};

use crate::{Position, Rules};

/// Maximum number of plies from the root that a search can ever reach, quiescence included.
pub const MAX_PLY: usize = 128;

/// Maximum depth that can be searched.
pub const MAX_DEPTH: u8 = 32;

/// Positions searched by the `bench` command.
pub const BENCHMARK_FENS: [&str; 8] = [
    "8/8/4k3/8/8/3K4/8/R7 w - - 0 1",
    "8/8/8/2k5/8/8/8/3QK3 w - - 0 1",
    "8/5k2/8/2P5/8/8/1K6/8 w - - 0 1",
    "8/8/3k4/8/2B5/2N5/4K3/8 w - - 0 1",
    "8/p4k2/8/8/3Q4/8/1K6/8 w - - 0 1",
    "6k1/5pp1/8/8/8/8/1PP5/1K2R3 w - - 0 1",
    "8/8/1k6/8/8/4r3/2K5/4R3 b - - 0 1",
    "4k3/8/8/8/8/8/4P3/4K3 w - - 0 1",
];

/// How many boards [`random_endgame_fen`] may throw away before giving up.
const MAX_GENERATION_ATTEMPTS: usize = 100_000;

/// Piece letters a generated position may contain besides the kings.
const EXTRA_PIECES: [char; 5] = ['p', 'n', 'b', 'r', 'q'];

/// Generates a random, legal, non-terminal endgame position.
///
/// Both kings are always present, and the total number of pieces (kings included) lies in
/// `min_pieces..=max_pieces`. Pawns never land on the first or last rank.
pub fn random_endgame_fen<R: Rng + ?Sized>(
    rng: &mut R,
    min_pieces: usize,
    max_pieces: usize,
) -> Result<String> {
    if min_pieces > max_pieces {
        bail!("Minimum piece count {min_pieces} exceeds maximum {max_pieces}");
    }
    if max_pieces > 32 {
        bail!("Cannot place {max_pieces} pieces in an endgame");
    }
    let min_pieces = min_pieces.max(2);
    let max_pieces = max_pieces.max(2);

    for _ in 0..MAX_GENERATION_ATTEMPTS {
        // Rank 8 first, as in a FEN
        let mut board = [[None::<char>; 8]; 8];
        let mut squares = (0..64).collect::<Vec<usize>>();
        squares.shuffle(rng);

        let num_pieces = rng.random_range(min_pieces..=max_pieces);
        for (i, &sq) in squares.iter().take(num_pieces).enumerate() {
            let (rank, file) = (sq / 8, sq % 8);

            let letter = match i {
                0 => 'K',
                1 => 'k',
                _ => {
                    let back_rank = rank == 0 || rank == 7;
                    let candidates = if back_rank {
                        &EXTRA_PIECES[1..]
                    } else {
                        &EXTRA_PIECES[..]
                    };
                    // Neither slice is empty
                    let &kind = candidates.choose(rng).unwrap_or(&'q');

                    if rng.random_bool(0.5) {
                        kind.to_ascii_uppercase()
                    } else {
                        kind
                    }
                }
            };

            board[rank][file] = Some(letter);
        }

        let stm = if rng.random_bool(0.5) { 'w' } else { 'b' };
        let fen = format!("{} {stm} - - 0 1", placement(&board));

        // Reject boards where the side not to move is in check, and games that are already over
        let Ok(position) = Position::from_fen(&fen) else {
            continue;
        };
        if position.terminal()?.is_none() {
            return Ok(fen);
        }
    }

    bail!("Failed to generate a playable endgame in {MAX_GENERATION_ATTEMPTS} attempts")
}

/// Piece placement field of a FEN for `board`, whose first row is rank 8.
fn placement(board: &[[Option<char>; 8]; 8]) -> String {
    board
        .iter()
        .map(|rank| {
            let mut row = String::new();
            let mut empty = 0;
            for square in rank {
                match square {
                    Some(letter) => {
                        if empty > 0 {
                            row.push_str(&empty.to_string());
                            empty = 0;
                        }
                        row.push(*letter);
                    }
                    None => empty += 1,
                }
            }
            if empty > 0 {
                row.push_str(&empty.to_string());
            }
            row
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Reads starting positions from a file, one FEN per line.
///
/// Blank lines and lines starting with `#` are skipped, and anything after a `;` is ignored,
/// so EPD files with operations can be loaded as well.
pub fn load_fens(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read FENs from {}", path.display()))?;

    Ok(contents
        .lines()
        .filter_map(|line| line.split(';').next())
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect())
}
