/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use crate::{value_of, MoveClass, Rules, SearchError};

/// Base score of any move that gives check.
const CHECK_SCORE: i32 = 3_000_000;

/// Base score of any capture, before the victim's value is added.
const CAPTURE_SCORE: i32 = 2_000_000;

/// Base score of any promotion, before the promoted piece's value is added.
const PROMOTION_SCORE: i32 = 1_000_000;

/// Yields moves from best to worst, according to the scores they were given.
///
/// Moves with equal scores keep the order they were given in.
pub struct MovePicker<M> {
    /// Moves paired with their scores, already sorted.
    moves: Vec<(M, i32)>,

    /// Index of the next move to yield.
    current: usize,
}

impl<M: Copy> MovePicker<M> {
    /// Pairs every move in `moves` with its score and sorts them, highest score first.
    pub fn new(moves: Vec<M>, scores: Vec<i32>) -> Self {
        let mut moves = moves.into_iter().zip(scores).collect::<Vec<_>>();

        // Stable, so ties stay in the order the rules engine produced them
        moves.sort_by_key(|&(_, score)| std::cmp::Reverse(score));

        Self { moves, current: 0 }
    }
}

impl<M: Copy> Iterator for MovePicker<M> {
    type Item = (M, i32);

    fn next(&mut self) -> Option<Self::Item> {
        let next = self.moves.get(self.current).copied()?;
        self.current += 1;
        Some(next)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.moves.len() - self.current;
        (remaining, Some(remaining))
    }
}

impl<M: Copy> ExactSizeIterator for MovePicker<M> {}

/// Ordering priority of a move: checks, then captures of the most valuable victims, then promotions.
#[inline(always)]
pub fn score_move(class: MoveClass) -> i32 {
    if class.gives_check {
        CHECK_SCORE
    } else if let Some(victim) = class.captured {
        CAPTURE_SCORE + value_of(victim)
    } else if let Some(promotion) = class.promotion {
        PROMOTION_SCORE + value_of(promotion)
    } else {
        0
    }
}

/// Orders `moves` so that the most forcing moves of `position` are searched first.
///
/// Ordering never changes which moves are searched, only when.
pub fn order<P: Rules>(position: &P, moves: Vec<P::Move>) -> Result<Vec<P::Move>, SearchError> {
    let scores = moves
        .iter()
        .map(|&mv| position.classify(mv).map(score_move))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(MovePicker::new(moves, scores).map(|(mv, _)| mv).collect())
}
