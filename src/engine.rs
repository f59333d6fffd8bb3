/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::time::Instant;

use anyhow::{Context, Result};

use crate::{
    EndgameEvaluator, Evaluate, Evaluation, Position, Rules, Score, Search, SearchConfig,
    SearchError, SearchResult, TTable, BENCHMARK_FENS,
};

/// Default depth at which to run the benchmark searches.
const BENCH_DEPTH: u8 = 5;

/// An engine instance: an evaluator plus the transposition table its searches share.
///
/// Each call to [`Engine::search`] runs to completion before returning; the table is only ever touched
/// through `&mut self`, so it can never be shared between two searches at once.
pub struct Engine<P: Rules, E> {
    /// Scores leaves of the search.
    evaluator: E,

    /// Cleared before every search, unless the search asks for a persistent cache.
    ttable: TTable<P::Key>,
}

/// The engine as used for real chess positions.
pub type ChessEngine = Engine<Position, EndgameEvaluator>;

impl<P: Rules, E: Evaluate<P>> Engine<P, E> {
    /// Constructs a new [`Engine`] with an empty, default-sized transposition table.
    pub fn new(evaluator: E) -> Self {
        Self::with_capacity(evaluator, TTable::<P::Key>::DEFAULT_CAPACITY)
    }

    /// Constructs a new [`Engine`] whose transposition table holds at most `capacity` entries.
    pub fn with_capacity(evaluator: E, capacity: usize) -> Self {
        Self {
            evaluator,
            ttable: TTable::from_capacity(capacity),
        }
    }

    /// Returns a string of the engine's name and current version.
    pub fn name(&self) -> String {
        format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
    }

    /// The evaluator this engine scores positions with.
    #[inline(always)]
    pub const fn evaluator(&self) -> &E {
        &self.evaluator
    }

    /// The transposition table shared by this engine's searches.
    #[inline(always)]
    pub const fn ttable(&self) -> &TTable<P::Key> {
        &self.ttable
    }

    /// Score of `position` from the side to move's perspective, without searching.
    #[inline(always)]
    pub fn evaluate(&self, position: &P) -> Result<Score, SearchError> {
        position.validate()?;
        self.evaluator.evaluate(position)
    }

    /// Searches `position` according to `config`, returning the best move found.
    pub fn search(
        &mut self,
        position: &P,
        config: &SearchConfig,
    ) -> Result<SearchResult<P::Move>, SearchError> {
        if !config.persistent_cache {
            self.ttable.clear();
        }

        Search::new(&self.evaluator, &mut self.ttable, config).start(position)
    }

    /// Empties the transposition table.
    #[inline(always)]
    pub fn clear(&mut self) {
        self.ttable.clear();
    }
}

impl Engine<Position, EndgameEvaluator> {
    /// Execute the `bench` command, running a benchmark of a fixed search on a series of positions and displaying the results.
    pub fn bench(&mut self, depth: Option<u8>, pretty: bool) -> Result<u64> {
        // Set up the benchmarking config
        let config = SearchConfig {
            depth: depth.unwrap_or(BENCH_DEPTH),
            ..Default::default()
        };

        let num_tests = BENCHMARK_FENS.len();
        let mut nodes = 0;
        let starttime = Instant::now();

        // Run a fixed search on each position
        for (i, fen) in BENCHMARK_FENS.into_iter().enumerate() {
            println!("Benchmark position {}/{}: {fen}", i + 1, num_tests);

            let position = Position::from_fen(fen)
                .with_context(|| format!("Invalid benchmark position {fen:?}"))?;
            let res = self.search(&position, &config)?;
            nodes += res.nodes;
        }

        // Compute results
        let elapsed = starttime.elapsed();
        let nps = (nodes as f32 / elapsed.as_secs_f32().max(f32::EPSILON)) as u64;
        let m_nps = nps as f32 / 1_000_000.0;
        let ms = elapsed.as_millis();

        if pretty {
            // Display the results in a nice table
            println!();
            println!("+--- Benchmark Complete ---+");
            println!("| time (ms)  : {ms:<12}|");
            println!("| nodes      : {nodes:<12}|");
            println!("| nps        : {nps:<12}|");
            println!("| Mnps       : {m_nps:<12.2}|");
            println!("+--------------------------+");
        } else {
            println!("{nodes} nodes {nps} nps");
        }

        Ok(nodes)
    }

    /// Executes the `eval` command, printing an evaluation of `position`.
    pub fn eval(&self, position: &Position, pretty: bool) -> Result<Score> {
        let score = self.evaluate(position)?;
        if pretty {
            println!("{position}\n");
            if position.terminal()?.is_none() {
                println!("{}\n", Evaluation::new(position));
            }
            print!("Score: ");
        }

        println!("{score}");
        Ok(score)
    }
}

impl Default for ChessEngine {
    fn default() -> Self {
        Self::new(EndgameEvaluator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Algorithm, TerminalReason};

    #[test]
    fn test_cache_is_cleared_between_searches() {
        let position = Position::from_fen("8/8/4k3/8/8/3K4/8/R7 w - - 0 1").unwrap();
        let mut engine = ChessEngine::default();
        let config = SearchConfig {
            depth: 3,
            ..Default::default()
        };

        let first = engine.search(&position, &config).unwrap();
        assert!(!engine.ttable().is_empty());
        let second = engine.search(&position, &config).unwrap();
        assert_eq!(first, second);

        // Keeping the table around lets the second search reuse the first
        let persistent = SearchConfig {
            persistent_cache: true,
            ..config
        };
        let reused = engine.search(&position, &persistent).unwrap();
        assert_eq!(reused.score, first.score);
        assert_eq!(reused.best_move, first.best_move);
        assert!(reused.nodes < first.nodes);
    }

    #[test]
    fn test_checkmated_root() {
        let position = Position::from_fen("k7/1Q6/1K6/8/8/8/8/8 b - - 0 1").unwrap();
        let mut engine = ChessEngine::default();

        for algorithm in Algorithm::ALL {
            let config = SearchConfig {
                algorithm,
                ..Default::default()
            };
            let res = engine.search(&position, &config).unwrap();
            assert_eq!(res.best_move, None);
            assert_eq!(res.score, -Score::MATE);
            assert_eq!(res.terminal, Some(TerminalReason::Checkmate));
        }
    }

    #[test]
    fn test_evaluate_and_eval_agree() {
        let position = Position::from_fen("8/8/4k3/8/8/3K4/8/R7 b - - 0 1").unwrap();
        let engine = ChessEngine::default();
        assert_eq!(
            engine.evaluate(&position).unwrap(),
            engine.eval(&position, false).unwrap()
        );
    }
}
