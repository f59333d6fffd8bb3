/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{
    fmt,
    ops::Neg,
    str::FromStr,
    time::{Duration, Instant},
};

use anyhow::bail;
use rand::{prelude::IndexedRandom, rngs::StdRng, SeedableRng};

use crate::{
    order, Evaluate, OracleError, Rules, Score, SearchError, TTable, TTableEntry, TerminalReason,
    MAX_DEPTH, MAX_PLY,
};

/// Number of simulations [`Algorithm::Mcts`] runs unless told otherwise.
pub const DEFAULT_SIMULATIONS: u32 = 200;

/// Exploration constant of the UCT formula.
const UCT_EXPLORATION: f64 = std::f64::consts::SQRT_2;

/// Centipawn scale of the curve that turns a heuristic score into a rollout reward.
const REWARD_SCALE: f64 = 400.0;

/// Largest reward a rollout cut off at the horizon can earn. Only a mate is worth a full point.
const HEURISTIC_REWARD: f64 = 0.5;

/// The tree search to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Algorithm {
    /// Full-width [minimax](https://www.chessprogramming.org/Minimax), in negamax form, without pruning.
    Minimax,

    /// Fail-soft [alpha-beta](https://www.chessprogramming.org/Alpha-Beta) search.
    #[default]
    AlphaBeta,

    /// Plays whichever move looks best after a single ply, regardless of the configured depth.
    Greedy,

    /// Plays a uniformly random legal move.
    Random,

    /// Alpha-beta at depths `1..=depth`, keeping the deepest completed iteration.
    Iterative,

    /// [Monte Carlo tree search](https://www.chessprogramming.org/Monte-Carlo_Tree_Search) with UCT
    /// selection and seeded random rollouts, looking no further than `depth` plies ahead.
    Mcts,
}

impl Algorithm {
    /// All algorithms, in the order they are listed in the CLI.
    pub const ALL: [Self; 6] = [
        Self::Minimax,
        Self::AlphaBeta,
        Self::Greedy,
        Self::Random,
        Self::Iterative,
        Self::Mcts,
    ];

    /// Name of this algorithm, as accepted by [`Algorithm::from_str`].
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Minimax => "minimax",
            Self::AlphaBeta => "alphabeta",
            Self::Greedy => "greedy",
            Self::Random => "random",
            Self::Iterative => "iterative",
            Self::Mcts => "mcts",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Algorithm {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        let algorithm = match lower.as_str() {
            "minimax" => Self::Minimax,
            "alphabeta" | "alpha-beta" | "ab" => Self::AlphaBeta,
            "greedy" => Self::Greedy,
            "random" => Self::Random,
            "iterative" | "iddfs" | "id" => Self::Iterative,
            "mcts" | "montecarlo" => Self::Mcts,
            _ => bail!("unknown search algorithm {s:?}"),
        };

        Ok(algorithm)
    }
}

/// Why a search returned before it was finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StopReason {
    /// The search visited [`SearchConfig::max_nodes`] nodes.
    NodeLimit,

    /// The search ran for [`SearchConfig::time_limit`].
    TimeLimit,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NodeLimit => write!(f, "node limit"),
            Self::TimeLimit => write!(f, "time limit"),
        }
    }
}

/// Configuration variables for executing a [`Search`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SearchConfig {
    /// Which search to run.
    pub algorithm: Algorithm,

    /// Maximum depth to execute the search, in plies.
    ///
    /// Must be at least 1. Values above [`MAX_DEPTH`] are capped.
    pub depth: u8,

    /// Whether to use the transposition table.
    pub use_cache: bool,

    /// If set, the transposition table is not cleared before this search.
    pub persistent_cache: bool,

    /// Whether to search checks, captures, and promotions first.
    pub move_ordering: bool,

    /// Whether to resolve captures at the horizon instead of evaluating immediately.
    pub quiescence: bool,

    /// Node allowance.
    ///
    /// If the search would exceed this many nodes, it stops and returns the best result so far.
    pub max_nodes: Option<u64>,

    /// Wall-clock allowance.
    ///
    /// If the search runs this long, it stops and returns the best result so far.
    pub time_limit: Option<Duration>,

    /// Seed for [`Algorithm::Random`] and the rollouts of [`Algorithm::Mcts`].
    pub seed: u64,

    /// Number of simulations [`Algorithm::Mcts`] runs.
    ///
    /// With zero simulations the first ordered move is played.
    pub simulations: u32,

    /// If set, an `info` line is printed to stdout after every completed depth.
    pub report: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::default(),
            depth: 3,
            use_cache: true,
            persistent_cache: false,
            move_ordering: true,
            quiescence: false,
            max_nodes: None,
            time_limit: None,
            seed: 0,
            simulations: DEFAULT_SIMULATIONS,
            report: false,
        }
    }
}

/// The result of a search, containing the best move found, score, and total nodes searched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SearchResult<M> {
    /// Best move found during the search, or `None` if the position had no moves to play.
    pub best_move: Option<M>,

    /// Evaluation of the position, from the side-to-move's perspective.
    pub score: Score,

    /// Number of nodes searched.
    pub nodes: u64,

    /// Why the root position had no further play, if it didn't.
    pub terminal: Option<TerminalReason>,

    /// Why the search stopped early, if it did.
    pub stopped: Option<StopReason>,

    /// Deepest depth that was searched to completion.
    pub depth: u8,
}

impl<M: fmt::Display> fmt::Display for SearchResult<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.best_move {
            Some(mv) => write!(f, "bestmove {mv}")?,
            None => write!(f, "bestmove (none)")?,
        }
        write!(
            f,
            " score {} depth {} nodes {}",
            self.score, self.depth, self.nodes
        )?;
        if let Some(reason) = self.terminal {
            write!(f, " terminal {reason}")?;
        }
        if let Some(reason) = self.stopped {
            write!(f, " stopped {reason}")?;
        }
        Ok(())
    }
}

/// Represents the `(alpha, beta)` window of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SearchBounds {
    /// Lower bound.
    ///
    /// We are guaranteed a score that is AT LEAST `alpha`.
    /// During search, if no move can raise `alpha`, we are said to have "failed low."
    pub alpha: Score,

    /// Upper bound.
    ///
    /// Our opponent is guaranteed a score that is AT MOST `beta`.
    /// During search, if a move scores `beta` or more, we are said to have "failed high,"
    /// and the rest of the node is pruned.
    pub beta: Score,
}

impl SearchBounds {
    /// Create a new [`SearchBounds`] from the provided `alpha` and `beta` values.
    #[inline(always)]
    pub const fn new(alpha: Score, beta: Score) -> Self {
        Self { alpha, beta }
    }
}

impl Neg for SearchBounds {
    type Output = Self;
    /// Negating a [`SearchBounds`] swaps the `alpha` and `beta` fields and negates them both.
    #[inline(always)]
    fn neg(self) -> Self::Output {
        Self {
            alpha: -self.beta,
            beta: -self.alpha,
        }
    }
}

impl Default for SearchBounds {
    /// Default [`SearchBounds`] are a `(-infinity, infinity)`.
    #[inline(always)]
    fn default() -> Self {
        Self::new(-Score::INF, Score::INF)
    }
}

/// Why a node did not produce a score.
#[derive(Debug)]
enum Halt {
    /// A budget ran out; the root keeps whatever it has.
    Stop(StopReason),

    /// Something went wrong; the whole search fails.
    Fail(SearchError),
}

impl From<OracleError> for Halt {
    #[inline(always)]
    fn from(value: OracleError) -> Self {
        Self::Fail(value.into())
    }
}

impl From<SearchError> for Halt {
    #[inline(always)]
    fn from(value: SearchError) -> Self {
        Self::Fail(value)
    }
}

/// Outcome of searching every root move at a single depth.
struct Iteration<M> {
    best_move: Option<M>,
    score: Score,
    stopped: Option<StopReason>,
}

/// A single search over one position.
///
/// Owns nothing but its node counter; the evaluator and transposition table are borrowed from the engine.
pub struct Search<'a, P: Rules, E> {
    /// Scores leaves.
    evaluator: &'a E,

    /// Shared with every other search run by the same engine, unless cleared in between.
    ttable: &'a mut TTable<P::Key>,

    /// Parameters of this search.
    config: &'a SearchConfig,

    /// Number of nodes entered so far.
    nodes: u64,

    /// When the search started, for the time budget.
    starttime: Instant,
}

impl<'a, P: Rules, E: Evaluate<P>> Search<'a, P, E> {
    /// Prepares a search; nothing is searched until [`Search::start`].
    pub fn new(evaluator: &'a E, ttable: &'a mut TTable<P::Key>, config: &'a SearchConfig) -> Self {
        Self {
            evaluator,
            ttable,
            config,
            nodes: 0,
            starttime: Instant::now(),
        }
    }

    /// Searches `root` according to the config, returning the best move found.
    pub fn start(mut self, root: &P) -> Result<SearchResult<P::Move>, SearchError> {
        if self.config.depth < 1 {
            return Err(SearchError::InvalidDepth(self.config.depth));
        }
        root.validate()?;

        self.starttime = Instant::now();
        let depth = self.config.depth.min(MAX_DEPTH);

        // Nothing to search if the game is already over
        if let Some(reason) = root.terminal()? {
            self.nodes += 1;
            return Ok(SearchResult {
                best_move: None,
                score: Score::terminal(reason, 0),
                nodes: self.nodes,
                terminal: Some(reason),
                stopped: None,
                depth: 0,
            });
        }

        match self.config.algorithm {
            Algorithm::Minimax => self.fixed_depth(root, depth, false),
            Algorithm::AlphaBeta => self.fixed_depth(root, depth, true),
            Algorithm::Greedy => self.fixed_depth(root, 1, true),
            Algorithm::Random => self.random_move(root),
            Algorithm::Iterative => self.iterative_deepening(root, depth),
            Algorithm::Mcts => self.monte_carlo(root, depth),
        }
    }

    /// Searches every root move to `depth`, once.
    fn fixed_depth(
        &mut self,
        root: &P,
        depth: u8,
        prune: bool,
    ) -> Result<SearchResult<P::Move>, SearchError> {
        let iteration = self.search_root(root, depth, prune)?;
        let completed = if iteration.stopped.is_none() {
            self.report(depth, &iteration);
            depth
        } else {
            0
        };

        Ok(SearchResult {
            best_move: iteration.best_move,
            score: iteration.score,
            nodes: self.nodes,
            terminal: None,
            stopped: iteration.stopped,
            depth: completed,
        })
    }

    /// Performs [iterative deepening](https://www.chessprogramming.org/Iterative_Deepening) (ID) on the root position.
    ///
    /// Runs a complete alpha-beta search at depth 1, then depth 2, and so on up to `max_depth`.
    /// If a budget runs out partway through an iteration, that iteration is discarded in favour of the
    /// last one that finished, since a partial search can't be trusted.
    fn iterative_deepening(
        &mut self,
        root: &P,
        max_depth: u8,
    ) -> Result<SearchResult<P::Move>, SearchError> {
        let mut res = SearchResult {
            best_move: None,
            score: -Score::INF,
            nodes: 0,
            terminal: None,
            stopped: None,
            depth: 0,
        };

        for depth in 1..=max_depth {
            let iteration = self.search_root(root, depth, true)?;

            if let Some(reason) = iteration.stopped {
                // Nothing finished, so the partial first iteration is all there is
                if res.depth == 0 {
                    res.best_move = iteration.best_move;
                    res.score = iteration.score;
                }
                res.stopped = Some(reason);
                break;
            }

            self.report(depth, &iteration);
            res.best_move = iteration.best_move;
            res.score = iteration.score;
            res.depth = depth;
        }

        res.nodes = self.nodes;
        Ok(res)
    }

    /// Picks a legal move uniformly at random, seeded by [`SearchConfig::seed`].
    fn random_move(&mut self, root: &P) -> Result<SearchResult<P::Move>, SearchError> {
        self.nodes += 1;
        let moves = root.legal_moves()?;

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let Some(&mv) = moves.choose(&mut rng) else {
            return Err(no_moves_error(root).into());
        };

        // Remember; this is from the opponent's perspective, so we need to negate the score.
        self.nodes += 1;
        let score = -self.leaf(&root.apply(mv)?, 1)?;

        let iteration = Iteration {
            best_move: Some(mv),
            score,
            stopped: None,
        };
        self.report(1, &iteration);

        Ok(SearchResult {
            best_move: Some(mv),
            score,
            nodes: self.nodes,
            terminal: None,
            stopped: None,
            depth: 1,
        })
    }

    /// [Monte Carlo tree search](https://www.chessprogramming.org/Monte-Carlo_Tree_Search) of the root.
    ///
    /// Each simulation descends the tree by UCT, expands one move, and plays random moves from there
    /// until the game ends or `horizon` plies from the root are reached, where the evaluator takes over.
    /// The most visited root move is played, and scored like [`Algorithm::Random`] scores its move.
    fn monte_carlo(&mut self, root: &P, horizon: u8) -> Result<SearchResult<P::Move>, SearchError> {
        self.nodes += 1;
        let mut moves = self.moves(root)?;
        let Some(&first) = moves.first() else {
            return Err(no_moves_error(root).into());
        };
        moves.reverse();

        let mut tree = vec![MctsNode::new(root.clone(), None, None, moves, None, 0)];
        let mut rng = StdRng::seed_from_u64(self.config.seed);

        let mut stopped = None;
        for _ in 0..self.config.simulations {
            match self.simulate(&mut tree, horizon, &mut rng) {
                Ok(()) => {}
                Err(Halt::Fail(err)) => return Err(err),
                Err(Halt::Stop(reason)) => {
                    stopped = Some(reason);
                    break;
                }
            }
        }

        // Most visited root move; the first one expanded wins ties
        let mut best_move = first;
        let mut most_visits = 0;
        for &child in &tree[0].children {
            if tree[child].visits > most_visits {
                most_visits = tree[child].visits;
                best_move = tree[child].mv.unwrap_or(first);
            }
        }

        let score = -self.leaf(&root.apply(best_move)?, 1)?;
        let depth = match stopped {
            Some(_) => 0,
            None => tree.iter().map(|node| node.ply).max().unwrap_or(0),
        };

        let iteration = Iteration {
            best_move: Some(best_move),
            score,
            stopped,
        };
        if stopped.is_none() {
            self.report(depth, &iteration);
        }

        Ok(SearchResult {
            best_move: Some(best_move),
            score,
            nodes: self.nodes,
            terminal: None,
            stopped,
            depth,
        })
    }

    /// One selection, expansion, rollout, and backpropagation pass over `tree`.
    fn simulate(
        &mut self,
        tree: &mut Vec<MctsNode<P>>,
        horizon: u8,
        rng: &mut StdRng,
    ) -> Result<(), Halt> {
        self.check_budget()?;

        let mut current = 0;
        while tree[current].untried.is_empty() && !tree[current].children.is_empty() {
            let parent_visits = tree[current].visits;
            let mut next = tree[current].children[0];
            let mut best_uct = f64::NEG_INFINITY;

            for &child in &tree[current].children {
                let uct = tree[child].uct(parent_visits);
                if uct > best_uct {
                    best_uct = uct;
                    next = child;
                }
            }
            current = next;
        }

        if let Some(mv) = tree[current].untried.pop() {
            self.nodes += 1;
            let position = tree[current].position.apply(mv)?;
            let ply = tree[current].ply + 1;
            let terminal = position.terminal()?;

            // Nodes on the horizon are never expanded, so their moves aren't needed
            let mut untried = Vec::new();
            if terminal.is_none() && ply < horizon {
                untried = self.moves(&position)?;
                if untried.is_empty() {
                    return Err(no_moves_error(&position).into());
                }
                untried.reverse();
            }

            tree.push(MctsNode::new(position, Some(mv), Some(current), untried, terminal, ply));
            let child = tree.len() - 1;
            tree[current].children.push(child);
            current = child;
        }

        let node = &tree[current];
        let reward = match node.terminal {
            Some(reason) => terminal_reward(reason),
            None => self.rollout(&node.position, horizon - node.ply, rng)?,
        };

        // Every node keeps the rewards of the side that moved into it
        let mut reward = -reward;
        let mut next = Some(current);
        while let Some(index) = next {
            let node = &mut tree[index];
            node.visits += 1;
            node.value += reward;
            reward = -reward;
            next = node.parent;
        }

        Ok(())
    }

    /// Plays up to `plies` random moves from `position`.
    ///
    /// Returns the reward of the side to move in `position`, in the range `[-1, 1]`.
    fn rollout(&mut self, position: &P, plies: u8, rng: &mut StdRng) -> Result<f64, Halt> {
        let mut played: Option<P> = None;
        let mut sign = 1.0;

        for _ in 0..plies {
            let here = played.as_ref().unwrap_or(position);
            if let Some(reason) = here.terminal()? {
                return Ok(sign * terminal_reward(reason));
            }

            let moves = here.legal_moves()?;
            let Some(&mv) = moves.choose(rng) else {
                return Err(no_moves_error(here).into());
            };

            self.check_budget()?;
            self.nodes += 1;
            let next = here.apply(mv)?;
            played = Some(next);
            sign = -sign;
        }

        let here = played.as_ref().unwrap_or(position);
        let reward = match here.terminal()? {
            Some(reason) => terminal_reward(reason),
            None => heuristic_reward(self.evaluator.heuristic(here).clamp_eval()),
        };

        Ok(sign * reward)
    }

    /// Searches every move of the (non-terminal) root to `depth`.
    ///
    /// The first move to reach the best score wins ties.
    fn search_root(
        &mut self,
        root: &P,
        depth: u8,
        prune: bool,
    ) -> Result<Iteration<P::Move>, SearchError> {
        self.nodes += 1;
        let moves = self.moves(root)?;
        if moves.is_empty() {
            return Err(no_moves_error(root).into());
        }

        let mut best_move = None;
        let mut best = -Score::INF;
        let mut bounds = SearchBounds::default();

        for &mv in &moves {
            let child = root.apply(mv)?;

            let window = if prune { -bounds } else { SearchBounds::default() };
            let score = match self.negamax(&child, depth - 1, 1, window, prune) {
                Ok(score) => -score,
                Err(Halt::Fail(err)) => return Err(err),
                Err(Halt::Stop(reason)) => {
                    // Stopped before a single move was scored; fall back to the static view of the first move
                    if best_move.is_none() {
                        best_move = Some(moves[0]);
                        best = -self.leaf(&root.apply(moves[0])?, 1)?;
                    }

                    return Ok(Iteration {
                        best_move,
                        score: best,
                        stopped: Some(reason),
                    });
                }
            };

            if score > best {
                best = score;
                best_move = Some(mv);
            }

            if prune {
                bounds.alpha = bounds.alpha.max(best);
            }
        }

        Ok(Iteration {
            best_move,
            score: best,
            stopped: None,
        })
    }

    /// Primary location of search logic.
    ///
    /// Uses the [negamax](https://www.chessprogramming.org/Negamax) algorithm: every node maximizes,
    /// and a child's score is negated on the way back up.
    /// With `prune` unset, every node gets the full window and nothing is cut, which is plain minimax.
    fn negamax(
        &mut self,
        position: &P,
        depth: u8,
        ply: i32,
        bounds: SearchBounds,
        prune: bool,
    ) -> Result<Score, Halt> {
        self.check_budget()?;
        self.nodes += 1;

        if let Some(reason) = position.terminal()? {
            return Ok(Score::terminal(reason, ply));
        }

        if depth == 0 {
            return if self.config.quiescence {
                self.quiescence(position, ply, bounds, prune)
            } else {
                Ok(self.evaluator.heuristic(position).clamp_eval())
            };
        }

        let key = position.key();
        if self.config.use_cache {
            if let Some(score) = self.ttable.probe(key, depth, bounds, ply) {
                return Ok(score);
            }
        }

        let moves = self.moves(position)?;
        if moves.is_empty() {
            return Err(no_moves_error(position).into());
        }

        // Start with a *really bad* initial score
        let mut best = -Score::INF;
        let mut alpha = bounds.alpha;

        for mv in moves {
            let child = position.apply(mv)?;

            let window = if prune {
                SearchBounds::new(-bounds.beta, -alpha)
            } else {
                SearchBounds::default()
            };

            let score = -self.negamax(&child, depth - 1, ply + 1, window, prune)?;
            best = best.max(score);

            if prune {
                alpha = alpha.max(best);

                // Fail high; the opponent will never allow this position
                if alpha >= bounds.beta {
                    break;
                }
            }
        }

        // Only completed nodes are cached
        if self.config.use_cache {
            self.ttable
                .store(key, depth, TTableEntry::new(best, bounds, ply));
        }

        Ok(best)
    }

    /// [Quiescence search](https://www.chessprogramming.org/Quiescence_Search): keep searching captures
    /// past the horizon, so that a leaf is never scored in the middle of an exchange.
    fn quiescence(
        &mut self,
        position: &P,
        ply: i32,
        bounds: SearchBounds,
        prune: bool,
    ) -> Result<Score, Halt> {
        // The frame at depth 0 already counted itself and checked for a terminal position
        let stand_pat = self.evaluator.heuristic(position).clamp_eval();

        if ply >= MAX_PLY as i32 || (prune && stand_pat >= bounds.beta) {
            return Ok(stand_pat);
        }

        let mut best = stand_pat;
        let mut alpha = bounds.alpha.max(stand_pat);

        let mut captures = Vec::new();
        for mv in position.legal_moves()? {
            if position.classify(mv)?.is_capture() {
                captures.push(mv);
            }
        }
        if self.config.move_ordering {
            captures = order(position, captures)?;
        }

        for mv in captures {
            self.check_budget()?;
            self.nodes += 1;

            let child = position.apply(mv)?;
            let window = if prune {
                SearchBounds::new(-bounds.beta, -alpha)
            } else {
                SearchBounds::default()
            };

            let score = match child.terminal()? {
                Some(reason) => -Score::terminal(reason, ply + 1),
                None => -self.quiescence(&child, ply + 1, window, prune)?,
            };
            best = best.max(score);

            if prune {
                alpha = alpha.max(best);
                if alpha >= bounds.beta {
                    break;
                }
            }
        }

        Ok(best)
    }

    /// Score of a position that won't be searched any further.
    fn leaf(&self, position: &P, ply: i32) -> Result<Score, SearchError> {
        match position.terminal()? {
            Some(reason) => Ok(Score::terminal(reason, ply)),
            None => Ok(self.evaluator.heuristic(position).clamp_eval()),
        }
    }

    /// Legal moves of `position`, ordered if the config asks for it.
    fn moves(&self, position: &P) -> Result<Vec<P::Move>, SearchError> {
        let moves = position.legal_moves()?;
        if self.config.move_ordering {
            order(position, moves)
        } else {
            Ok(moves)
        }
    }

    /// Checks the node and time allowances before entering another node.
    #[inline(always)]
    fn check_budget(&self) -> Result<(), Halt> {
        if self
            .config
            .max_nodes
            .is_some_and(|max_nodes| self.nodes >= max_nodes)
        {
            return Err(Halt::Stop(StopReason::NodeLimit));
        }

        if self
            .config
            .time_limit
            .is_some_and(|limit| self.starttime.elapsed() >= limit)
        {
            return Err(Halt::Stop(StopReason::TimeLimit));
        }

        Ok(())
    }

    /// Prints an `info` line for a completed depth, if asked to.
    fn report(&self, depth: u8, iteration: &Iteration<P::Move>) {
        if !self.config.report {
            return;
        }

        let elapsed = self.starttime.elapsed();
        let nps = (self.nodes as f32 / elapsed.as_secs_f32().max(f32::EPSILON)) as u64;
        let pv = iteration
            .best_move
            .map(|mv| mv.to_string())
            .unwrap_or_else(|| String::from("(none)"));

        println!(
            "info depth {depth} score {} nodes {} nps {nps} time {} hashhits {} hashrate {} pv {pv}",
            iteration.score,
            self.nodes,
            elapsed.as_millis(),
            self.ttable.hits(),
            self.ttable.hit_rate(),
        );
    }
}

/// A node of the tree built by [`Algorithm::Mcts`].
struct MctsNode<P: Rules> {
    position: P,

    /// Move that led here from the parent.
    mv: Option<P::Move>,

    parent: Option<usize>,
    children: Vec<usize>,

    /// Moves not yet expanded; the last one is expanded next.
    untried: Vec<P::Move>,

    terminal: Option<TerminalReason>,

    /// Distance from the root.
    ply: u8,

    visits: u32,

    /// Sum of the rewards of the side that moved into this node.
    value: f64,
}

impl<P: Rules> MctsNode<P> {
    fn new(
        position: P,
        mv: Option<P::Move>,
        parent: Option<usize>,
        untried: Vec<P::Move>,
        terminal: Option<TerminalReason>,
        ply: u8,
    ) -> Self {
        Self {
            position,
            mv,
            parent,
            children: Vec::new(),
            untried,
            terminal,
            ply,
            visits: 0,
            value: 0.0,
        }
    }

    /// [UCT](https://www.chessprogramming.org/UCT) value of this node, as seen from its parent.
    fn uct(&self, parent_visits: u32) -> f64 {
        if self.visits == 0 {
            return f64::INFINITY;
        }

        let visits = self.visits as f64;
        self.value / visits + UCT_EXPLORATION * ((parent_visits as f64).ln() / visits).sqrt()
    }
}

/// Reward of the side to move in a finished game: a loss if they are mated, otherwise a draw.
#[inline(always)]
fn terminal_reward(reason: TerminalReason) -> f64 {
    match reason {
        TerminalReason::Checkmate => -1.0,
        _ => 0.0,
    }
}

/// Squashes a heuristic score into a reward strictly between `-HEURISTIC_REWARD` and `HEURISTIC_REWARD`.
#[inline(always)]
fn heuristic_reward(score: Score) -> f64 {
    HEURISTIC_REWARD * (score.0 as f64 / REWARD_SCALE).tanh()
}

/// The rules engine said a position was not over, but offered no moves to play.
fn no_moves_error<P: Rules>(position: &P) -> OracleError {
    OracleError::new(format!(
        "position {:?} is not terminal but has no legal moves",
        position.key()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EndgameEvaluator, Position};

    fn search(fen: &str, config: SearchConfig) -> SearchResult<chessie::Move> {
        let position = Position::from_fen(fen).unwrap();
        let mut ttable = TTable::default();
        Search::new(&EndgameEvaluator, &mut ttable, &config)
            .start(&position)
            .unwrap()
    }

    fn ensure_is_mate_in(fen: &str, config: SearchConfig, moves: i32) {
        let res = search(fen, config);
        assert!(
            res.score.is_mate(),
            "Search on {fen:?} with config {config:#?} produced result that is not mate.\nResult: {res:#?}"
        );
        assert_eq!(
            res.score.moves_to_mate(),
            moves,
            "Search on {fen:?} found {} instead of mate in {moves}",
            res.score
        );
    }

    #[test]
    fn test_white_mate_in_1() {
        let fen = "k7/8/KQ6/8/8/8/8/8 w - - 0 1";
        for algorithm in [Algorithm::Minimax, Algorithm::AlphaBeta, Algorithm::Iterative] {
            let config = SearchConfig {
                algorithm,
                depth: 2,
                ..Default::default()
            };
            ensure_is_mate_in(fen, config, 1);
        }
    }

    #[test]
    fn test_black_mated_in_1() {
        let fen = "1k6/8/KQ6/2Q5/8/8/8/8 b - - 0 1";
        let config = SearchConfig {
            depth: 3,
            ..Default::default()
        };
        ensure_is_mate_in(fen, config, -1);
    }

    #[test]
    fn test_greedy_ignores_depth() {
        let fen = "8/8/4k3/8/8/3K4/8/R7 w - - 0 1";
        let res = search(
            fen,
            SearchConfig {
                algorithm: Algorithm::Greedy,
                depth: 5,
                ..Default::default()
            },
        );

        assert_eq!(res.depth, 1);
        assert!(res.best_move.is_some());

        let one_ply = search(
            fen,
            SearchConfig {
                depth: 1,
                ..Default::default()
            },
        );
        assert_eq!(res.best_move, one_ply.best_move);
        assert_eq!(res.score, one_ply.score);
    }

    #[test]
    fn test_invalid_depth() {
        let position = Position::from_fen("8/8/4k3/8/8/3K4/8/R7 w - - 0 1").unwrap();
        let config = SearchConfig {
            depth: 0,
            ..Default::default()
        };
        let mut ttable = TTable::default();

        let res = Search::new(&EndgameEvaluator, &mut ttable, &config).start(&position);
        assert_eq!(res, Err(SearchError::InvalidDepth(0)));
    }

    #[test]
    fn test_node_limit_returns_best_so_far() {
        let res = search(
            "8/8/4k3/8/8/3K4/8/R7 w - - 0 1",
            SearchConfig {
                depth: 6,
                max_nodes: Some(50),
                ..Default::default()
            },
        );

        assert_eq!(res.stopped, Some(StopReason::NodeLimit));
        assert!(res.best_move.is_some());
        assert!(res.nodes <= 50);
        assert_eq!(res.depth, 0);
    }

    #[test]
    fn test_iterative_keeps_last_completed_depth() {
        let res = search(
            "8/8/4k3/8/8/3K4/8/R7 w - - 0 1",
            SearchConfig {
                algorithm: Algorithm::Iterative,
                depth: 20,
                max_nodes: Some(5_000),
                ..Default::default()
            },
        );

        assert_eq!(res.stopped, Some(StopReason::NodeLimit));
        assert!(res.depth >= 1 && res.depth < 20);
        assert!(res.best_move.is_some());
    }

    #[test]
    fn test_quiescence_sees_the_recapture() {
        // Qxd5 wins a pawn at depth 1, but the rook on d8 takes the queen back
        let fen = "3r2k1/8/8/3p4/8/8/8/3Q2K1 w - - 0 1";
        let quiet = search(
            fen,
            SearchConfig {
                algorithm: Algorithm::Greedy,
                ..Default::default()
            },
        );
        let resolved = search(
            fen,
            SearchConfig {
                algorithm: Algorithm::Greedy,
                quiescence: true,
                ..Default::default()
            },
        );

        assert_eq!(quiet.best_move.map(|mv| mv.to_string()).as_deref(), Some("d1d5"));
        assert_ne!(resolved.best_move, quiet.best_move);
    }

    #[test]
    fn test_algorithm_names() {
        for algorithm in Algorithm::ALL {
            assert_eq!(algorithm.name().parse::<Algorithm>().unwrap(), algorithm);
        }
        assert_eq!("iddfs".parse::<Algorithm>().unwrap(), Algorithm::Iterative);
        assert_eq!("montecarlo".parse::<Algorithm>().unwrap(), Algorithm::Mcts);
        assert!("expectimax".parse::<Algorithm>().is_err());
    }

    #[test]
    fn test_stopped_root_scores_the_first_move() {
        let position = Position::from_fen("8/8/4k3/8/8/3K4/8/R7 w - - 0 1").unwrap();
        let config = SearchConfig {
            depth: 4,
            max_nodes: Some(1),
            ..Default::default()
        };
        let mut ttable = TTable::default();
        let res = Search::new(&EndgameEvaluator, &mut ttable, &config)
            .start(&position)
            .unwrap();

        let first = order(&position, position.legal_moves().unwrap()).unwrap()[0];
        let child = position.apply(first).unwrap();

        assert_eq!(res.stopped, Some(StopReason::NodeLimit));
        assert_eq!(res.best_move, Some(first));
        assert_eq!(res.score, -EndgameEvaluator.evaluate(&child).unwrap());
    }

    #[test]
    fn test_mcts_finds_mate_in_1() {
        let res = search(
            "k7/8/KQ6/8/8/8/8/8 w - - 0 1",
            SearchConfig {
                algorithm: Algorithm::Mcts,
                depth: 2,
                simulations: 400,
                ..Default::default()
            },
        );

        let position = Position::from_fen("k7/8/KQ6/8/8/8/8/8 w - - 0 1").unwrap();
        let mated = position.apply(res.best_move.unwrap()).unwrap();
        assert_eq!(mated.terminal().unwrap(), Some(TerminalReason::Checkmate));
        assert_eq!(res.score, Score::MATE - 1);
    }

    #[test]
    fn test_mcts_is_seeded() {
        let krk = "8/8/4k3/8/8/3K4/8/R7 w - - 0 1";
        let config = SearchConfig {
            algorithm: Algorithm::Mcts,
            depth: 6,
            simulations: 150,
            seed: 99,
            ..Default::default()
        };

        let first = search(krk, config);
        let second = search(krk, config);
        assert_eq!(first, second);
        assert!(first.depth >= 1 && first.depth <= 6);

        let stopped = search(
            krk,
            SearchConfig {
                max_nodes: Some(40),
                ..config
            },
        );
        assert_eq!(stopped.stopped, Some(StopReason::NodeLimit));
        assert!(stopped.best_move.is_some());
        assert!(stopped.nodes <= 40);
    }
}
