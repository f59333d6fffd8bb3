/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{fmt, io::Write, str::FromStr};

use anyhow::{bail, Context, Result};
use chessie::Color;

use crate::{
    Algorithm, ChessEngine, Position, Rules, SearchConfig, TerminalReason, DEFAULT_SIMULATIONS,
};

/// Default number of plies a game may last before it is called a draw.
pub const DEFAULT_MAX_PLIES: usize = 100;

/// Search depth of a player given without one.
const DEFAULT_PLAYER_DEPTH: u8 = 3;

/// One side of a match: which search to run, and how deep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlayerSpec {
    pub algorithm: Algorithm,
    pub depth: u8,
}

impl PlayerSpec {
    /// Creates a new [`PlayerSpec`].
    #[inline(always)]
    pub const fn new(algorithm: Algorithm, depth: u8) -> Self {
        Self { algorithm, depth }
    }

    /// The search config this player uses for its move on ply `ply` of a game.
    ///
    /// The seed changes every ply so random players do not keep repeating themselves.
    pub fn to_config(&self, config: &MatchConfig, ply: usize) -> SearchConfig {
        SearchConfig {
            algorithm: self.algorithm,
            depth: self.depth,
            quiescence: config.quiescence,
            max_nodes: config.max_nodes,
            seed: config.seed.wrapping_add(ply as u64),
            simulations: config.simulations,
            ..Default::default()
        }
    }
}

impl FromStr for PlayerSpec {
    type Err = anyhow::Error;

    /// Parses `ALGORITHM[:DEPTH]`, such as `alphabeta:4` or `random`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (algorithm, depth) = match s.split_once(':') {
            Some((algorithm, depth)) => {
                let depth = depth
                    .trim()
                    .parse()
                    .with_context(|| format!("Invalid depth in player {s:?}"))?;
                (algorithm, depth)
            }
            None => (s, DEFAULT_PLAYER_DEPTH),
        };

        if depth == 0 {
            bail!("Player {s:?} must search to a depth of at least 1");
        }

        Ok(Self::new(algorithm.trim().parse()?, depth))
    }
}

impl fmt::Display for PlayerSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.depth)
    }
}

/// Settings shared by every game of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MatchConfig {
    /// A game still going after this many plies is a draw.
    pub max_plies: usize,

    /// Print every move as it is played.
    pub verbose: bool,

    /// Base seed handed to both players' searches.
    pub seed: u64,

    /// Whether both players extend their searches with quiescence.
    pub quiescence: bool,

    /// Node budget for every move, if any.
    pub max_nodes: Option<u64>,

    /// Number of simulations of Monte Carlo players.
    pub simulations: u32,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            max_plies: DEFAULT_MAX_PLIES,
            verbose: false,
            seed: 0,
            quiescence: false,
            max_nodes: None,
            simulations: DEFAULT_SIMULATIONS,
        }
    }
}

/// Why a game ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Termination {
    /// The rules ended the game.
    Terminal(TerminalReason),

    /// The game hit the match's ply limit.
    MoveLimit,
}

impl Termination {
    /// Every way a game can end, in the order summaries list them.
    pub const ALL: [Self; 6] = [
        Self::Terminal(TerminalReason::Checkmate),
        Self::Terminal(TerminalReason::Stalemate),
        Self::Terminal(TerminalReason::InsufficientMaterial),
        Self::Terminal(TerminalReason::ThreefoldRepetition),
        Self::Terminal(TerminalReason::FiftyMoveRule),
        Self::MoveLimit,
    ];

    pub const fn name(&self) -> &'static str {
        match self {
            Self::Terminal(reason) => reason.name(),
            Self::MoveLimit => "move_limit",
        }
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Final result of a game, from White's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GameResult {
    WhiteWins,
    BlackWins,
    Draw,
}

impl GameResult {
    /// Result of a game that ended in checkmate, where `mated` is the side that got mated.
    #[inline(always)]
    pub const fn mated(mated: Color) -> Self {
        match mated {
            Color::White => Self::BlackWins,
            Color::Black => Self::WhiteWins,
        }
    }
}

impl fmt::Display for GameResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::WhiteWins => "1-0",
            Self::BlackWins => "0-1",
            Self::Draw => "1/2-1/2",
        };
        write!(f, "{s}")
    }
}

/// Everything worth keeping about a finished game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameRecord {
    /// 1-based index of this game within its batch.
    pub game: usize,
    pub start_fen: String,
    pub white: PlayerSpec,
    pub black: PlayerSpec,
    pub white_pieces: usize,
    pub black_pieces: usize,
    pub result: GameResult,
    pub termination: Termination,
    pub plies: usize,
    pub white_nodes: u64,
    pub black_nodes: u64,
}

impl GameRecord {
    /// Column names of [`GameRecord::to_csv_row`].
    pub const HEADER: &'static str = "game,fen,white,black,white_pieces,black_pieces,pieces,result,termination,plies,white_nodes,black_nodes";

    /// This record as one comma-delimited line, without a trailing newline.
    pub fn to_csv_row(&self) -> String {
        format!(
            "{},{},{},{},{},{},{},{},{},{},{},{}",
            self.game,
            self.start_fen,
            self.white,
            self.black,
            self.white_pieces,
            self.black_pieces,
            self.white_pieces + self.black_pieces,
            self.result,
            self.termination,
            self.plies,
            self.white_nodes,
            self.black_nodes,
        )
    }
}

/// Plays a single game from `start` between `white` and `black`.
///
/// Each player gets a fresh engine. The game ends when the rules say so (threefold repetition is
/// tracked across the moves played here), or after `config.max_plies` plies.
pub fn play_game(
    start: &Position,
    white: PlayerSpec,
    black: PlayerSpec,
    config: &MatchConfig,
) -> Result<GameRecord> {
    let mut engines = [ChessEngine::default(), ChessEngine::default()];
    let players = [white, black];
    let mut nodes = [0; Color::COUNT];

    let mut position = start.clone();
    let mut plies = 0;

    let termination = loop {
        if let Some(reason) = position.terminal()? {
            break Termination::Terminal(reason);
        }
        if plies >= config.max_plies {
            break Termination::MoveLimit;
        }

        let stm = position.side_to_move();
        let side = stm.name();
        let player = players[stm.index()];
        let res = engines[stm.index()]
            .search(&position, &player.to_config(config, plies))
            .with_context(|| format!("{side} ({player}) failed to search {}", position.to_fen()))?;
        nodes[stm.index()] += res.nodes;

        let Some(mv) = res.best_move else {
            bail!("{side} ({player}) found no move in {}", position.to_fen());
        };

        if config.verbose {
            println!("ply {:>3}: {side} ({player}) plays {mv} [{}]", plies + 1, res.score);
        }

        position = position.play(mv)?;
        plies += 1;
    };

    let result = match termination {
        Termination::Terminal(TerminalReason::Checkmate) => {
            GameResult::mated(position.side_to_move())
        }
        _ => GameResult::Draw,
    };

    if config.verbose {
        println!("{result} by {termination} after {plies} plies: {}", position.to_fen());
    }

    Ok(GameRecord {
        game: 1,
        start_fen: start.to_fen(),
        white,
        black,
        white_pieces: start.piece_count(Color::White),
        black_pieces: start.piece_count(Color::Black),
        result,
        termination,
        plies,
        white_nodes: nodes[Color::White.index()],
        black_nodes: nodes[Color::Black.index()],
    })
}

/// Aggregate results of a batch of games.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BatchSummary {
    pub white: Option<PlayerSpec>,
    pub black: Option<PlayerSpec>,
    pub white_wins: usize,
    pub black_wins: usize,
    pub draws: usize,

    /// Games that could not be played, such as ones with an invalid starting position.
    pub failed: usize,

    /// Number of games that ended for each reason, indexed like [`Termination::ALL`].
    pub terminations: [usize; Termination::ALL.len()],

    pub total_plies: usize,
}

impl BatchSummary {
    /// Number of games that were played to completion.
    #[inline(always)]
    pub fn games(&self) -> usize {
        self.white_wins + self.black_wins + self.draws
    }

    /// Number of completed games that ended because of `termination`.
    pub fn count(&self, termination: Termination) -> usize {
        Termination::ALL
            .iter()
            .position(|&t| t == termination)
            .map_or(0, |i| self.terminations[i])
    }

    /// Mean length of the completed games, in plies.
    pub fn average_plies(&self) -> f32 {
        if self.games() == 0 {
            return 0.0;
        }
        self.total_plies as f32 / self.games() as f32
    }

    /// Adds a finished game to the totals.
    pub fn record(&mut self, record: &GameRecord) {
        match record.result {
            GameResult::WhiteWins => self.white_wins += 1,
            GameResult::BlackWins => self.black_wins += 1,
            GameResult::Draw => self.draws += 1,
        }

        if let Some(i) = Termination::ALL
            .iter()
            .position(|&t| t == record.termination)
        {
            self.terminations[i] += 1;
        }

        self.total_plies += record.plies;
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = |player: Option<PlayerSpec>| player.map_or(String::from("?"), |p| p.to_string());

        writeln!(f, "+--- Match Summary ---------------+")?;
        writeln!(f, "| games       : {:<18}|", self.games())?;
        writeln!(f, "| white wins  : {:<18}|", format!("{} ({})", self.white_wins, name(self.white)))?;
        writeln!(f, "| black wins  : {:<18}|", format!("{} ({})", self.black_wins, name(self.black)))?;
        writeln!(f, "| draws       : {:<18}|", self.draws)?;
        if self.failed > 0 {
            writeln!(f, "| failed      : {:<18}|", self.failed)?;
        }
        writeln!(f, "| avg. plies  : {:<18.1}|", self.average_plies())?;
        writeln!(f, "+--- Endings ---------------------+")?;
        for (termination, count) in Termination::ALL.iter().zip(self.terminations) {
            writeln!(f, "| {:<22}: {count:<8}|", termination.name())?;
        }
        write!(f, "+---------------------------------+")
    }
}

/// Plays one game from each FEN in `starts`, writing a header and one row per finished game to `writer`.
///
/// Games that cannot be played are reported on stderr and skipped.
pub fn run_batch<S: AsRef<str>>(
    starts: &[S],
    white: PlayerSpec,
    black: PlayerSpec,
    config: &MatchConfig,
    mut writer: impl Write,
) -> Result<BatchSummary> {
    let mut summary = BatchSummary {
        white: Some(white),
        black: Some(black),
        ..Default::default()
    };

    writeln!(writer, "{}", GameRecord::HEADER).context("Failed to write results header")?;

    for (i, fen) in starts.iter().enumerate() {
        let fen = fen.as_ref();
        if config.verbose {
            println!("Game {}/{}: {fen}", i + 1, starts.len());
        }

        let game = Position::from_fen(fen)
            .map_err(anyhow::Error::from)
            .and_then(|start| play_game(&start, white, black, config));

        let mut record = match game {
            Ok(record) => record,
            Err(e) => {
                eprintln!("Game {} ({fen}) failed: {e:#}", i + 1);
                summary.failed += 1;
                continue;
            }
        };
        record.game = i + 1;

        writeln!(writer, "{}", record.to_csv_row())
            .with_context(|| format!("Failed to write result of game {}", i + 1))?;
        summary.record(&record);
    }

    writer.flush().context("Failed to flush results")?;
    Ok(summary)
}
