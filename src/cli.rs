/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::PathBuf,
    time::Duration,
};

use anyhow::{Context, Result};
use clap::{builder::PossibleValue, Parser, Subcommand, ValueEnum};
use rand::{rngs::StdRng, SeedableRng};

use crate::{
    load_fens, random_endgame_fen, run_batch, Algorithm, ChessEngine, MatchConfig, PlayerSpec,
    Position, SearchConfig, DEFAULT_MAX_PLIES, DEFAULT_SIMULATIONS,
};

/// Searches chess endgames and pits search algorithms against each other.
#[derive(Debug, Clone, Parser)]
#[command(version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// A command to be run by the engine.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Search a position and print the best move found.
    #[command(alias = "go")]
    Search {
        /// FEN of the position to search.
        fen: String,

        /// Which search to run.
        #[arg(short, long, default_value = "alphabeta")]
        algorithm: Algorithm,

        /// Depth to search to, in plies.
        #[arg(short, long, default_value = "3")]
        depth: u8,

        /// Disable the transposition table.
        #[arg(long, default_value = "false")]
        no_cache: bool,

        /// Keep the transposition table of earlier searches.
        #[arg(long, default_value = "false")]
        persistent_cache: bool,

        /// Search moves in the order the rules engine generates them.
        #[arg(long, default_value = "false")]
        no_ordering: bool,

        /// Resolve captures at the horizon before evaluating.
        #[arg(short, long, default_value = "false")]
        quiescence: bool,

        /// Stop after visiting this many nodes.
        #[arg(long, required = false)]
        nodes: Option<u64>,

        /// Stop after this many milliseconds.
        #[arg(long, required = false)]
        movetime: Option<u64>,

        /// Seed for the random player and the Monte Carlo rollouts.
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Number of Monte Carlo simulations.
        #[arg(long, default_value_t = DEFAULT_SIMULATIONS)]
        simulations: u32,
    },

    /// Print a static evaluation of a position.
    Eval {
        /// FEN of the position to evaluate.
        fen: String,

        /// If set, every term of the evaluation will be printed in a table.
        #[arg(short, long, default_value = "false")]
        pretty: bool,
    },

    /// Play a batch of games between two players and print the results.
    #[command(aliases = ["match", "tournament"])]
    Play {
        /// Player with the White pieces, as `ALGORITHM[:DEPTH]`.
        #[arg(short, long, default_value = "alphabeta:3")]
        white: PlayerSpec,

        /// Player with the Black pieces, as `ALGORITHM[:DEPTH]`.
        #[arg(short, long, default_value = "alphabeta:3")]
        black: PlayerSpec,

        /// File of starting FENs, one per line. Random endgames are played if omitted.
        #[arg(short, long, required = false)]
        fens: Option<PathBuf>,

        /// Number of random endgames to play when no FEN file was given.
        #[arg(short = 'n', long, default_value = "10")]
        games: usize,

        /// Seed for the random endgames and the random players.
        #[arg(short, long, default_value = "0")]
        seed: u64,

        /// Games still going after this many plies are drawn.
        #[arg(long, default_value_t = DEFAULT_MAX_PLIES)]
        max_plies: usize,

        /// Extend both players' searches with quiescence.
        #[arg(short, long, default_value = "false")]
        quiescence: bool,

        /// Node budget of every move.
        #[arg(long, required = false)]
        nodes: Option<u64>,

        /// Number of simulations of Monte Carlo players.
        #[arg(long, default_value_t = DEFAULT_SIMULATIONS)]
        simulations: u32,

        /// Write the per-game results here instead of to stdout.
        #[arg(short, long, required = false)]
        output: Option<PathBuf>,

        /// Print every move of every game.
        #[arg(short, long, default_value = "false")]
        verbose: bool,
    },

    /// Print random endgame positions.
    #[command(alias = "gen")]
    Generate {
        /// Number of positions to print.
        #[arg(short = 'n', long, default_value = "1")]
        count: usize,

        /// Seed of the generator.
        #[arg(short, long, default_value = "0")]
        seed: u64,

        /// Fewest pieces on the board, kings included.
        #[arg(long, default_value = "3")]
        min_pieces: usize,

        /// Most pieces on the board, kings included.
        #[arg(long, default_value = "6")]
        max_pieces: usize,
    },

    /// Run a benchmark with the provided parameters.
    Bench {
        /// If set, the benchmarking results will be printed in a well-formatted table.
        #[arg(short, long, default_value = "false")]
        pretty: bool,

        /// Override the default benchmark depth.
        #[arg(short, long, required = false)]
        depth: Option<u8>,
    },
}

impl Cli {
    /// Executes the parsed command.
    pub fn run(self) -> Result<()> {
        match self.command {
            Command::Search {
                fen,
                algorithm,
                depth,
                no_cache,
                persistent_cache,
                no_ordering,
                quiescence,
                nodes,
                movetime,
                seed,
                simulations,
            } => {
                let position = Position::from_fen(&fen)?;
                let config = SearchConfig {
                    algorithm,
                    depth,
                    use_cache: !no_cache,
                    persistent_cache,
                    move_ordering: !no_ordering,
                    quiescence,
                    max_nodes: nodes,
                    time_limit: movetime.map(Duration::from_millis),
                    seed,
                    simulations,
                    report: true,
                };

                let res = ChessEngine::default().search(&position, &config)?;
                println!("{res}");
            }

            Command::Eval { fen, pretty } => {
                let position = Position::from_fen(&fen)?;
                ChessEngine::default().eval(&position, pretty)?;
            }

            Command::Play {
                white,
                black,
                fens,
                games,
                seed,
                max_plies,
                quiescence,
                nodes,
                simulations,
                output,
                verbose,
            } => {
                let starts = match fens {
                    Some(path) => load_fens(path)?,
                    None => {
                        let mut rng = StdRng::seed_from_u64(seed);
                        (0..games)
                            .map(|_| random_endgame_fen(&mut rng, 3, 6))
                            .collect::<Result<Vec<_>>>()?
                    }
                };

                let config = MatchConfig {
                    max_plies,
                    verbose,
                    seed,
                    quiescence,
                    max_nodes: nodes,
                    simulations,
                };

                let writer: Box<dyn Write> = match &output {
                    Some(path) => Box::new(BufWriter::new(File::create(path).with_context(
                        || format!("Failed to create results file {}", path.display()),
                    )?)),
                    None => Box::new(io::stdout().lock()),
                };

                let summary = run_batch(&starts, white, black, &config, writer)?;
                println!("\n{summary}");
            }

            Command::Generate {
                count,
                seed,
                min_pieces,
                max_pieces,
            } => {
                let mut rng = StdRng::seed_from_u64(seed);
                for _ in 0..count {
                    println!("{}", random_endgame_fen(&mut rng, min_pieces, max_pieces)?);
                }
            }

            Command::Bench { pretty, depth } => {
                ChessEngine::default().bench(depth, pretty)?;
            }
        }

        Ok(())
    }
}

impl ValueEnum for Algorithm {
    fn value_variants<'a>() -> &'a [Self] {
        &Self::ALL
    }

    fn to_possible_value(&self) -> Option<PossibleValue> {
        let value = PossibleValue::new(self.name());

        // Some algorithms have additional aliases
        let value = match self {
            Self::AlphaBeta => value.aliases(["alpha-beta", "ab"]),
            Self::Iterative => value.aliases(["iddfs", "id"]),
            Self::Mcts => value.alias("montecarlo"),
            _ => value,
        };

        Some(value)
    }
}
