/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

mod common;

use common::{arb_tree, Tree, TreeEvaluator, TreePosition, FAILURE};
use newt::{Algorithm, Engine, OracleError, SearchConfig, SearchError};
use proptest::prelude::*;

fn engine() -> Engine<TreePosition, TreeEvaluator> {
    Engine::new(TreeEvaluator)
}

fn config(algorithm: Algorithm, depth: u8) -> SearchConfig {
    SearchConfig {
        algorithm,
        depth,
        ..Default::default()
    }
}

proptest! {
    #[test]
    fn test_alphabeta_agrees_with_minimax(tree in arb_tree()) {
        let depth = tree.max_depth();
        let root = TreePosition::root(tree);

        for move_ordering in [false, true] {
            let minimax = SearchConfig { use_cache: false, move_ordering, ..config(Algorithm::Minimax, depth) };
            let alphabeta = SearchConfig { algorithm: Algorithm::AlphaBeta, ..minimax };

            let full = engine().search(&root, &minimax).unwrap();
            let pruned = engine().search(&root, &alphabeta).unwrap();

            prop_assert_eq!(full.score, pruned.score);
            prop_assert_eq!(full.best_move, pruned.best_move);
            prop_assert!(pruned.nodes <= full.nodes, "{} > {}", pruned.nodes, full.nodes);
        }
    }

    #[test]
    fn test_cache_never_changes_the_result(tree in arb_tree()) {
        let depth = tree.max_depth();
        let root = TreePosition::root(tree);

        for algorithm in [Algorithm::Minimax, Algorithm::AlphaBeta, Algorithm::Iterative] {
            let cached = config(algorithm, depth);
            let uncached = SearchConfig { use_cache: false, ..cached };

            let with = engine().search(&root, &cached).unwrap();
            let without = engine().search(&root, &uncached).unwrap();

            prop_assert_eq!(with.score, without.score);
            prop_assert_eq!(with.best_move, without.best_move);
            prop_assert!(with.nodes <= without.nodes, "{algorithm}: {} > {}", with.nodes, without.nodes);
        }
    }

    #[test]
    fn test_ordering_never_changes_the_score(tree in arb_tree()) {
        let depth = tree.max_depth();
        let root = TreePosition::root(tree);

        for algorithm in [Algorithm::Minimax, Algorithm::AlphaBeta, Algorithm::Greedy] {
            let ordered = config(algorithm, depth);
            let unordered = SearchConfig { move_ordering: false, ..ordered };

            let a = engine().search(&root, &ordered).unwrap();
            let b = engine().search(&root, &unordered).unwrap();
            prop_assert_eq!(a.score, b.score);
        }
    }

    #[test]
    fn test_searches_are_deterministic(tree in arb_tree(), seed in any::<u64>()) {
        let depth = tree.max_depth();
        let root = TreePosition::root(tree);

        for algorithm in Algorithm::ALL {
            let config = SearchConfig { seed, ..config(algorithm, depth) };
            let first = engine().search(&root, &config).unwrap();
            let second = engine().search(&root, &config).unwrap();
            prop_assert_eq!(first, second);
        }
    }

    #[test]
    fn test_mcts_plays_a_root_move(tree in arb_tree(), seed in any::<u64>(), simulations in 0u32..64) {
        let depth = tree.max_depth();
        let root = TreePosition::root(tree);
        let config = SearchConfig { seed, simulations, ..config(Algorithm::Mcts, depth) };

        let res = engine().search(&root, &config).unwrap();
        let mv = res.best_move.unwrap();
        prop_assert!(root.tree.nodes[0].children.contains(&mv.0));
        prop_assert!(res.depth <= depth);
    }

    #[test]
    fn test_random_moves_are_legal(tree in arb_tree(), seed in any::<u64>()) {
        let root = TreePosition::root(tree);
        let res = engine().search(&root, &SearchConfig { seed, ..config(Algorithm::Random, 1) }).unwrap();

        let mv = res.best_move.unwrap();
        prop_assert!(root.tree.nodes[0].children.contains(&mv.0));
    }
}

/// Root with two replies, where the second only looks better at one ply.
fn small_tree() -> Tree {
    Tree::from_layers(vec![
        vec![(0, vec![0, 1], 0, false)],
        vec![(50, vec![0], 0, false), (-300, vec![0, 1], 0, true)],
        vec![(10, vec![0], 0, false), (-20, vec![0], 0, false)],
    ])
}

#[test]
fn test_oracle_errors_propagate_unchanged() {
    let expected = SearchError::Oracle(OracleError::new(FAILURE));

    // Fails at the root, before any algorithm can pick a move
    let root = TreePosition::root(small_tree()).failing_at(0);
    for algorithm in Algorithm::ALL {
        let res = engine().search(&root, &config(algorithm, 2));
        assert_eq!(res, Err(expected.clone()), "{algorithm}");
    }

    // Fails below the root, which full-width minimax always reaches
    let root = TreePosition::root(small_tree()).failing_at(2);
    let res = engine().search(&root, &config(Algorithm::Minimax, 2));
    assert_eq!(res, Err(expected));
}

#[test]
fn test_small_tree_best_move() {
    let root = TreePosition::root(small_tree());

    // One ply deep, the reply leaving the opponent at -300 looks best
    let greedy = engine().search(&root, &config(Algorithm::Greedy, 4)).unwrap();
    assert_eq!(greedy.best_move.map(|mv| mv.0), Some(2));
    assert_eq!(greedy.score.0, 300);
    assert_eq!(greedy.depth, 1);

    // Two plies deep, n2 lets the opponent escape to n4, so n1 is better
    let deep = engine().search(&root, &config(Algorithm::AlphaBeta, 2)).unwrap();
    assert_eq!(deep.score.0, 10);
    assert_eq!(deep.best_move.map(|mv| mv.0), Some(1));

    let full = engine().search(&root, &config(Algorithm::Minimax, 2)).unwrap();
    assert_eq!(full.score, deep.score);
    assert_eq!(full.best_move, deep.best_move);
}

#[test]
fn test_mcts_sees_past_the_first_ply() {
    // n2 looks best after one ply, but the opponent answers it with n4
    let tree = Tree::from_layers(vec![
        vec![(0, vec![0, 1], 0, false)],
        vec![(-100, vec![0], 0, false), (-300, vec![0, 1], 0, true)],
        vec![(200, vec![0], 0, false), (-800, vec![0], 0, false)],
    ]);
    let root = TreePosition::root(tree);

    let greedy = engine().search(&root, &config(Algorithm::Greedy, 2)).unwrap();
    assert_eq!(greedy.best_move.map(|mv| mv.0), Some(2));

    let config = SearchConfig {
        simulations: 200,
        seed: 7,
        ..config(Algorithm::Mcts, 2)
    };
    let res = engine().search(&root, &config).unwrap();
    assert_eq!(res.best_move.map(|mv| mv.0), Some(1));
    assert_eq!(res.score.0, 100);
    assert_eq!(res.depth, 2);
}

#[test]
fn test_invalid_depth_is_rejected() {
    let root = TreePosition::root(small_tree());
    for algorithm in Algorithm::ALL {
        let res = engine().search(&root, &config(algorithm, 0));
        assert_eq!(res, Err(SearchError::InvalidDepth(0)));
    }
}
