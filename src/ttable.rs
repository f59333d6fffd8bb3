/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{collections::HashMap, hash::Hash};

use crate::{Score, SearchBounds};

/// Kind of score held by a cache entry.
///
/// See [CPW](https://www.chessprogramming.org/Node_Types) for more.
#[derive(PartialEq, Eq, Clone, Copy, Debug, Hash)]
pub enum Bound {
    /// The score is exact.
    Exact,

    /// The true score is at least this score (the node failed high).
    Lower,

    /// The true score is at most this score (the node failed low).
    Upper,
}

impl Bound {
    /// Classifies a fail-soft `score` against the window it was searched with:
    ///
    /// ```text
    /// if score <= alpha:
    ///     UPPER
    /// else if score >= beta:
    ///     LOWER
    /// else:
    ///     EXACT
    /// ```
    #[inline(always)]
    pub fn new(score: Score, bounds: SearchBounds) -> Self {
        if score <= bounds.alpha {
            Self::Upper
        } else if score >= bounds.beta {
            Self::Lower
        } else {
            Self::Exact
        }
    }
}

/// An entry into the cache.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub struct TTableEntry {
    /// Score of the node, relative to the node itself if it was a mate score.
    pub score: Score,

    /// What `score` means.
    pub bound: Bound,
}

impl TTableEntry {
    /// Creates a new [`TTableEntry`] for a node `ply` plies away from the root.
    ///
    /// The bound is derived through [`Bound::new`] before the score is re-based onto the node.
    #[inline(always)]
    pub fn new(score: Score, bounds: SearchBounds, ply: i32) -> Self {
        let bound = Bound::new(score, bounds);

        Self {
            score: score.relative(ply),
            bound,
        }
    }

    /// Determine whether the score in this entry can be used and, if so, return it.
    ///
    /// An entry's score can be used if and only if:
    ///     1. The entry is exact ([`Bound::Exact`]).
    ///     2. The entry is an upper bound ([`Bound::Upper`]) and its score is `<= alpha`.
    ///     3. The entry is a lower bound ([`Bound::Lower`]) and its score is `>= beta`.
    #[inline(always)]
    pub fn try_score(&self, bounds: SearchBounds, ply: i32) -> Option<Score> {
        // Adjust mate scores to be relative to the root again
        let score = self.score.absolute(ply);

        (self.bound == Bound::Exact
            || (self.bound == Bound::Upper && score <= bounds.alpha)
            || (self.bound == Bound::Lower && score >= bounds.beta))
            .then_some(score)
    }
}

/// Transposition Table.
///
/// Used during a search to keep track of previous results on positions, avoiding unnecessary re-computations.
///
/// Entries are keyed by the position *and* the remaining depth it was searched to,
/// so a hit always comes from a search exactly as deep as the one it replaces.
#[derive(Debug)]
pub struct TTable<K> {
    /// Internal cache of the TTable.
    cache: HashMap<(K, u8), TTableEntry>,

    /// Maximum number of entries this table will hold.
    capacity: usize,

    /// Number of lookups since last clearing.
    accesses: u64,

    /// Number of lookups that produced a usable score since last clearing.
    hits: u64,
}

impl<K: Copy + Eq + Hash> TTable<K> {
    /// Default number of entries a [`TTable`] can hold.
    pub const DEFAULT_CAPACITY: usize = 1 << 20;

    /// Create a new [`TTable`] that can hold `capacity` entries.
    #[inline(always)]
    pub fn from_capacity(capacity: usize) -> Self {
        Self {
            cache: HashMap::new(),
            capacity,
            accesses: 0,
            hits: 0,
        }
    }

    /// Clears the entries of this [`TTable`].
    #[inline(always)]
    pub fn clear(&mut self) {
        self.cache.clear();
        self.accesses = 0;
        self.hits = 0;
    }

    /// Returns the number of entries that can fit within this [`TTable`]
    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of entries in this [`TTable`].
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Returns `true` if nothing has been stored since the last clear.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Number of successful lookups since the last clear.
    #[inline(always)]
    pub fn hits(&self) -> u64 {
        self.hits
    }

    /// Number of lookups since the last clear, successful or not.
    #[inline(always)]
    pub fn accesses(&self) -> u64 {
        self.accesses
    }

    /// Per mille of lookups since the last clear that produced a usable score.
    #[inline(always)]
    pub fn hit_rate(&self) -> u64 {
        (self.hits * 1000).checked_div(self.accesses).unwrap_or_default()
    }

    /// Get the entry for `key` searched to `depth`, if one exists.
    #[inline(always)]
    pub fn get(&self, key: K, depth: u8) -> Option<&TTableEntry> {
        self.cache.get(&(key, depth))
    }

    /// Look up a usable score for `key` at `depth`, given the current window and ply.
    pub fn probe(&mut self, key: K, depth: u8, bounds: SearchBounds, ply: i32) -> Option<Score> {
        self.accesses += 1;
        let score = self.get(key, depth)?.try_score(bounds, ply)?;
        self.hits += 1;
        Some(score)
    }

    /// Store `entry` for `key` at `depth`, returning whatever was there.
    ///
    /// A full table still accepts overwrites of existing keys, but new keys are dropped.
    #[inline(always)]
    pub fn store(&mut self, key: K, depth: u8, entry: TTableEntry) -> Option<TTableEntry> {
        if self.cache.len() >= self.capacity && !self.cache.contains_key(&(key, depth)) {
            return None;
        }

        self.cache.insert((key, depth), entry)
    }
}

impl<K: Copy + Eq + Hash> Default for TTable<K> {
    #[inline(always)]
    fn default() -> Self {
        Self::from_capacity(Self::DEFAULT_CAPACITY)
    }
}
