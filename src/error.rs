/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{error::Error, fmt};

/// A failure reported by the rules engine while enumerating or applying moves.
///
/// The search never inspects or alters these; it hands them back to the caller as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleError {
    message: String,
}

impl OracleError {
    /// Constructs a new [`OracleError`] with the provided description.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The description given by the rules engine.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for OracleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rules engine error: {}", self.message)
    }
}

impl Error for OracleError {}

impl From<anyhow::Error> for OracleError {
    fn from(value: anyhow::Error) -> Self {
        Self::new(format!("{value:#}"))
    }
}

/// Every way a call into the search core can fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchError {
    /// The position handed to the evaluator or the search is not a position we can play from.
    InvalidPosition(String),

    /// Searches must be at least one ply deep.
    InvalidDepth(u8),

    /// The rules engine failed; propagated unchanged.
    Oracle(OracleError),
}

impl fmt::Display for SearchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidPosition(reason) => write!(f, "invalid position: {reason}"),
            Self::InvalidDepth(depth) => {
                write!(f, "invalid search depth {depth}: depth must be at least 1")
            }
            Self::Oracle(err) => err.fmt(f),
        }
    }
}

impl Error for SearchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Oracle(err) => Some(err),
            _ => None,
        }
    }
}

impl From<OracleError> for SearchError {
    #[inline(always)]
    fn from(value: OracleError) -> Self {
        Self::Oracle(value)
    }
}
