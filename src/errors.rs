// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The error type shared by every fallible operation in the crate.
//! The mapper and the evaluator are total functions and never
//! produce one of these; only request validation, partitioning and
//! the worker barrier do.

use crate::cache::CacheKey;
use crate::tiles::Tile;

/// Everything that can go wrong while computing a frame.
#[derive(Debug, Fail)]
pub enum Error {
    /// The frame request, the configuration, or the tile set handed
    /// to the pool was unusable.  Raised before any work is queued.
    #[fail(display = "invalid request: {}", reason)]
    InvalidRequest {
        /// What was wrong with it.
        reason: String,
    },

    /// A single tile could not be computed.
    #[fail(display = "worker failed on tile {}: {}", tile, reason)]
    WorkerFailure {
        /// The bounds of the tile that failed.
        tile: Tile,
        /// Why it failed.
        reason: String,
    },

    /// At least one tile failed, so the frame as a whole is unusable.
    #[fail(display = "frame failed: one or more tiles did not complete")]
    FrameFailed {
        /// Every per-tile failure collected at the barrier.
        failures: Vec<Error>,
    },

    /// The memo cache handed back a state it should never have stored.
    #[fail(display = "cache entry at {:?} holds a state that never escaped", key)]
    CacheCorruption {
        /// The quantized coordinate of the bad entry.
        key: CacheKey,
    },

    /// The frame was cancelled before all of its tiles ran.
    #[fail(display = "frame cancelled")]
    Cancelled,

    /// The worker threads went away while a frame was in flight.
    #[fail(display = "worker pool shut down")]
    PoolShutdown,

    /// The operating system would not give us a worker thread.
    #[fail(display = "could not start worker thread: {}", reason)]
    SpawnFailed {
        /// The underlying I/O error, rendered.
        reason: String,
    },
}

impl Error {
    /// Shorthand for building an `InvalidRequest`.
    pub fn invalid<S: Into<String>>(reason: S) -> Error {
        Error::InvalidRequest {
            reason: reason.into(),
        }
    }

    /// The tiles that failed, if this error describes failed work.
    pub fn failed_tiles(&self) -> Vec<Tile> {
        match self {
            Error::WorkerFailure { tile, .. } => vec![*tile],
            Error::FrameFailed { failures } => {
                failures.iter().flat_map(|f| f.failed_tiles()).collect()
            }
            _ => vec![],
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
