#![deny(missing_docs)]
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Escape-time fractal zoomer
//!
//! The Mandelbrot takes a point on the complex plane, repeatedly
//! squares it and adds the point back in, and measures how quickly
//! that number runs off to infinity.  This "velocity", the number of
//! iterations before the orbit leaves the circle of radius 2, is the
//! number a renderer colours each pixel by.  The Julia set runs the
//! same recurrence, but starts from the point and adds a fixed
//! constant instead.
//!
//! This crate computes those counts for whole frames of a zoom
//! animation.  A frame is cut into one tile per worker, the workers
//! fill their tiles in parallel, and the frame is handed back only
//! once every tile is done.  An optional memo cache, shared by all of
//! the workers, remembers escaped orbits on a coarse grid so that
//! deep frames can reuse the work of shallower ones.
//!
//! Drawing the counts, choosing colours and opening windows are left
//! to the caller.

extern crate crossbeam;
#[macro_use]
extern crate failure;
extern crate itertools;
#[macro_use]
extern crate log;
extern crate num;
extern crate num_cpus;

pub mod cache;
pub mod config;
pub mod engine;
pub mod errors;
pub mod evaluate;
pub mod planes;
pub mod pool;
pub mod tiles;
pub mod zoom;

pub use cache::{CacheKey, CacheStats, MemoCache};
pub use config::{CacheConfig, EngineConfig, FrameLimits};
pub use engine::{Engine, RunSummary};
pub use errors::{Error, Result};
pub use evaluate::{evaluate, IterationResult, PointEvaluator};
pub use planes::{map, FrameRequest, Pixel, PlaneCoordinate, Variant};
pub use pool::{compute_frame, CancelToken, OutputBuffer, WorkerPool};
pub use tiles::{partition, Tile};
pub use zoom::{Decay, ZoomProfile, ZoomSchedule, ZoomSequencer, ZoomStep};
