// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! A fixed set of worker threads that compute frames tile by tile.
//!
//! The threads are started once and fed through a channel, so a long
//! zoom sequence does not pay for thread creation every frame.  Each
//! frame queues one job per tile; every job computes its tile into a
//! buffer of its own and sends it back, and the frame is assembled
//! only after every tile has reported.  Nothing outside this module
//! ever sees a half-computed frame.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam::channel::{self, Receiver, Sender};

use crate::cache::MemoCache;
use crate::config::FrameLimits;
use crate::errors::{Error, Result};
use crate::evaluate::{IterationResult, PointEvaluator};
use crate::planes::{map, FrameRequest, Pixel};
use crate::tiles::Tile;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// The per-tile computation handed to the workers.
type TileWork = Arc<dyn Fn(&Tile) -> Result<Vec<IterationResult>> + Send + Sync>;

/// A flag a caller can raise to stop a frame.  Workers look at it
/// before starting each tile; a tile already running is finished.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// A token that has not been raised.
    pub fn new() -> Self {
        CancelToken::default()
    }

    /// Raise the flag.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Has the flag been raised?
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One `IterationResult` per pixel of a frame, row-major.
#[derive(Clone, Debug, PartialEq)]
pub struct OutputBuffer {
    width: u32,
    height: u32,
    results: Vec<IterationResult>,
}

impl OutputBuffer {
    /// Width of the frame.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height of the frame.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// The result for one pixel, if it lies in the frame.
    pub fn get(&self, pixel: Pixel) -> Option<&IterationResult> {
        if pixel.0 >= self.width || pixel.1 >= self.height {
            return None;
        }
        self.results
            .get(pixel.1 as usize * self.width as usize + pixel.0 as usize)
    }

    /// Every result, row-major.
    pub fn results(&self) -> &[IterationResult] {
        &self.results
    }

    /// The iteration counts a renderer colours by.  Zero means the
    /// point did not escape.
    pub fn counts(&self) -> Vec<u32> {
        self.results.iter().map(|r| r.count).collect()
    }

    /// Number of pixels whose orbit escaped.
    pub fn escaped_count(&self) -> usize {
        self.results.iter().filter(|r| r.escaped).count()
    }
}

struct TileOutcome {
    tile: Tile,
    result: Result<Vec<IterationResult>>,
}

fn panic_message(payload: &Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_string()
    }
}

/// Map and evaluate every pixel of one tile.
fn compute_tile(
    request: &FrameRequest,
    evaluator: &PointEvaluator,
    cache: Option<&MemoCache>,
    tile: &Tile,
) -> Result<Vec<IterationResult>> {
    let mut results = Vec::new();
    results
        .try_reserve_exact(tile.len())
        .map_err(|e| Error::WorkerFailure {
            tile: *tile,
            reason: format!("could not allocate {} results: {}", tile.len(), e),
        })?;
    for pixel in tile.pixels() {
        let point = map(pixel, request);
        results.push(evaluator.evaluate(&point, cache));
    }
    Ok(results)
}

/// Checks that a tile set describes the frame: a frame with pixels,
/// one tile per worker, every tile inside the frame, and every pixel
/// in exactly one tile.
fn check_tiles(request: &FrameRequest, tiles: &[Tile], workers: usize) -> Result<()> {
    if request.is_empty() {
        return Err(Error::invalid(format!(
            "a {}x{} frame has no pixels",
            request.width, request.height
        )));
    }
    if tiles.len() != workers {
        return Err(Error::invalid(format!(
            "{} tiles for a pool of {} workers",
            tiles.len(),
            workers
        )));
    }
    if let Some(tile) = tiles
        .iter()
        .find(|t| t.x0 > t.x1 || t.y0 > t.y1 || t.x1 > request.width || t.y1 > request.height)
    {
        return Err(Error::invalid(format!(
            "tile {} does not fit a {}x{} frame",
            tile, request.width, request.height
        )));
    }

    // One bit per pixel.
    let width = request.width as usize;
    let words = (request.len() + 63) / 64;
    let mut seen: Vec<u64> = Vec::new();
    seen.try_reserve_exact(words)
        .map_err(|e| Error::invalid(format!("could not allocate the coverage map: {}", e)))?;
    seen.resize(words, 0);
    for tile in tiles {
        for Pixel(x, y) in tile.pixels() {
            let index = y as usize * width + x as usize;
            let (word, bit) = (index / 64, 1u64 << (index % 64));
            if seen[word] & bit != 0 {
                return Err(Error::invalid(format!(
                    "tile {} overlaps another tile at ({}, {})",
                    tile, x, y
                )));
            }
            seen[word] |= bit;
        }
    }
    let covered: usize = seen.iter().map(|w| w.count_ones() as usize).sum();
    if covered != request.len() {
        return Err(Error::invalid(format!(
            "tiles cover {} pixels of a {} pixel frame",
            covered,
            request.len()
        )));
    }
    Ok(())
}

/// The persistent worker threads.
pub struct WorkerPool {
    jobs: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Starts `size` worker threads.
    pub fn new(size: usize) -> Result<Self> {
        if size == 0 {
            return Err(Error::invalid("a worker pool needs at least one worker"));
        }
        let (jobs, queue): (Sender<Job>, Receiver<Job>) = channel::unbounded();
        let mut workers = Vec::with_capacity(size);
        for id in 0..size {
            let queue = queue.clone();
            let handle = thread::Builder::new()
                .name(format!("fractal-worker-{}", id))
                .spawn(move || {
                    for job in queue.iter() {
                        job();
                    }
                    trace!("worker {} exiting", id);
                })
                .map_err(|e| Error::SpawnFailed {
                    reason: e.to_string(),
                })?;
            workers.push(handle);
        }
        debug!("started {} workers", size);
        Ok(WorkerPool {
            jobs: Some(jobs),
            workers,
        })
    }

    /// Number of worker threads, and so the number of tiles every
    /// frame must be split into.
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Computes a whole frame, one job per tile, and returns once
    /// every tile has reported.  If any tile failed, the frame fails
    /// with all of the per-tile errors.
    pub fn compute_frame(
        &self,
        request: &FrameRequest,
        tiles: &[Tile],
        cache: Option<&Arc<MemoCache>>,
        cancel: Option<&CancelToken>,
    ) -> Result<OutputBuffer> {
        check_tiles(request, tiles, self.size())?;
        let frame = *request;
        let evaluator = PointEvaluator::new(request);
        let cache = cache.cloned();
        let work: TileWork =
            Arc::new(move |tile: &Tile| compute_tile(&frame, &evaluator, cache.as_deref(), tile));
        self.run_tiles(request, tiles, work, cancel)
    }

    fn run_tiles(
        &self,
        request: &FrameRequest,
        tiles: &[Tile],
        work: TileWork,
        cancel: Option<&CancelToken>,
    ) -> Result<OutputBuffer> {
        let started = Instant::now();
        let jobs = self.jobs.as_ref().ok_or(Error::PoolShutdown)?;
        let mut results = Vec::new();
        results
            .try_reserve_exact(request.len())
            .map_err(|e| Error::invalid(format!("could not allocate the frame: {}", e)))?;
        results.resize(request.len(), IterationResult::interior());

        let (reply, replies) = channel::unbounded::<TileOutcome>();
        for tile in tiles {
            let tile = *tile;
            let work = work.clone();
            let reply = reply.clone();
            let cancel = cancel.cloned();
            let job: Job = Box::new(move || {
                let result = if cancel.map_or(false, |c| c.is_cancelled()) {
                    Err(Error::Cancelled)
                } else {
                    match panic::catch_unwind(AssertUnwindSafe(|| work(&tile))) {
                        Ok(result) => result,
                        Err(payload) => Err(Error::WorkerFailure {
                            tile,
                            reason: panic_message(&payload),
                        }),
                    }
                };
                let _ = reply.send(TileOutcome { tile, result });
            });
            jobs.send(job).map_err(|_| Error::PoolShutdown)?;
        }
        // Only the jobs hold senders now, so a vanished worker shows
        // up as a disconnected channel instead of a hang.
        drop(reply);

        let mut failures = Vec::new();
        for _ in 0..tiles.len() {
            let outcome = match replies.recv() {
                Ok(outcome) => outcome,
                Err(_) => {
                    failures.push(Error::PoolShutdown);
                    break;
                }
            };
            match outcome.result {
                Ok(pixels) => copy_tile(&mut results, request.width, &outcome.tile, &pixels),
                Err(e) => {
                    if let Error::Cancelled = e {
                        trace!("tile {} cancelled", outcome.tile);
                    } else {
                        error!("tile {}: {}", outcome.tile, e);
                    }
                    failures.push(e);
                }
            }
        }

        if !failures.is_empty() {
            if failures.iter().all(|e| matches!(e, Error::Cancelled)) {
                return Err(Error::Cancelled);
            }
            failures.retain(|e| !matches!(e, Error::Cancelled));
            return Err(Error::FrameFailed { failures });
        }

        debug!(
            "{:?} frame {}x{} at zoom {} ({} iterations) took {:?}",
            request.variant,
            request.width,
            request.height,
            request.zoom,
            request.max_iterations,
            started.elapsed()
        );
        Ok(OutputBuffer {
            width: request.width,
            height: request.height,
            results,
        })
    }
}

/// Copies a tile's row-major results into its place in the frame.
fn copy_tile(frame: &mut [IterationResult], width: u32, tile: &Tile, pixels: &[IterationResult]) {
    if tile.is_empty() {
        return;
    }
    let width = width as usize;
    let rows = pixels.chunks(tile.width() as usize);
    for (y, row) in (tile.y0 as usize..tile.y1 as usize).zip(rows) {
        let start = y * width + tile.x0 as usize;
        frame[start..start + row.len()].copy_from_slice(row);
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Closing the queue ends every worker's loop.
        self.jobs.take();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                warn!("a worker thread panicked outside of a job");
            }
        }
        debug!("worker pool stopped");
    }
}

/// Computes one frame on `pool`.  The tiles must come from a partition
/// for the pool's size, and the request must fit the default
/// `FrameLimits`.
pub fn compute_frame(
    request: &FrameRequest,
    tiles: &[Tile],
    pool: &WorkerPool,
    cache: Option<&Arc<MemoCache>>,
) -> Result<OutputBuffer> {
    request.validate(&FrameLimits::default())?;
    pool.compute_frame(request, tiles, cache, None)
}
