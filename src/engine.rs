// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The Engine owns everything that lives for one run: the
//! configuration, the worker threads, and the memo cache.  Once
//! built it should not be reconfigured; build a new one instead.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cache::{CacheStats, MemoCache};
use crate::config::EngineConfig;
use crate::errors::Result;
use crate::planes::{FrameRequest, Variant};
use crate::pool::{CancelToken, OutputBuffer, WorkerPool};
use crate::tiles::partition;
use crate::zoom::{ZoomSchedule, ZoomStep};

/// What a finished run looked like.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RunSummary {
    /// Frames computed and handed to the sink.
    pub frames: u32,
    /// Wall time of the whole run.
    pub elapsed: Duration,
    /// Cache counters at the end of the run, if the cache was on.
    pub cache: Option<CacheStats>,
}

/// A configured evaluator with its own worker pool.
pub struct Engine {
    config: EngineConfig,
    pool: WorkerPool,
    cache: Option<Arc<MemoCache>>,
}

impl Engine {
    /// Validates the configuration and starts the workers.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let pool = WorkerPool::new(config.workers)?;
        let cache = config.cache.map(|c| Arc::new(MemoCache::new(c)));
        info!(
            "engine ready: {} workers, cache {}",
            config.workers,
            match config.cache {
                Some(c) => format!("on at {} cells per unit", c.resolution),
                None => "off".to_string(),
            }
        );
        Ok(Engine {
            config,
            pool,
            cache,
        })
    }

    /// The configuration the engine was built with.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The run's memo cache, if enabled.
    pub fn cache(&self) -> Option<&MemoCache> {
        self.cache.as_deref()
    }

    /// The classic schedule for a variant under this engine's profile.
    pub fn schedule(&self, variant: Variant) -> ZoomSchedule {
        ZoomSchedule::new(variant, self.config.profile)
    }

    /// Computes one frame.
    pub fn render(&self, request: &FrameRequest) -> Result<OutputBuffer> {
        self.render_with(request, None)
    }

    /// Computes one frame, giving up on tiles not yet started once
    /// `cancel` is raised.
    pub fn render_cancellable(&self, request: &FrameRequest, cancel: &CancelToken) -> Result<OutputBuffer> {
        self.render_with(request, Some(cancel))
    }

    fn render_with(&self, request: &FrameRequest, cancel: Option<&CancelToken>) -> Result<OutputBuffer> {
        request.validate(&self.config.limits)?;
        let tiles = partition(request.width, request.height, self.pool.size())?;
        self.pool
            .compute_frame(request, &tiles, self.cache.as_ref(), cancel)
    }

    /// Runs every frame of `schedule` at `width × height`, handing
    /// each finished frame to `sink`.  The sink returns `false` to end
    /// the run early.  The first failed frame ends the run with its
    /// error.
    pub fn run<F>(&self, schedule: &ZoomSchedule, width: u32, height: u32, mut sink: F) -> Result<RunSummary>
    where
        F: FnMut(&ZoomStep, &OutputBuffer) -> bool,
    {
        let started = Instant::now();
        let mut frames = 0;
        for step in schedule.frames() {
            let frame = match self.render(&step.request(width, height)) {
                Ok(frame) => frame,
                Err(e) => {
                    error!("frame {} at zoom {} failed: {}", step.frame, step.zoom, e);
                    return Err(e);
                }
            };
            frames += 1;
            if !sink(&step, &frame) {
                debug!("sink stopped the run after frame {}", step.frame);
                break;
            }
        }
        let summary = RunSummary {
            frames,
            elapsed: started.elapsed(),
            cache: self.cache.as_ref().map(|c| c.stats()),
        };
        info!("run finished: {} frames in {:?}", summary.frames, summary.elapsed);
        if let Some(stats) = summary.cache {
            info!(
                "cache: {} hits, {} misses, {} stores",
                stats.hits, stats.misses, stats.stores
            );
        }
        Ok(summary)
    }
}
