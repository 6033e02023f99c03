// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Run-time knobs for an engine: how many workers, whether to
//! memoize, and how large a frame we are willing to compute.  The
//! defaults reproduce the classic threaded zoomer: `cores²` workers
//! and no cache.

use std::str::FromStr;

use crate::errors::{Error, Result};
use crate::zoom::ZoomProfile;

/// The default number of cache cells per unit of the complex plane.
pub const DEFAULT_CACHE_RESOLUTION: u32 = 1000;

/// Worker count, read by `EngineConfig::from_env` like the keys below.
pub const ENV_WORKERS: &str = "FRACTAL_WORKERS";
/// Turns the memo cache on or off.
pub const ENV_CACHE: &str = "FRACTAL_CACHE";
/// Cells per unit for the memo cache.
pub const ENV_CACHE_RESOLUTION: &str = "FRACTAL_CACHE_RESOLUTION";
/// `threaded` or `gpu`.
pub const ENV_PROFILE: &str = "FRACTAL_PROFILE";

/// Upper bounds on a single frame.  Requests beyond these are refused
/// before any allocation happens.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FrameLimits {
    /// Largest `width * height` accepted.
    pub max_pixels: usize,
    /// Largest per-pixel iteration budget accepted.
    pub max_iterations: u32,
}

impl Default for FrameLimits {
    fn default() -> Self {
        FrameLimits {
            max_pixels: 100_000_000,
            max_iterations: 1_000_000,
        }
    }
}

/// Settings for the memo cache.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CacheConfig {
    /// Grid cells per unit of the complex plane.
    pub resolution: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            resolution: DEFAULT_CACHE_RESOLUTION,
        }
    }
}

/// The complete configuration of an engine.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    /// Number of workers, and therefore of tiles per frame.
    pub workers: usize,
    /// `None` disables the memo cache.
    pub cache: Option<CacheConfig>,
    /// Frame size and budget limits.
    pub limits: FrameLimits,
    /// Which zoom schedule constants to use.
    pub profile: ZoomProfile,
}

/// `cores²`, the worker count of the threaded zoomer.
pub fn default_workers() -> usize {
    let cores = num_cpus::get().max(1);
    cores * cores
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            workers: default_workers(),
            cache: None,
            limits: FrameLimits::default(),
            profile: ZoomProfile::default(),
        }
    }
}

fn parse_value<T: FromStr>(name: &str, value: &str) -> Result<T> {
    T::from_str(value.trim())
        .map_err(|_| Error::invalid(format!("could not parse {}={:?}", name, value)))
}

fn parse_switch(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "on" | "true" | "yes" => Ok(true),
        "0" | "off" | "false" | "no" => Ok(false),
        _ => Err(Error::invalid(format!(
            "{} must be on or off, not {:?}",
            name, value
        ))),
    }
}

impl EngineConfig {
    /// Sets the worker count.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Enables the memo cache with the given settings.
    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Disables the memo cache.
    pub fn without_cache(mut self) -> Self {
        self.cache = None;
        self
    }

    /// Sets the frame limits.
    pub fn with_limits(mut self, limits: FrameLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Sets the zoom profile.
    pub fn with_profile(mut self, profile: ZoomProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Checks that the configuration can drive an engine.
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::invalid("worker count must be positive"));
        }
        if let Some(cache) = self.cache {
            if cache.resolution == 0 {
                return Err(Error::invalid("cache resolution must be positive"));
            }
        }
        Ok(())
    }

    /// Defaults overlaid with whatever the process environment sets.
    pub fn from_env() -> Result<Self> {
        EngineConfig::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overlaid with the values `lookup` returns for the
    /// `FRACTAL_*` keys.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = EngineConfig::default();
        if let Some(value) = lookup(ENV_WORKERS) {
            config.workers = parse_value(ENV_WORKERS, &value)?;
        }
        if let Some(value) = lookup(ENV_CACHE) {
            config.cache = if parse_switch(ENV_CACHE, &value)? {
                Some(CacheConfig::default())
            } else {
                None
            };
        }
        if let Some(value) = lookup(ENV_CACHE_RESOLUTION) {
            let resolution = parse_value(ENV_CACHE_RESOLUTION, &value)?;
            match config.cache.as_mut() {
                Some(cache) => cache.resolution = resolution,
                None => warn!(
                    "{} is set but the cache is disabled; ignoring it",
                    ENV_CACHE_RESOLUTION
                ),
            }
        }
        if let Some(value) = lookup(ENV_PROFILE) {
            config.profile = ZoomProfile::from_name(&value).ok_or_else(|| {
                Error::invalid(format!("{} must be threaded or gpu, not {:?}", ENV_PROFILE, value))
            })?;
        }
        config.validate()?;
        Ok(config)
    }
}
