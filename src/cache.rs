// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! A memo of escaped orbits, keyed by a point snapped to a fixed
//! grid over the complex plane.  Two points that land in the same
//! grid cell are treated as the same point; at deep zooms many
//! neighbouring pixels share a cell, and that approximation is what
//! buys back the recomputation.
//!
//! The cache is shared by every worker of a run, so the map is split
//! into shards, each behind its own lock.  A write replaces a whole
//! entry under the shard lock: two workers storing the same cell race
//! to a last-write-wins result, never to a half-written one.
//!
//! Keys carry no fractal parameters.  That is sound for the Mandelbrot
//! set, where a point's orbit depends on the point alone, but a Julia
//! run changes its constant every frame and would keep replaying the
//! counts of whichever frame stored them first.  The cache is meant
//! for Mandelbrot runs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use crate::config::CacheConfig;
use crate::errors::Error;
use crate::evaluate::IterationResult;
use crate::planes::PlaneCoordinate;

const SHARDS: usize = 64;

/// A point on the complex plane, snapped to the cache grid.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey(pub i64, pub i64);

impl CacheKey {
    /// Quantizes a point.  The grid origin is at `-2.5 - 1.0i`, the
    /// lower-left corner of the unzoomed Mandelbrot window.
    pub fn quantize(point: &PlaneCoordinate, resolution: u32) -> CacheKey {
        let cells = f64::from(resolution);
        CacheKey(
            ((point.re + 2.5) * cells).floor() as i64,
            ((point.im + 1.0) * cells).floor() as i64,
        )
    }

    fn shard(&self) -> usize {
        let mixed = (self.0 as u64)
            .wrapping_mul(0x9E37_79B9_7F4A_7C15)
            .rotate_left(17)
            ^ (self.1 as u64).wrapping_mul(0xC2B2_AE3D_27D4_EB4F);
        (mixed >> 32) as usize % SHARDS
    }
}

/// Counters describing how useful the cache has been.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups that found an entry.
    pub hits: u64,
    /// Lookups that found nothing.
    pub misses: u64,
    /// Entries written.
    pub stores: u64,
}

/// The memo cache.  Build one per run and share it by reference (or
/// `Arc`) with every worker.
#[derive(Debug)]
pub struct MemoCache {
    resolution: u32,
    shards: Vec<RwLock<HashMap<CacheKey, IterationResult>>>,
    hits: AtomicU64,
    misses: AtomicU64,
    stores: AtomicU64,
}

impl MemoCache {
    /// Builds an empty cache with `resolution` cells per unit.
    pub fn new(config: CacheConfig) -> Self {
        MemoCache {
            resolution: config.resolution.max(1),
            shards: (0..SHARDS).map(|_| RwLock::new(HashMap::new())).collect(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            stores: AtomicU64::new(0),
        }
    }

    /// Cells per unit of the plane.
    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    /// The key a point is stored under.
    pub fn key(&self, point: &PlaneCoordinate) -> CacheKey {
        CacheKey::quantize(point, self.resolution)
    }

    /// Looks up the orbit stored for the cell `point` falls into.
    /// Only escaped orbits are ever stored; finding anything else is
    /// fatal in debug builds and a plain miss in release builds.
    pub fn get(&self, point: &PlaneCoordinate) -> Option<IterationResult> {
        let key = self.key(point);
        let found = {
            let shard = match self.shards[key.shard()].read() {
                Ok(shard) => shard,
                Err(poisoned) => poisoned.into_inner(),
            };
            shard.get(&key).cloned()
        };
        match found {
            Some(entry) if !entry.escaped => {
                let err = Error::CacheCorruption { key };
                if cfg!(debug_assertions) {
                    panic!("{}", err);
                }
                warn!("{}; treating it as a miss", err);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Stores an escaped orbit for the cell `point` falls into,
    /// replacing whatever was there.  An orbit that has not escaped
    /// only tells us about the budget it ran under, so it is refused.
    pub fn put(&self, point: &PlaneCoordinate, result: IterationResult) {
        let key = self.key(point);
        if !result.escaped {
            debug_assert!(false, "{}", Error::CacheCorruption { key });
            return;
        }
        let mut shard = match self.shards[key.shard()].write() {
            Ok(shard) => shard,
            Err(poisoned) => poisoned.into_inner(),
        };
        shard.insert(key, result);
        self.stores.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of cells holding an entry.
    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|shard| match shard.read() {
                Ok(shard) => shard.len(),
                Err(poisoned) => poisoned.into_inner().len(),
            })
            .sum()
    }

    /// True if nothing has been stored yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forgets every entry and resets the counters.  Engines never do
    /// this between frames, only between runs.
    pub fn clear(&self) {
        for shard in &self.shards {
            match shard.write() {
                Ok(mut shard) => shard.clear(),
                Err(poisoned) => poisoned.into_inner().clear(),
            }
        }
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.stores.store(0, Ordering::Relaxed);
    }

    /// A snapshot of the counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            stores: self.stores.load(Ordering::Relaxed),
        }
    }

    #[cfg(test)]
    pub(crate) fn insert_unchecked(&self, point: &PlaneCoordinate, result: IterationResult) {
        let key = self.key(point);
        self.shards[key.shard()].write().unwrap().insert(key, result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num::Complex;
    use std::sync::Arc;

    fn escaped(count: u32) -> IterationResult {
        IterationResult::escaped(count, Complex::new(3.0, 0.5))
    }

    #[test]
    fn quantizes_onto_the_grid() {
        assert_eq!(CacheKey::quantize(&Complex::new(-2.5, -1.0), 1000), CacheKey(0, 0));
        assert_eq!(CacheKey::quantize(&Complex::new(0.0, 0.0), 1000), CacheKey(2500, 1000));
        assert_eq!(CacheKey::quantize(&Complex::new(-2.55, -1.15), 10), CacheKey(-1, -2));
        assert_eq!(
            CacheKey::quantize(&Complex::new(0.00049, 0.0), 1000),
            CacheKey::quantize(&Complex::new(0.0, 0.0), 1000)
        );
    }

    #[test]
    fn neighbours_in_a_cell_share_an_entry() {
        let cache = MemoCache::new(CacheConfig::default());
        assert!(cache.get(&Complex::new(0.5, 0.5)).is_none());
        cache.put(&Complex::new(0.5001, 0.5001), escaped(7));
        assert_eq!(cache.get(&Complex::new(0.5004, 0.5006)), Some(escaped(7)));
        assert!(cache.get(&Complex::new(0.5011, 0.5)).is_none());
        assert_eq!(cache.len(), 1);
        assert_eq!(
            cache.stats(),
            CacheStats {
                hits: 1,
                misses: 2,
                stores: 1
            }
        );
    }

    #[test]
    fn last_write_wins() {
        let cache = MemoCache::new(CacheConfig::default());
        let p = Complex::new(-0.1, 0.9);
        cache.put(&p, escaped(3));
        cache.put(&p, escaped(4));
        assert_eq!(cache.get(&p).map(|r| r.count), Some(4));
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.stats(), CacheStats::default());
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic]
    fn refuses_orbits_that_never_escaped() {
        let cache = MemoCache::new(CacheConfig::default());
        cache.put(&Complex::new(0.0, 0.0), IterationResult::interior());
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "never escaped")]
    fn corrupt_entries_are_fatal_in_debug() {
        let cache = MemoCache::new(CacheConfig::default());
        let p = Complex::new(0.0, 0.0);
        cache.insert_unchecked(&p, IterationResult::interior());
        cache.get(&p);
    }

    #[test]
    fn concurrent_writers_never_tear_entries() {
        let cache = Arc::new(MemoCache::new(CacheConfig { resolution: 1 }));
        crossbeam::scope(|spawner| {
            for worker in 0..8u32 {
                let cache = cache.clone();
                spawner.spawn(move |_| {
                    for i in 0..2000u32 {
                        let p = Complex::new(f64::from(i % 40) - 2.0, 0.25);
                        let count = worker * 10_000 + i;
                        let z = Complex::new(f64::from(count), f64::from(count));
                        cache.put(&p, IterationResult::escaped(count, z));
                        if let Some(hit) = cache.get(&p) {
                            assert_eq!(hit.final_re, f64::from(hit.count));
                            assert_eq!(hit.final_im, f64::from(hit.count));
                        }
                    }
                });
            }
        })
        .unwrap();
        assert_eq!(cache.len(), 40);
        assert_eq!(cache.stats().stores, 8 * 2000);
    }
}
