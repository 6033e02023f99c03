// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The escape-time iterator.  Given a point on the complex plane,
//! repeatedly apply `z -> z² + c` until the orbit leaves the circle
//! of radius 2 or the budget runs out, and report how long that took.
//!
//! The Mandelbrot's two largest interior regions, the main cardioid
//! and the period-2 bulb, have closed forms.  Points inside them
//! never escape, and they make up most of the black heart of the
//! set, so testing for them first saves the bulk of the work.

use num::Complex;

use crate::cache::MemoCache;
use crate::planes::{FrameRequest, PlaneCoordinate, Variant};

const D4: f64 = 1.0 / 4.0;
const D16: f64 = D4 / 4.0;

/// The fixed part of the Julia constant.  The real part is nudged by
/// the zoom factor every frame.
const JULIA_RE: f64 = 0.353;
const JULIA_IM: f64 = 0.288;

/// The outcome of iterating one point.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct IterationResult {
    /// Iterations taken to escape.  Zero when the point did not
    /// escape, which renderers read as "inside the set"; check
    /// `escaped` to tell that apart from a genuine count.
    pub count: u32,
    /// Whether the orbit left the radius-2 circle within the budget.
    pub escaped: bool,
    /// Real part of the orbit's final state.
    pub final_re: f64,
    /// Imaginary part of the orbit's final state.
    pub final_im: f64,
}

impl IterationResult {
    /// A point that did not escape within the budget.
    pub fn interior() -> Self {
        IterationResult {
            count: 0,
            escaped: false,
            final_re: 0.0,
            final_im: 0.0,
        }
    }

    /// A point that escaped after `count` iterations, with `z` the
    /// first state outside the circle.
    pub fn escaped(count: u32, z: Complex<f64>) -> Self {
        IterationResult {
            count,
            escaped: true,
            final_re: z.re,
            final_im: z.im,
        }
    }
}

impl Default for IterationResult {
    fn default() -> Self {
        IterationResult::interior()
    }
}

/// Inside the disc of radius 1/4 centred on -1.
#[inline]
pub fn in_period2_bulb(point: &PlaneCoordinate) -> bool {
    let x = point.re + 1.0;
    x * x + point.im * point.im < D16
}

/// Inside the main cardioid.
#[inline]
pub fn in_main_cardioid(point: &PlaneCoordinate) -> bool {
    let y2 = point.im * point.im;
    let x = point.re - D4;
    let q = x * x + y2;
    q * (q + x) < D4 * y2
}

/// False if the point is guaranteed to be inside the Mandelbrot set.
/// True does not guarantee it is outside.
#[inline]
pub fn maybe_outside(point: &PlaneCoordinate) -> bool {
    !(in_period2_bulb(point) || in_main_cardioid(point))
}

/// Runs the orbit from `(x, y)` with `count` iterations already spent,
/// adding `c` each step.
#[inline]
fn iterate(mut count: u32, mut x: f64, mut y: f64, c: Complex<f64>, max_iterations: u32) -> IterationResult {
    while count < max_iterations {
        let xx = x * x;
        let yy = y * y;
        if xx + yy > 4.0 {
            return IterationResult::escaped(count, Complex::new(x, y));
        }
        let xplusy = x + y;
        y = xplusy * xplusy - xx - yy + c.im;
        x = xx - yy + c.re;
        count += 1;
    }
    IterationResult::interior()
}

/// Consults the cache, iterates, and stores fresh escapes.  A cache
/// hit is an escaped state, so resuming from it either returns the
/// cached count at once or, if that count lies beyond this budget,
/// reports the point as not escaped.
fn iterate_memoized(
    point: &PlaneCoordinate,
    start: Complex<f64>,
    c: Complex<f64>,
    max_iterations: u32,
    cache: Option<&MemoCache>,
) -> IterationResult {
    let cache = match cache {
        Some(cache) => cache,
        None => return iterate(0, start.re, start.im, c, max_iterations),
    };
    if let Some(hit) = cache.get(point) {
        return iterate(hit.count, hit.final_re, hit.final_im, c, max_iterations);
    }
    let result = iterate(0, start.re, start.im, c, max_iterations);
    if result.escaped {
        cache.put(point, result);
    }
    result
}

/// Escape time of `point` in the Mandelbrot set.
pub fn mandelbrot(point: &PlaneCoordinate, max_iterations: u32, cache: Option<&MemoCache>) -> IterationResult {
    if max_iterations == 0 || !maybe_outside(point) {
        return IterationResult::interior();
    }
    iterate_memoized(point, Complex::new(0.0, 0.0), *point, max_iterations, cache)
}

/// Escape time of `point` in the Julia set whose constant is
/// `0.353 + zoom + 0.288i`.
///
/// The cache key is the point alone, not the constant.  Across a
/// Julia run the constant moves every frame, so a point that escaped
/// once keeps that count for the rest of the run.  Leave the cache off
/// for Julia runs unless that is what you want.
pub fn julia(point: &PlaneCoordinate, zoom: f64, max_iterations: u32, cache: Option<&MemoCache>) -> IterationResult {
    if max_iterations == 0 {
        return IterationResult::interior();
    }
    let c = Complex::new(JULIA_RE + zoom, JULIA_IM);
    iterate_memoized(point, *point, c, max_iterations, cache)
}

/// Escape time of `point` for either variant.  Total: every input
/// produces a result.
pub fn evaluate(
    point: &PlaneCoordinate,
    zoom: f64,
    max_iterations: u32,
    variant: Variant,
    cache: Option<&MemoCache>,
) -> IterationResult {
    match variant {
        Variant::Mandelbrot => mandelbrot(point, max_iterations, cache),
        Variant::Julia => julia(point, zoom, max_iterations, cache),
    }
}

/// The per-frame half of `evaluate`: a variant, a zoom and a budget,
/// fixed for every pixel of one frame.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PointEvaluator {
    variant: Variant,
    zoom: f64,
    max_iterations: u32,
}

impl PointEvaluator {
    /// Builds the evaluator for a frame.
    pub fn new(request: &FrameRequest) -> Self {
        PointEvaluator {
            variant: request.variant,
            zoom: request.zoom,
            max_iterations: request.max_iterations,
        }
    }

    /// Escape time of `point` under this frame's parameters.
    pub fn evaluate(&self, point: &PlaneCoordinate, cache: Option<&MemoCache>) -> IterationResult {
        evaluate(point, self.zoom, self.max_iterations, self.variant, cache)
    }
}
