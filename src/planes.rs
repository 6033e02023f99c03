// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Describes a frame on the integral plane of the image, and maps
//! pixels of that frame onto the complex plane.  Unlike a fixed
//! viewport, the window onto the complex plane shrinks with the
//! zoom factor, so every mapping takes the zoom as an argument.

use num::Complex;

use crate::config::FrameLimits;
use crate::errors::{Error, Result};

/// The x, y of a pixel in a frame.  The origin is the first pixel of
/// the first row.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Pixel(pub u32, pub u32);

/// We don't need a Point struct, as a single Complex number is a
/// point on the plane.
pub type PlaneCoordinate = Complex<f64>;

/// The two escape-time fractals we know how to evaluate.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Variant {
    /// `z -> z² + c` where `c` is the point and `z` starts at zero.
    Mandelbrot,
    /// `z -> z² + c` where `z` starts at the point and `c` is a
    /// constant nudged by the zoom factor.
    Julia,
}

impl Variant {
    /// Parses the lowercase name of a variant.
    pub fn from_name(name: &str) -> Option<Variant> {
        match name.trim().to_lowercase().as_str() {
            "mandelbrot" | "mandel" => Some(Variant::Mandelbrot),
            "julia" => Some(Variant::Julia),
            _ => None,
        }
    }
}

/// Everything needed to compute one frame.  One of these is built
/// per frame and never changed afterwards.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FrameRequest {
    /// Width of the frame in pixels.
    pub width: u32,
    /// Height of the frame in pixels.
    pub height: u32,
    /// Zoom factor.  For the Mandelbrot this scales the window onto
    /// the plane; for the Julia it perturbs the iteration constant.
    pub zoom: f64,
    /// Iteration budget for every pixel of the frame.
    pub max_iterations: u32,
    /// Which fractal to evaluate.
    pub variant: Variant,
}

impl FrameRequest {
    /// Constructor.
    pub fn new(width: u32, height: u32, zoom: f64, max_iterations: u32, variant: Variant) -> Self {
        FrameRequest {
            width,
            height,
            zoom,
            max_iterations,
            variant,
        }
    }

    /// The number of pixels in the frame.  Used to size buffers.
    pub fn len(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// A frame with no pixels at all.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Rejects requests that cannot or should not be computed.  This
    /// runs before any worker sees the request.
    pub fn validate(&self, limits: &FrameLimits) -> Result<()> {
        if self.is_empty() {
            return Err(Error::invalid(format!(
                "frame of {}x{} has no pixels",
                self.width, self.height
            )));
        }
        if self.len() > limits.max_pixels {
            return Err(Error::invalid(format!(
                "frame of {}x{} exceeds the limit of {} pixels",
                self.width, self.height, limits.max_pixels
            )));
        }
        if self.max_iterations > limits.max_iterations {
            return Err(Error::invalid(format!(
                "iteration budget {} exceeds the limit of {}",
                self.max_iterations, limits.max_iterations
            )));
        }
        if !self.zoom.is_finite() {
            return Err(Error::invalid(format!("zoom {} is not finite", self.zoom)));
        }
        Ok(())
    }

    /// Map a pixel of this frame onto the complex plane.
    pub fn map(&self, pixel: Pixel) -> PlaneCoordinate {
        map(pixel, self)
    }
}

/// The zoom at which the window onto the plane is computed.  The
/// Julia set is always viewed through the unzoomed window.
fn view_zoom(zoom: f64, variant: Variant) -> f64 {
    match variant {
        Variant::Mandelbrot => zoom,
        Variant::Julia => 1.0,
    }
}

/// Horizontal mapping.  The two variants use different left edges.
pub fn map_x(x: u32, width: u32, zoom: f64, variant: Variant) -> f64 {
    let left = match variant {
        Variant::Mandelbrot => 2.5,
        Variant::Julia => 1.75,
    };
    (f64::from(x) / f64::from(width)) * (3.5 * zoom) - (left - (1.0 - zoom))
}

/// Vertical mapping, shared by both variants.
pub fn map_y(y: u32, height: u32, zoom: f64) -> f64 {
    (f64::from(y) / f64::from(height)) * (2.0 * zoom) - (1.00001 - (1.0 - zoom))
}

/// Given a pixel of a frame, return the point on the complex plane
/// it stands for.
pub fn map(pixel: Pixel, request: &FrameRequest) -> PlaneCoordinate {
    let zoom = view_zoom(request.zoom, request.variant);
    Complex::new(
        map_x(pixel.0, request.width, zoom, request.variant),
        map_y(pixel.1, request.height, zoom),
    )
}
