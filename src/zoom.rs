// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Frame-to-frame zoom schedules.
//!
//! A Mandelbrot run starts with the whole set in view and shrinks the
//! window geometrically until it is a hundred-thousandth of its first
//! size.  A Julia run keeps its window and instead slides the real
//! part of the iteration constant down by a hundredth per frame, from
//! `1.0` to `-2.5`, which morphs the set through a long family of
//! shapes.  The iteration budget of each frame is a step function of
//! its zoom.

use crate::errors::{Error, Result};
use crate::planes::{FrameRequest, Variant};

/// Budget used while the Julia constant crosses `(-1.0, -0.02)`.
pub const SHALLOW_BUDGET: u32 = 100;

/// Constants of the two classic zoomers.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ZoomProfile {
    /// The threaded CPU zoomer: slower decay, 170 iterations.
    Threaded,
    /// The GPU zoomer: faster decay, 256 iterations.
    Gpu,
}

impl Default for ZoomProfile {
    fn default() -> Self {
        ZoomProfile::Threaded
    }
}

impl ZoomProfile {
    /// Parses `threaded` or `gpu`.
    pub fn from_name(name: &str) -> Option<ZoomProfile> {
        match name.trim().to_lowercase().as_str() {
            "threaded" | "cpu" => Some(ZoomProfile::Threaded),
            "gpu" => Some(ZoomProfile::Gpu),
            _ => None,
        }
    }

    fn mandelbrot_decay(self) -> f64 {
        match self {
            ZoomProfile::Threaded => 0.99,
            ZoomProfile::Gpu => 0.98,
        }
    }

    fn budget(self) -> u32 {
        match self {
            ZoomProfile::Threaded => 170,
            ZoomProfile::Gpu => 256,
        }
    }
}

/// How the zoom moves from one frame to the next.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Decay {
    /// Multiply by the factor every frame.
    Geometric(f64),
    /// Subtract the step every frame.
    Linear(f64),
}

impl Decay {
    /// One step from `zoom`.
    pub fn apply(self, zoom: f64) -> f64 {
        match self {
            Decay::Geometric(factor) => zoom * factor,
            Decay::Linear(step) => zoom - step,
        }
    }

    /// The zoom `frame` steps after `start`, computed directly so that
    /// rounding does not pile up over a long run.
    pub fn at(self, start: f64, frame: u32) -> f64 {
        match self {
            Decay::Geometric(factor) => start * factor.powf(f64::from(frame)),
            Decay::Linear(step) => start - step * f64::from(frame),
        }
    }
}

/// The full description of a zoom run.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ZoomSchedule {
    /// Which fractal is zoomed.
    pub variant: Variant,
    /// Zoom of the first frame.
    pub start: f64,
    /// The run ends once the zoom reaches this value or passes it.
    pub stop: f64,
    /// Frame-to-frame movement.
    pub decay: Decay,
    /// Budget outside the shallow band.
    pub budget: u32,
}

impl ZoomSchedule {
    /// The classic schedule for a variant under a profile.
    pub fn new(variant: Variant, profile: ZoomProfile) -> Self {
        match variant {
            Variant::Mandelbrot => ZoomSchedule {
                variant,
                start: 1.0,
                stop: 0.00001,
                decay: Decay::Geometric(profile.mandelbrot_decay()),
                budget: profile.budget(),
            },
            Variant::Julia => ZoomSchedule {
                variant,
                start: 1.0,
                stop: -2.5,
                decay: Decay::Linear(0.01),
                budget: profile.budget(),
            },
        }
    }

    /// Replaces the decay.  A factor outside `(0, 1)` or a step that is
    /// not positive would never reach the stop, so both are refused.
    pub fn with_decay(mut self, decay: Decay) -> Result<Self> {
        let shrinks = match decay {
            Decay::Geometric(factor) => factor > 0.0 && factor < 1.0,
            Decay::Linear(step) => step > 0.0 && step.is_finite(),
        };
        if !shrinks {
            return Err(Error::invalid(format!("{:?} never reaches the end of a run", decay)));
        }
        self.decay = decay;
        Ok(self)
    }

    /// Iteration budget for a frame at `zoom`.
    pub fn max_iterations(&self, zoom: f64) -> u32 {
        if zoom > -1.0 && zoom < -0.02 {
            SHALLOW_BUDGET
        } else {
            self.budget
        }
    }

    /// The zoom and budget of the frame after one at `current_zoom`,
    /// or `None` when the run is over.
    pub fn advance(&self, current_zoom: f64) -> Option<(f64, u32)> {
        let zoom = self.decay.apply(current_zoom);
        if zoom <= self.stop {
            None
        } else {
            Some((zoom, self.max_iterations(zoom)))
        }
    }

    /// Every frame of the run, first to last.
    pub fn frames(&self) -> ZoomSequencer {
        ZoomSequencer {
            schedule: *self,
            frame: Some(0),
        }
    }
}

/// One frame of a run.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ZoomStep {
    /// Index of the frame, from zero.
    pub frame: u32,
    /// Zoom of the frame.
    pub zoom: f64,
    /// Iteration budget of the frame.
    pub max_iterations: u32,
    /// Which fractal the frame shows.
    pub variant: Variant,
}

impl ZoomStep {
    /// The request for this frame at a given resolution.
    pub fn request(&self, width: u32, height: u32) -> FrameRequest {
        FrameRequest::new(width, height, self.zoom, self.max_iterations, self.variant)
    }
}

/// Yields the frames of a schedule.  A hand-built schedule whose decay
/// never reaches `stop` ends after `u32::MAX` frames.
#[derive(Clone, Debug)]
pub struct ZoomSequencer {
    schedule: ZoomSchedule,
    frame: Option<u32>,
}

impl Iterator for ZoomSequencer {
    type Item = ZoomStep;

    fn next(&mut self) -> Option<ZoomStep> {
        let frame = self.frame?;
        let zoom = self.schedule.decay.at(self.schedule.start, frame);
        if zoom <= self.schedule.stop {
            self.frame = None;
            return None;
        }
        self.frame = frame.checked_add(1);
        Some(ZoomStep {
            frame,
            zoom,
            max_iterations: self.schedule.max_iterations(zoom),
            variant: self.schedule.variant,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expected_geometric_frames(decay: f64) -> usize {
        (0.00001f64.ln() / decay.ln()).ceil() as usize
    }

    #[test]
    fn gpu_mandelbrot_runs_570_frames() {
        let schedule = ZoomSchedule::new(Variant::Mandelbrot, ZoomProfile::Gpu);
        let frames: Vec<ZoomStep> = schedule.frames().collect();
        assert_eq!(frames.len(), expected_geometric_frames(0.98));
        assert_eq!(frames.len(), 570);
        assert_eq!(frames[0].zoom, 1.0);
        assert!(frames.iter().all(|f| f.max_iterations == 256));
    }

    #[test]
    fn threaded_mandelbrot_decays_slower() {
        let schedule = ZoomSchedule::new(Variant::Mandelbrot, ZoomProfile::Threaded);
        assert_eq!(schedule.frames().count(), expected_geometric_frames(0.99));
        let custom = schedule.with_decay(Decay::Geometric(0.98)).unwrap();
        assert_eq!(custom.frames().count(), 570);
    }

    #[test]
    fn decays_that_never_arrive_are_refused() {
        let schedule = ZoomSchedule::new(Variant::Mandelbrot, ZoomProfile::Threaded);
        for decay in &[
            Decay::Geometric(1.0),
            Decay::Geometric(1.5),
            Decay::Geometric(0.0),
            Decay::Geometric(std::f64::NAN),
            Decay::Linear(0.0),
            Decay::Linear(-0.01),
            Decay::Linear(std::f64::INFINITY),
        ] {
            assert!(schedule.with_decay(*decay).is_err(), "{:?}", decay);
        }
        assert!(schedule.with_decay(Decay::Linear(0.5)).is_ok());
    }

    #[test]
    fn late_frames_do_not_wrap() {
        let schedule = ZoomSchedule::new(Variant::Mandelbrot, ZoomProfile::Gpu);
        let late = Decay::Geometric(0.98).at(1.0, u32::max_value());
        assert_eq!(late, 0.0);
        assert!(late <= schedule.stop);

        let mut stuck = ZoomSchedule::new(Variant::Julia, ZoomProfile::Gpu);
        stuck.decay = Decay::Linear(0.0);
        let mut frames = stuck.frames();
        frames.frame = Some(u32::max_value());
        assert_eq!(frames.next().map(|f| f.frame), Some(u32::max_value()));
        assert_eq!(frames.next(), None);
    }

    #[test]
    fn julia_runs_exactly_350_frames() {
        for profile in &[ZoomProfile::Threaded, ZoomProfile::Gpu] {
            let schedule = ZoomSchedule::new(Variant::Julia, *profile);
            let frames: Vec<ZoomStep> = schedule.frames().collect();
            assert_eq!(frames.len(), 350);
            assert!(frames.last().unwrap().zoom > -2.5);
        }
    }

    #[test]
    fn budget_dips_in_the_shallow_band() {
        let schedule = ZoomSchedule::new(Variant::Julia, ZoomProfile::Threaded);
        assert_eq!(schedule.max_iterations(1.0), 170);
        assert_eq!(schedule.max_iterations(-0.02), 170);
        assert_eq!(schedule.max_iterations(-0.5), 100);
        assert_eq!(schedule.max_iterations(-1.0), 170);
        assert_eq!(schedule.max_iterations(-2.0), 170);
        let shallow = schedule
            .frames()
            .filter(|f| f.max_iterations == SHALLOW_BUDGET)
            .count();
        assert!(shallow > 90 && shallow < 100, "{} shallow frames", shallow);
    }

    #[test]
    fn advance_steps_and_stops() {
        let m = ZoomSchedule::new(Variant::Mandelbrot, ZoomProfile::Gpu);
        let (zoom, budget) = m.advance(1.0).unwrap();
        assert!((zoom - 0.98).abs() < 1e-15);
        assert_eq!(budget, 256);
        assert_eq!(m.advance(0.00001), None);

        let j = ZoomSchedule::new(Variant::Julia, ZoomProfile::Threaded);
        let (zoom, budget) = j.advance(-0.5).unwrap();
        assert!((zoom + 0.51).abs() < 1e-12);
        assert_eq!(budget, 100);
        assert_eq!(j.advance(-2.495), None);
    }

    #[test]
    fn steps_build_requests() {
        let step = ZoomSchedule::new(Variant::Julia, ZoomProfile::Gpu)
            .frames()
            .nth(3)
            .unwrap();
        let req = step.request(320, 200);
        assert_eq!(req.variant, Variant::Julia);
        assert_eq!(req.width, 320);
        assert!((req.zoom - 0.97).abs() < 1e-12);
        assert_eq!(req.max_iterations, 256);
    }
}
