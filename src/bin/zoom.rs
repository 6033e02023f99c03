// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

extern crate env_logger;
extern crate fractal_zoom;
#[macro_use]
extern crate log;

use std::env;
use std::str::FromStr;

use fractal_zoom::{Engine, EngineConfig, Error, Variant};

const VARIANT: &str = "FRACTAL_VARIANT";
const SIZE: &str = "FRACTAL_SIZE";
const FRAMES: &str = "FRACTAL_FRAMES";

fn parse_pair<T>(s: &str, separator: char) -> Option<(T, T)>
where
    T: FromStr,
{
    match s.find(separator) {
        None => None,
        Some(index) => match (T::from_str(&s[..index]), T::from_str(&s[index + 1..])) {
            (Ok(l), Ok(r)) => Some((l, r)),
            _ => None,
        },
    }
}

struct Settings {
    variant: Variant,
    size: (u32, u32),
    frames: Option<u32>,
}

fn settings() -> Result<Settings, Error> {
    let variant = match env::var(VARIANT) {
        Ok(name) => Variant::from_name(&name)
            .ok_or_else(|| Error::invalid(format!("{} must be mandelbrot or julia", VARIANT)))?,
        Err(_) => Variant::Mandelbrot,
    };
    let size = match env::var(SIZE) {
        Ok(s) => parse_pair(&s, 'x')
            .ok_or_else(|| Error::invalid(format!("could not parse {}={:?}", SIZE, s)))?,
        Err(_) => (800, 600),
    };
    let frames = match env::var(FRAMES) {
        Ok(s) => Some(
            u32::from_str(&s).map_err(|_| Error::invalid(format!("could not parse {}={:?}", FRAMES, s)))?,
        ),
        Err(_) => None,
    };
    Ok(Settings {
        variant,
        size,
        frames,
    })
}

fn zoom() -> Result<(), Error> {
    let settings = settings()?;
    let engine = Engine::new(EngineConfig::from_env()?)?;
    let schedule = engine.schedule(settings.variant);
    let (width, height) = settings.size;
    info!(
        "zooming into the {:?} set at {}x{}",
        settings.variant, width, height
    );

    let summary = engine.run(&schedule, width, height, |step, frame| {
        info!(
            "frame {:4} zoom {:+.6} budget {:3}: {} of {} pixels escaped",
            step.frame,
            step.zoom,
            step.max_iterations,
            frame.escaped_count(),
            frame.results().len()
        );
        settings.frames.map_or(true, |limit| step.frame + 1 < limit)
    })?;
    info!("{} frames in {:?}", summary.frames, summary.elapsed);
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_micros()
        .init();

    if let Err(e) = zoom() {
        error!("Render failure: {}", e);
        std::process::exit(1);
    }
}
