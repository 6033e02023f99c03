extern crate fractal_zoom;
extern crate test_log;

use std::collections::HashMap;

use fractal_zoom::{
    map, partition, CacheConfig, CacheKey, Engine, EngineConfig, FrameRequest, IterationResult,
    OutputBuffer, Pixel, Variant,
};
use test_log::test;

fn render(workers: usize, cache: bool, request: &FrameRequest) -> OutputBuffer {
    let mut config = EngineConfig::default().with_workers(workers);
    if cache {
        config = config.with_cache(CacheConfig::default());
    }
    Engine::new(config).unwrap().render(request).unwrap()
}

// At this size neighbouring pixels never share a cache cell, so the
// cache cannot change a single count within the frame.
fn coarse(variant: Variant) -> FrameRequest {
    FrameRequest::new(320, 240, 1.0, 170, variant)
}

#[test]
fn worker_count_does_not_change_the_frame() {
    for variant in &[Variant::Mandelbrot, Variant::Julia] {
        let request = coarse(*variant);
        let reference = render(1, false, &request);
        for workers in &[1, 4, 16] {
            assert_eq!(render(*workers, true, &request), reference, "{} workers", workers);
            assert_eq!(render(*workers, false, &request), reference, "{} workers", workers);
        }
    }
}

#[test]
fn odd_sizes_are_fully_computed() {
    let request = FrameRequest::new(203, 97, 1.0, 170, Variant::Mandelbrot);
    let frame = render(7, false, &request);
    let tiles = partition(203, 97, 7).unwrap();
    let last = tiles.iter().find(|t| t.contains(Pixel(202, 96))).unwrap();
    assert_eq!((last.x1, last.y1), (203, 97));

    // The rightmost column sits at re = 1.0 - 3.5/203 and escapes
    // everywhere; a dropped strip would read as never escaping.
    for y in 0..97 {
        assert!(frame.get(Pixel(202, y)).unwrap().escaped, "pixel (202, {})", y);
    }
}

#[test]
fn interior_pixels_report_zero_and_not_escaped() {
    let frame = render(4, false, &coarse(Variant::Mandelbrot));
    // Pixel (205, 120) maps to about -0.258 + 0i, inside the main cardioid.
    let centre = frame.get(Pixel(205, 120)).unwrap();
    assert!(!centre.escaped);
    assert_eq!(centre.count, 0);
    let counts = frame.counts();
    assert_eq!(counts.len(), 320 * 240);
    assert!(counts.iter().zip(frame.results()).all(|(c, r)| r.escaped || *c == 0));
}

#[test]
fn the_cache_carries_across_frames() {
    let engine = Engine::new(
        EngineConfig::default()
            .with_workers(4)
            .with_cache(CacheConfig::default()),
    )
    .unwrap();
    let first = FrameRequest::new(160, 120, 1.0, 170, Variant::Mandelbrot);
    let second = FrameRequest::new(160, 120, 0.99, 170, Variant::Mandelbrot);
    engine.render(&first).unwrap();
    let stored = engine.cache().unwrap().len();
    assert!(stored > 0);
    engine.render(&second).unwrap();
    assert!(engine.cache().unwrap().stats().hits > 0);
}

#[test]
fn shared_cells_only_lend_counts_between_neighbours() {
    // Ten cells per unit puts a few dozen pixels of this frame in every
    // cell, so workers race to fill and read the same entries.
    let request = FrameRequest::new(160, 120, 1.0, 170, Variant::Mandelbrot);
    let cells = CacheConfig { resolution: 10 };
    let exact = render(1, false, &request);

    let mut lenders: HashMap<CacheKey, Vec<IterationResult>> = HashMap::new();
    for y in 0..request.height {
        for x in 0..request.width {
            let result = *exact.get(Pixel(x, y)).unwrap();
            if result.escaped {
                let key = CacheKey::quantize(&map(Pixel(x, y), &request), cells.resolution);
                lenders.entry(key).or_insert_with(Vec::new).push(result);
            }
        }
    }

    for workers in &[1, 4, 16] {
        let engine = Engine::new(
            EngineConfig::default()
                .with_workers(*workers)
                .with_cache(cells),
        )
        .unwrap();
        let frame = engine.render(&request).unwrap();
        let mut borrowed = 0;
        for y in 0..request.height {
            for x in 0..request.width {
                let own = exact.get(Pixel(x, y)).unwrap();
                let got = frame.get(Pixel(x, y)).unwrap();
                if got == own {
                    continue;
                }
                let key = CacheKey::quantize(&map(Pixel(x, y), &request), cells.resolution);
                let neighbours = lenders.get(&key).map(Vec::as_slice).unwrap_or(&[]);
                assert!(
                    neighbours.contains(got),
                    "{} workers: pixel ({}, {}) got {:?}, which no pixel of its cell produced",
                    workers,
                    x,
                    y,
                    got
                );
                borrowed += 1;
            }
        }
        assert!(borrowed > 0, "{} workers: no pixel reused a neighbour's count", workers);
        assert!(engine.cache().unwrap().stats().hits > 0);
    }
}
