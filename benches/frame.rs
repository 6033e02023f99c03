#[macro_use]
extern crate criterion;
extern crate fractal_zoom;

use criterion::{black_box, Criterion};
use fractal_zoom::{CacheConfig, Engine, EngineConfig, FrameRequest, Variant};

fn engine(workers: usize, cache: bool) -> Engine {
    let mut config = EngineConfig::default().with_workers(workers);
    if cache {
        config = config.with_cache(CacheConfig::default());
    }
    Engine::new(config).unwrap()
}

fn mandelbrot_frames(c: &mut Criterion) {
    let request = FrameRequest::new(400, 300, 0.5, 170, Variant::Mandelbrot);
    let single = engine(1, false);
    c.bench_function("mandelbrot 400x300, 1 worker", move |b| {
        b.iter(|| single.render(black_box(&request)).unwrap())
    });
    let many = engine(16, false);
    c.bench_function("mandelbrot 400x300, 16 workers", move |b| {
        b.iter(|| many.render(black_box(&request)).unwrap())
    });
    let cached = engine(16, true);
    c.bench_function("mandelbrot 400x300, 16 workers, warm cache", move |b| {
        b.iter(|| cached.render(black_box(&request)).unwrap())
    });
}

fn julia_frames(c: &mut Criterion) {
    let request = FrameRequest::new(400, 300, -0.4, 100, Variant::Julia);
    let many = engine(16, false);
    c.bench_function("julia 400x300, 16 workers", move |b| {
        b.iter(|| many.render(black_box(&request)).unwrap())
    });
}

criterion_group!(benches, mandelbrot_frames, julia_frames);
criterion_main!(benches);
