extern crate assert_cmd;
extern crate predicates;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

#[test]
fn runs_a_short_julia_sequence() {
    Command::cargo_bin("zoom")
        .unwrap()
        .env("RUST_LOG", "info")
        .env("FRACTAL_VARIANT", "julia")
        .env("FRACTAL_SIZE", "40x30")
        .env("FRACTAL_FRAMES", "3")
        .env("FRACTAL_WORKERS", "4")
        .env("FRACTAL_CACHE", "on")
        .assert()
        .success()
        .stderr(predicate::str::contains("3 frames in"));
}

#[test]
fn refuses_unknown_variants() {
    Command::cargo_bin("zoom")
        .unwrap()
        .env("RUST_LOG", "info")
        .env("FRACTAL_VARIANT", "buddhabrot")
        .assert()
        .failure()
        .stderr(predicate::str::contains("mandelbrot or julia"));
}

#[test]
fn refuses_zero_workers() {
    Command::cargo_bin("zoom")
        .unwrap()
        .env("RUST_LOG", "info")
        .env("FRACTAL_WORKERS", "0")
        .env("FRACTAL_SIZE", "10x10")
        .env("FRACTAL_FRAMES", "1")
        .assert()
        .failure()
        .stderr(predicate::str::contains("worker count must be positive"));
}
