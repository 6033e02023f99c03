// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Splits a frame into one rectangular tile per worker.
//!
//! The tiles are laid out on a near-square grid, `split` tiles wide.
//! Tile `k` sits in column `k mod split` and row `k div split`, and
//! measures `width / split` by `height / split`.  The last tile of
//! every row runs to the right edge and the tiles of the last row run
//! to the bottom edge, so every pixel belongs to exactly one tile even
//! when the grid has fewer than `split` rows.

use std::fmt;

use itertools::iproduct;

use crate::errors::{Error, Result};
use crate::planes::Pixel;

/// A half-open rectangle of pixels, `[x0, x1) × [y0, y1)`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Tile {
    /// Left edge, inclusive.
    pub x0: u32,
    /// Top edge, inclusive.
    pub y0: u32,
    /// Right edge, exclusive.
    pub x1: u32,
    /// Bottom edge, exclusive.
    pub y1: u32,
}

impl fmt::Display for Tile {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[{}, {}) x [{}, {})", self.x0, self.x1, self.y0, self.y1)
    }
}

impl Tile {
    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.x1 - self.x0
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.y1 - self.y0
    }

    /// Number of pixels in the tile.
    pub fn len(&self) -> usize {
        self.width() as usize * self.height() as usize
    }

    /// A tile can be empty when the frame is narrower or shorter than
    /// the grid.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True if the pixel lies inside the tile.
    pub fn contains(&self, pixel: Pixel) -> bool {
        pixel.0 >= self.x0 && pixel.0 < self.x1 && pixel.1 >= self.y0 && pixel.1 < self.y1
    }

    /// Every pixel of the tile, row by row.
    pub fn pixels(&self) -> impl Iterator<Item = Pixel> {
        iproduct!(self.y0..self.y1, self.x0..self.x1).map(|(y, x)| Pixel(x, y))
    }
}

/// Columns of the tile grid for a given worker count.
pub fn grid_split(worker_count: usize) -> usize {
    match worker_count {
        0 | 1 => 1,
        2 => 2,
        n => {
            let root = (n as f64).sqrt().ceil() as usize;
            // Guard against the float root landing one off.
            if (root - 1) * (root - 1) >= n {
                root - 1
            } else if root * root < n {
                root + 1
            } else {
                root
            }
        }
    }
}

/// Lays out exactly `worker_count` tiles covering a `width × height`
/// frame.
pub fn partition(width: u32, height: u32, worker_count: usize) -> Result<Vec<Tile>> {
    if worker_count == 0 {
        return Err(Error::invalid("cannot partition a frame among zero workers"));
    }
    let split = grid_split(worker_count);
    let rows = (worker_count + split - 1) / split;
    let tile_width = width / split as u32;
    let tile_height = height / split as u32;

    let tiles = (0..worker_count)
        .map(|k| {
            let column = (k % split) as u32;
            let row = (k / split) as u32;
            let last_in_row = k % split == split - 1 || k == worker_count - 1;
            let last_row = row as usize == rows - 1;
            let x0 = column * tile_width;
            let y0 = row * tile_height;
            Tile {
                x0,
                y0,
                x1: if last_in_row { width } else { x0 + tile_width },
                y1: if last_row { height } else { y0 + tile_height },
            }
        })
        .collect();
    Ok(tiles)
}
