//! Static assignment of disjoint screen tiles to ranks.
//!
//! Every rank owns exactly one tile (possibly empty when there are more ranks
//! than rows or columns to hand out). Tiles are disjoint and their union is
//! the global rectangle, so every pixel has exactly one owner.

use std::str::FromStr;

use crate::error::CompositeError;
use crate::image::Bounds;
use crate::image::bounds::balanced_range;

/// How the global rectangle is cut into tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TileLayout {
    /// Horizontal stripes of (almost) equal height.
    #[default]
    Rows,
    /// A grid whose cells are as close to square as the rank count allows.
    Blocks,
}

impl FromStr for TileLayout {
    type Err = CompositeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rows" | "stripes" => Ok(TileLayout::Rows),
            "blocks" | "grid" => Ok(TileLayout::Blocks),
            other => Err(CompositeError::ConfigurationError(format!("unknown tile layout '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileMap {
    global: Bounds,
    /// `tiles[rank]` is the region that rank owns.
    tiles: Vec<Bounds>,
}

impl TileMap {
    pub fn new(global: Bounds, ranks: usize, layout: TileLayout) -> Self {
        let ranks = ranks.max(1);
        let tiles = if global.is_empty() {
            vec![Bounds::empty(); ranks]
        } else {
            match layout {
                TileLayout::Rows => grid(&global, 1, ranks),
                TileLayout::Blocks => {
                    let (nx, ny) = grid_shape(global.width(), global.height(), ranks);
                    grid(&global, nx, ny)
                }
            }
        };
        Self { global, tiles }
    }

    pub fn global(&self) -> Bounds {
        self.global
    }

    pub fn tile(&self, rank: usize) -> Bounds {
        self.tiles.get(rank).copied().unwrap_or_else(Bounds::empty)
    }

    pub fn tiles(&self) -> &[Bounds] {
        &self.tiles
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    #[cfg(test)]
    fn owner_of(&self, x: i32, y: i32) -> Option<usize> {
        self.tiles.iter().position(|t| t.contains(x, y))
    }

    /// `(rank, part of region in that rank's tile)` for every owner the region
    /// touches.
    pub fn overlapping<'a>(&'a self, region: &'a Bounds) -> impl Iterator<Item = (usize, Bounds)> + 'a {
        self.tiles.iter().enumerate().filter_map(move |(rank, t)| {
            let part = t.intersect(region);
            (!part.is_empty()).then_some((rank, part))
        })
    }
}

/// `nx * ny` tiles, rank = `iy * nx + ix`.
fn grid(global: &Bounds, nx: usize, ny: usize) -> Vec<Bounds> {
    let mut tiles = Vec::with_capacity(nx * ny);
    for iy in 0..ny {
        let (y0, y1) = balanced_range(global.y_min, global.height(), ny, iy);
        for ix in 0..nx {
            let (x0, x1) = balanced_range(global.x_min, global.width(), nx, ix);
            let t = Bounds::new(x0, x1, y0, y1);
            tiles.push(if t.is_empty() { Bounds::empty() } else { t });
        }
    }
    tiles
}

/// Factor pair `nx * ny == ranks` whose cells come closest to square.
fn grid_shape(width: usize, height: usize, ranks: usize) -> (usize, usize) {
    let mut best = (1, ranks);
    let mut best_cost = f64::INFINITY;
    for nx in (1..=ranks).filter(|nx| ranks % nx == 0) {
        let ny = ranks / nx;
        let cost = (width as f64 / nx as f64 - height as f64 / ny as f64).abs();
        if cost < best_cost {
            best = (nx, ny);
            best_cost = cost;
        }
    }
    best
}
