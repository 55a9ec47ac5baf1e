//! Final assembly of the per-rank composited regions.

use std::str::FromStr;

use crate::error::CompositeError;
use crate::image::{Bounds, Image};
use crate::parallel::Comm;

/// Where the finished image ends up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Whole image on one rank; the others get `None`.
    Root(usize),
    /// Whole image replicated on every rank.
    AllRanks,
    /// No final gather: each rank keeps the region it composited.
    Tiles,
}

impl Default for Delivery {
    fn default() -> Self {
        Delivery::Root(0)
    }
}

impl FromStr for Delivery {
    type Err = CompositeError;

    /// `root`, `root:N`, `all` or `tiles`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.to_ascii_lowercase();
        match s.as_str() {
            "root" => Ok(Delivery::Root(0)),
            "all" | "replicated" => Ok(Delivery::AllRanks),
            "tiles" | "none" => Ok(Delivery::Tiles),
            other => other
                .strip_prefix("root:")
                .and_then(|r| r.parse().ok())
                .map(Delivery::Root)
                .ok_or_else(|| CompositeError::ConfigurationError(format!("unknown delivery '{other}'"))),
        }
    }
}

/// Stitch every rank's `owned` region into the image of `global` according
/// to `delivery`. Regions are disjoint, so stitching is a plain copy.
pub fn assemble<C: Comm>(
    comm: &C,
    owned: Option<Image>,
    global: Bounds,
    has_depth: bool,
    delivery: Delivery,
) -> Result<Option<Image>, CompositeError> {
    let bytes = owned.as_ref().map(Image::to_bytes).unwrap_or_default();
    let parts = match delivery {
        Delivery::Tiles => return Ok(owned),
        Delivery::Root(root) => match comm.gather(&bytes, root)? {
            Some(parts) => parts,
            None => return Ok(None),
        },
        Delivery::AllRanks => comm.all_gather(&bytes)?,
    };
    let mut canvas = Image::new(global, has_depth);
    for part in parts.iter().filter(|p| !p.is_empty()) {
        let tile = Image::from_bytes(part)?;
        if tile.bounds().overlaps(&global) {
            canvas.paste(&tile)?;
        }
    }
    log::debug!(target: "sortlast::gather", "rank {}: assembled {}", comm.rank(), canvas);
    Ok(Some(canvas))
}
