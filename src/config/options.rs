//! Command-line or API options for compositing.
//!
//! This module provides the `CompositeOptions` struct, which selects the
//! compositing algorithm, where the final image is delivered and how the
//! screen is tiled. Options can be filled in directly or from PETSc-style
//! `-key value` pairs:
//!
//! ```text
//! -composite_strategy radix_k -composite_radix 4 -composite_delivery all
//! ```
//!
//! Every rank must end up with the same options; the context checks that
//! before any image data moves.

use crate::compositor::Delivery;
use crate::context::CompositorKind;
use crate::error::CompositeError;
use crate::image::Bounds;
use crate::utils::tiling::TileLayout;

/// Compositing algorithm & parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeOptions {
    /// Algorithm (auto, direct_send, radix_k, collector)
    pub strategy: CompositorKind,

    /// Where the final image ends up
    pub delivery: Delivery,

    /// Tile shape for direct-send
    pub tile_layout: TileLayout,

    /// Largest per-round group size for radix-k
    pub radix_target: usize,

    /// `Auto` picks direct-send up to this many ranks, radix-k beyond
    pub direct_send_limit: usize,

    /// Screen rectangle of the final image; the union of all inputs if unset
    pub global_bounds: Option<Bounds>,

    /// Straight-alpha color blended under the final image
    pub background: Option<[f32; 4]>,

    /// Threads for the per-pixel merge (rayon); all cores if unset
    pub merge_threads: Option<usize>,
}

impl Default for CompositeOptions {
    fn default() -> Self {
        Self {
            strategy: CompositorKind::Auto,
            delivery: Delivery::Root(0),
            tile_layout: TileLayout::Rows,
            radix_target: 8,
            direct_send_limit: 16,
            global_bounds: None,
            background: None,
            merge_threads: None,
        }
    }
}

impl CompositeOptions {
    /// Parse `-key value` pairs on top of the defaults. Unrelated keys (not
    /// starting with `-composite_`) are skipped together with their value.
    pub fn from_args<I, S>(args: I) -> Result<Self, CompositeError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut opts = Self::default();
        let mut it = args.into_iter();
        while let Some(key) = it.next() {
            let key = key.as_ref().to_owned();
            let value = it
                .next()
                .ok_or_else(|| CompositeError::ConfigurationError(format!("option {key} needs a value")))?;
            if key.starts_with("-composite_") {
                opts.set(&key, value.as_ref())?;
            }
        }
        Ok(opts)
    }

    /// Set one option by name.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), CompositeError> {
        let bad = |what: &str| CompositeError::ConfigurationError(format!("invalid {what} '{value}' for {key}"));
        match key.trim_start_matches('-') {
            "composite_strategy" => self.strategy = value.parse()?,
            "composite_delivery" => self.delivery = value.parse()?,
            "composite_tiles" => self.tile_layout = value.parse()?,
            "composite_radix" => self.radix_target = value.parse().map_err(|_| bad("radix"))?,
            "composite_direct_send_limit" => {
                self.direct_send_limit = value.parse().map_err(|_| bad("rank count"))?
            }
            "composite_bounds" => {
                let v = parse_list::<i32>(value).filter(|v| v.len() == 4).ok_or_else(|| bad("bounds"))?;
                self.global_bounds = Some(Bounds::new(v[0], v[1], v[2], v[3]));
            }
            "composite_background" => {
                let v = parse_list::<f32>(value).filter(|v| v.len() == 4).ok_or_else(|| bad("color"))?;
                self.background = Some([v[0], v[1], v[2], v[3]]);
            }
            "composite_threads" => self.merge_threads = Some(value.parse().map_err(|_| bad("thread count"))?),
            _ => {
                return Err(CompositeError::ConfigurationError(format!("unknown option {key}")));
            }
        }
        Ok(())
    }
}

fn parse_list<T: std::str::FromStr>(s: &str) -> Option<Vec<T>> {
    s.split(',').map(|p| p.trim().parse().ok()).collect()
}
