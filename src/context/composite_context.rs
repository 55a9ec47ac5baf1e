//! Driver for one compositing call.
//!
//! This module provides the `CompositeContext` struct, which acts as a
//! factory and context holder for the compositing algorithms (direct-send,
//! radix-k and the gather-to-one collector). It validates the call on every
//! rank, makes sure all ranks agree on their configuration, runs the selected
//! algorithm and delivers the final image.
//!
//! # Usage
//!
//! 1. Construct a `CompositeContext` with the desired `CompositeOptions`.
//! 2. On every rank, call `composite` with the same communicator group, the
//!    rank's local partial images and the same `CompositeMode`.
//!
//! # Failure handling
//!
//! Local problems (a missing depth buffer, an unknown partition id) are not
//! raised straight away: every rank first shares a status byte together with
//! its configuration fingerprint. Then all ranks fail together, the
//! offending rank with its own error and the others with a
//! `ConfigurationError` naming it, instead of leaving peers blocked in a
//! collective.

use std::collections::HashSet;
use std::str::FromStr;

use num_traits::Float;

use crate::compositor::{Collector, CompositeJob, Compositor, Delivery, DirectSend, Fragment, RadixK, assemble};
use crate::config::CompositeOptions;
use crate::context::mode::CompositeMode;
use crate::error::CompositeError;
use crate::image::wire::Reader;
use crate::image::{Bounds, Image, MergeMode, PartitionId};
use crate::parallel::Comm;
use crate::utils::tiling::TileLayout;

/// Enum representing the available compositing algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompositorKind {
    /// Pick by rank count: collector for one rank, direct-send up to
    /// `direct_send_limit`, radix-k beyond.
    #[default]
    Auto,
    /// One all-to-all round over static tiles.
    DirectSend,
    /// Multi-round factored exchange.
    RadixK,
    /// Everything to one rank.
    Collector,
}

impl FromStr for CompositorKind {
    type Err = CompositeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "auto" => Ok(CompositorKind::Auto),
            "direct_send" | "directsend" => Ok(CompositorKind::DirectSend),
            "radix_k" | "radixk" => Ok(CompositorKind::RadixK),
            "collector" | "gather" => Ok(CompositorKind::Collector),
            other => Err(CompositeError::ConfigurationError(format!("unknown compositor '{other}'"))),
        }
    }
}

/// Context and configuration for compositing calls.
#[derive(Debug, Clone, Default)]
pub struct CompositeContext {
    pub options: CompositeOptions,
}

/// What one rank found while preparing its inputs.
struct Prepared {
    fragments: Vec<Fragment>,
    union: Bounds,
    all_depth: bool,
    ids: Vec<PartitionId>,
}

/// What one rank tells the others before any image data moves.
#[derive(Debug, PartialEq)]
struct Summary {
    failed: bool,
    config: Vec<u8>,
    union: Bounds,
    all_depth: bool,
    ids: Vec<PartitionId>,
}

impl CompositeContext {
    pub fn new(options: CompositeOptions) -> Self {
        #[cfg(feature = "rayon")]
        crate::parallel::init_merge_pool(options.merge_threads);
        Self { options }
    }

    /// The algorithm `composite` runs on a group of `size` ranks.
    pub fn resolve_kind(&self, size: usize) -> CompositorKind {
        match self.options.strategy {
            CompositorKind::Auto if size <= 1 => CompositorKind::Collector,
            CompositorKind::Auto if size <= self.options.direct_send_limit => CompositorKind::DirectSend,
            CompositorKind::Auto => CompositorKind::RadixK,
            kind => kind,
        }
    }

    /// Composite the local partial images of every rank into one image.
    ///
    /// Must be called collectively by all ranks of `comm`. Returns the final
    /// image on the ranks the configured `Delivery` names and `None` on the
    /// others; with `Delivery::Tiles` each rank gets the region it owns.
    ///
    /// # Errors
    /// * `MissingBufferError` in z-buffer mode when an input has no depth.
    /// * `ConfigurationError` when ranks disagree on options, mode or view,
    ///   when a partition id is unknown or repeated, or when another rank
    ///   rejected its inputs.
    /// * `MessagingFailure` when the transport fails.
    pub fn composite<C: Comm, T: Float>(
        &self,
        comm: &C,
        images: Vec<Image>,
        mode: &CompositeMode<T>,
    ) -> Result<Option<Image>, CompositeError> {
        let (rank, size) = (comm.rank(), comm.size());
        let merge = mode.merge_mode();

        let prepared = self.prepare(images, mode, size);
        let mut mine = Summary {
            failed: prepared.is_err(),
            config: self.fingerprint(mode),
            union: Bounds::empty(),
            all_depth: true,
            ids: Vec::new(),
        };
        if let Ok(p) = &prepared {
            mine.union = p.union;
            mine.all_depth = p.all_depth;
            mine.ids = p.ids.clone();
        }
        let summaries = comm
            .all_gather(&mine.encode())?
            .iter()
            .map(|b| Summary::decode(b))
            .collect::<Result<Vec<_>, _>>()?;
        let prepared = prepared?;

        if let Some(r) = summaries.iter().position(|s| s.failed) {
            return Err(CompositeError::ConfigurationError(format!("rank {r} rejected its inputs")));
        }
        if let Some(r) = summaries.iter().position(|s| s.config != mine.config) {
            return Err(CompositeError::ConfigurationError(format!(
                "rank {r} disagrees with rank {rank} on options, mode or view"
            )));
        }
        let mut seen = HashSet::new();
        for s in &summaries {
            if let Some(id) = s.ids.iter().find(|id| !seen.insert(**id)) {
                return Err(CompositeError::ConfigurationError(format!(
                    "partition {id} is contributed more than once"
                )));
            }
        }

        let global = self
            .options
            .global_bounds
            .unwrap_or_else(|| summaries.iter().fold(Bounds::empty(), |b, s| b.union(&s.union)));
        let has_depth = merge == MergeMode::ZBuffer || summaries.iter().all(|s| s.all_depth);
        let kind = self.resolve_kind(size);
        log::info!(
            target: "sortlast::context",
            "rank {rank}/{size}: {kind:?} {merge:?} compositing of {} fragments over {global}",
            prepared.fragments.len(),
        );

        let job = CompositeJob { fragments: prepared.fragments, global, mode: merge, has_depth };
        let collector_root = match self.options.delivery {
            Delivery::Root(r) => r,
            _ => 0,
        };
        let owned = match kind {
            CompositorKind::DirectSend => DirectSend::new(self.options.tile_layout).composite(comm, &job)?,
            CompositorKind::RadixK => RadixK::new(self.options.radix_target).composite(comm, &job)?,
            CompositorKind::Collector | CompositorKind::Auto => Collector::new(collector_root).composite(comm, &job)?,
        };

        let mut result = match (kind, self.options.delivery) {
            (CompositorKind::Collector, Delivery::Root(_)) => owned,
            (_, delivery) => assemble(comm, owned, global, has_depth, delivery)?,
        };
        if let (Some(img), Some(bg)) = (result.as_mut(), self.options.background) {
            img.composite_background(bg);
        }
        Ok(result)
    }

    /// Check this rank's inputs and turn them into fragments.
    fn prepare<T: Float>(
        &self,
        images: Vec<Image>,
        mode: &CompositeMode<T>,
        size: usize,
    ) -> Result<Prepared, CompositeError> {
        if let Delivery::Root(r) = self.options.delivery {
            if r >= size {
                return Err(CompositeError::ConfigurationError(format!(
                    "delivery root {r} outside communicator of size {size}"
                )));
            }
        }
        let order = mode.visibility()?;
        let merge = mode.merge_mode();
        let mut p = Prepared { fragments: Vec::with_capacity(images.len()), union: Bounds::empty(), all_depth: true, ids: Vec::new() };
        for image in images {
            if image.is_empty() {
                log::debug!(target: "sortlast::context", "skipping empty {image}");
                continue;
            }
            let id = image.partition();
            if merge == MergeMode::ZBuffer && !image.has_depth() {
                return Err(CompositeError::MissingBufferError(id));
            }
            let position = match &order {
                Some(order) => order.position(id).ok_or_else(|| {
                    CompositeError::ConfigurationError(format!("partition {id} has no descriptor"))
                })?,
                None => 0,
            };
            p.union = p.union.union(&image.bounds());
            p.all_depth &= image.has_depth();
            p.ids.push(id);
            p.fragments.push(Fragment::new(position as u32, image));
        }
        Ok(p)
    }

    /// Everything that must be identical on every rank.
    fn fingerprint<T: Float>(&self, mode: &CompositeMode<T>) -> Vec<u8> {
        let o = &self.options;
        let mut out = Vec::new();
        out.push(match o.strategy {
            CompositorKind::Auto => 0,
            CompositorKind::DirectSend => 1,
            CompositorKind::RadixK => 2,
            CompositorKind::Collector => 3,
        });
        let (tag, root) = match o.delivery {
            Delivery::Root(r) => (0u8, r as u32),
            Delivery::AllRanks => (1, 0),
            Delivery::Tiles => (2, 0),
        };
        out.push(tag);
        out.extend_from_slice(&root.to_le_bytes());
        out.push(match o.tile_layout {
            TileLayout::Rows => 0,
            TileLayout::Blocks => 1,
        });
        out.extend_from_slice(&(o.radix_target as u32).to_le_bytes());
        out.extend_from_slice(&(o.direct_send_limit as u32).to_le_bytes());
        match o.global_bounds {
            Some(b) => {
                out.push(1);
                for v in [b.x_min, b.x_max, b.y_min, b.y_max] {
                    out.extend_from_slice(&v.to_le_bytes());
                }
            }
            None => out.push(0),
        }
        match o.background {
            Some(c) => {
                out.push(1);
                for v in c {
                    out.extend_from_slice(&v.to_bits().to_le_bytes());
                }
            }
            None => out.push(0),
        }
        mode.fingerprint(&mut out);
        out
    }
}

impl Summary {
    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(32 + self.config.len() + 4 * self.ids.len());
        out.push(u8::from(self.failed));
        out.extend_from_slice(&(self.config.len() as u32).to_le_bytes());
        out.extend_from_slice(&self.config);
        for v in [self.union.x_min, self.union.x_max, self.union.y_min, self.union.y_max] {
            out.extend_from_slice(&v.to_le_bytes());
        }
        out.push(u8::from(self.all_depth));
        out.extend_from_slice(&(self.ids.len() as u32).to_le_bytes());
        for id in &self.ids {
            out.extend_from_slice(&id.to_le_bytes());
        }
        out
    }

    fn decode(bytes: &[u8]) -> Result<Self, CompositeError> {
        let mut r = Reader::new(bytes);
        let failed = r.u8()? != 0;
        let len = r.u32()? as usize;
        let config = r.take(len)?.to_vec();
        let union = Bounds::new(r.i32()?, r.i32()?, r.i32()?, r.i32()?);
        let all_depth = r.u8()? != 0;
        let n = r.u32()? as usize;
        let mut ids = Vec::with_capacity(n.min(1 << 16));
        for _ in 0..n {
            ids.push(r.u32()?);
        }
        r.finish()?;
        Ok(Summary { failed, config, union, all_depth, ids })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_selection_follows_rank_count() {
        let ctx = CompositeContext { options: CompositeOptions { direct_send_limit: 4, ..Default::default() } };
        assert_eq!(ctx.resolve_kind(1), CompositorKind::Collector);
        assert_eq!(ctx.resolve_kind(4), CompositorKind::DirectSend);
        assert_eq!(ctx.resolve_kind(5), CompositorKind::RadixK);
        let fixed = CompositeContext {
            options: CompositeOptions { strategy: CompositorKind::RadixK, ..Default::default() },
        };
        assert_eq!(fixed.resolve_kind(1), CompositorKind::RadixK);
    }

    #[test]
    fn summary_round_trip() {
        let s = Summary {
            failed: false,
            config: vec![1, 2, 3],
            union: Bounds::new(0, 7, 2, 3),
            all_depth: true,
            ids: vec![4, 9],
        };
        assert_eq!(Summary::decode(&s.encode()).unwrap(), s);
    }

    #[test]
    fn fingerprint_tracks_view() {
        use crate::utils::visibility::PartitionDescriptor;
        let ctx = CompositeContext::default();
        let parts = vec![PartitionDescriptor::new(0, [0.0, 0.0, 0.0])];
        let a = CompositeMode::Blend { view_dir: [0.0, 0.0, 1.0], partitions: parts.clone() };
        let b = CompositeMode::Blend { view_dir: [0.0, 1.0, 0.0], partitions: parts };
        assert_ne!(ctx.fingerprint(&a), ctx.fingerprint(&b));
        assert_ne!(ctx.fingerprint(&a), ctx.fingerprint(&CompositeMode::<f64>::ZBuffer));
        assert_eq!("radix-k".parse::<CompositorKind>().unwrap(), CompositorKind::RadixK);
    }
}
