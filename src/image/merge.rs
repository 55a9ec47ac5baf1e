//! Per-pixel merge kernels.
//!
//! Both kernels work on one row of the overlap between a destination and a
//! source image; the caller slices the rows. Colors are premultiplied RGBA.

use super::buffer::{CHANNELS, NO_DEPTH, PartitionId};

/// Which per-pixel rule combines two overlapping samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MergeMode {
    /// Nearest depth wins; equal depths go to the lower partition id.
    ZBuffer,
    /// Source painted over destination with the "over" operator.
    Blend,
}

/// Provenance of the source row: either one partition for the whole image or
/// a per-pixel buffer carried over from earlier merges.
#[derive(Clone, Copy)]
pub(crate) enum Origins<'a> {
    Uniform(PartitionId),
    PerPixel(&'a [PartitionId]),
}

impl Origins<'_> {
    #[inline]
    fn at(&self, i: usize) -> PartitionId {
        match self {
            Origins::Uniform(p) => *p,
            Origins::PerPixel(o) => o[i],
        }
    }
}

#[inline]
pub(crate) fn is_present(depth: f32) -> bool {
    depth < NO_DEPTH
}

/// Depth-test one row. A source sample replaces the destination when the
/// destination is empty, when it is strictly nearer, or when depths tie and
/// its origin partition is lower. Ordering by `(depth, origin)` is total, so
/// the result does not depend on the order rows are merged in.
pub(crate) fn z_row(
    dst_px: &mut [f32],
    dst_z: &mut [f32],
    dst_o: &mut [PartitionId],
    src_px: &[f32],
    src_z: &[f32],
    src_o: Origins<'_>,
) {
    for i in 0..dst_z.len() {
        let sz = src_z[i];
        if !is_present(sz) {
            continue;
        }
        let so = src_o.at(i);
        let dz = dst_z[i];
        let take = !is_present(dz) || sz < dz || (sz == dz && so < dst_o[i]);
        if take {
            let c = i * CHANNELS;
            dst_px[c..c + CHANNELS].copy_from_slice(&src_px[c..c + CHANNELS]);
            dst_z[i] = sz;
            dst_o[i] = so;
        }
    }
}

/// `dst = src over dst` for one row of premultiplied pixels.
pub(crate) fn over_row(dst_px: &mut [f32], src_px: &[f32]) {
    for (d, s) in dst_px.chunks_exact_mut(CHANNELS).zip(src_px.chunks_exact(CHANNELS)) {
        let keep = 1.0 - s[3];
        for ch in 0..CHANNELS {
            d[ch] = s[ch] + d[ch] * keep;
        }
    }
}

/// Keep the nearer of two depths for blended content.
pub(crate) fn min_depth_row(dst_z: &mut [f32], src_z: &[f32]) {
    for (d, s) in dst_z.iter_mut().zip(src_z) {
        if *s < *d {
            *d = *s;
        }
    }
}
