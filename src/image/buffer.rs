//! The partial / whole image value type.
//!
//! An `Image` owns a premultiplied RGBA `f32` pixel buffer laid out row-major
//! over its `Bounds`, an optional depth buffer with the same layout, and the
//! identifier of the partition that rendered it. Depth grows away from the
//! viewer; `NO_DEPTH` marks a pixel with no contribution.
//!
//! Images produced by z-buffer merges additionally remember, per pixel, which
//! partition the winning sample came from. That provenance is what keeps the
//! equal-depth tie-break deterministic across arbitrary merge trees.

use std::fmt;

use super::bounds::Bounds;
use super::merge::{self, MergeMode, Origins};
use crate::core::traits::ImageEncoder;
use crate::error::CompositeError;

/// Identifier of the data partition an image was rendered from.
pub type PartitionId = u32;

/// Color channels per pixel (RGBA).
pub const CHANNELS: usize = 4;

/// Depth sentinel for "nothing was drawn here".
pub const NO_DEPTH: f32 = f32::INFINITY;

/// Partition id used for images that do not (yet) stem from any partition.
pub(crate) const NO_ORIGIN: PartitionId = PartitionId::MAX;

/// Convert a straight-alpha color to the premultiplied form images store.
pub fn premultiply(rgba: [f32; 4]) -> [f32; 4] {
    let a = rgba[3];
    [rgba[0] * a, rgba[1] * a, rgba[2] * a, a]
}

#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    pub(crate) bounds: Bounds,
    pub(crate) pixels: Vec<f32>,
    pub(crate) depths: Option<Vec<f32>>,
    pub(crate) origins: Option<Vec<PartitionId>>,
    pub(crate) partition: PartitionId,
}

impl Image {
    /// Allocate a cleared image: transparent black, every depth at `NO_DEPTH`.
    pub fn new(bounds: Bounds, has_depth: bool) -> Self {
        let n = bounds.area();
        Self {
            bounds,
            pixels: vec![0.0; n * CHANNELS],
            depths: has_depth.then(|| vec![NO_DEPTH; n]),
            origins: None,
            partition: NO_ORIGIN,
        }
    }

    /// Wrap buffers produced by a renderer, checking their lengths.
    pub fn from_parts(
        bounds: Bounds,
        pixels: Vec<f32>,
        depths: Option<Vec<f32>>,
        partition: PartitionId,
    ) -> Result<Self, CompositeError> {
        let n = bounds.area();
        check_len("pixel", bounds, n * CHANNELS, pixels.len())?;
        if let Some(d) = &depths {
            check_len("depth", bounds, n, d.len())?;
        }
        Ok(Self { bounds, pixels, depths, origins: None, partition })
    }

    pub fn with_partition(mut self, partition: PartitionId) -> Self {
        self.partition = partition;
        self
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn width(&self) -> usize {
        self.bounds.width()
    }

    pub fn height(&self) -> usize {
        self.bounds.height()
    }

    pub fn num_pixels(&self) -> usize {
        self.bounds.area()
    }

    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }

    pub fn partition(&self) -> PartitionId {
        self.partition
    }

    pub fn has_depth(&self) -> bool {
        self.depths.is_some()
    }

    pub fn pixels(&self) -> &[f32] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [f32] {
        &mut self.pixels
    }

    pub fn depths(&self) -> Option<&[f32]> {
        self.depths.as_deref()
    }

    pub fn depths_mut(&mut self) -> Option<&mut [f32]> {
        self.depths.as_deref_mut()
    }

    /// Premultiplied RGBA at global coordinates `(x, y)`.
    pub fn pixel(&self, x: i32, y: i32) -> Option<[f32; 4]> {
        let i = self.bounds.index_of(x, y)? * CHANNELS;
        let p = &self.pixels[i..i + CHANNELS];
        Some([p[0], p[1], p[2], p[3]])
    }

    pub fn depth(&self, x: i32, y: i32) -> Option<f32> {
        let i = self.bounds.index_of(x, y)?;
        self.depths.as_ref().map(|d| d[i])
    }

    /// Partition whose sample ended up at `(x, y)`, if any partition did.
    pub fn origin_at(&self, x: i32, y: i32) -> Option<PartitionId> {
        let i = self.bounds.index_of(x, y)?;
        if let Some(d) = &self.depths {
            if !merge::is_present(d[i]) {
                return None;
            }
        }
        let o = self.origins.as_ref().map_or(self.partition, |o| o[i]);
        (o != NO_ORIGIN).then_some(o)
    }

    pub fn set_pixel(
        &mut self,
        x: i32,
        y: i32,
        rgba: [f32; 4],
        depth: Option<f32>,
    ) -> Result<(), CompositeError> {
        let i = self.bounds.index_of(x, y).ok_or(CompositeError::OutOfBoundsError {
            requested: Bounds::new(x, x, y, y),
            available: self.bounds,
        })?;
        if let Some(z) = depth {
            let d = self.depths.as_mut().ok_or(CompositeError::MissingBufferError(self.partition))?;
            d[i] = z;
        }
        self.pixels[i * CHANNELS..(i + 1) * CHANNELS].copy_from_slice(&rgba);
        Ok(())
    }

    /// Paint every pixel with one premultiplied color (and depth, when the
    /// image has a depth buffer and a depth is given).
    pub fn fill(&mut self, rgba: [f32; 4], depth: Option<f32>) {
        for p in self.pixels.chunks_exact_mut(CHANNELS) {
            p.copy_from_slice(&rgba);
        }
        if let (Some(d), Some(z)) = (self.depths.as_mut(), depth) {
            d.fill(z);
        }
    }

    /// Reset to transparent black with no depth contribution.
    pub fn clear(&mut self) {
        self.pixels.fill(0.0);
        if let Some(d) = self.depths.as_mut() {
            d.fill(NO_DEPTH);
        }
        self.origins = None;
    }

    /// Copy of the part of this image inside `region`.
    ///
    /// Fails with `OutOfBoundsError` when the two do not intersect; callers
    /// that may hit that case check `Bounds::overlaps` first.
    pub fn extract(&self, region: &Bounds) -> Result<Image, CompositeError> {
        let sub = self.bounds.intersect(region);
        if sub.is_empty() {
            return Err(CompositeError::OutOfBoundsError {
                requested: *region,
                available: self.bounds,
            });
        }
        let (w, h) = (sub.width(), sub.height());
        let mut out = Image {
            bounds: sub,
            pixels: Vec::with_capacity(w * h * CHANNELS),
            depths: self.depths.as_ref().map(|_| Vec::with_capacity(w * h)),
            origins: self.origins.as_ref().map(|_| Vec::with_capacity(w * h)),
            partition: self.partition,
        };
        for y in sub.y_min..=sub.y_max {
            let start = self.row_start(&sub, y);
            out.pixels.extend_from_slice(&self.pixels[start * CHANNELS..(start + w) * CHANNELS]);
            if let (Some(dst), Some(src)) = (out.depths.as_mut(), self.depths.as_ref()) {
                dst.extend_from_slice(&src[start..start + w]);
            }
            if let (Some(dst), Some(src)) = (out.origins.as_mut(), self.origins.as_ref()) {
                dst.extend_from_slice(&src[start..start + w]);
            }
        }
        Ok(out)
    }

    /// Combine the overlapping pixels of `other` into this image.
    ///
    /// In `Blend` mode `other` is the nearer image and is painted over this
    /// one, so back-to-front accumulation merges the farthest image first.
    /// In `ZBuffer` mode both images need depth buffers and the result does not
    /// depend on merge order.
    pub fn merge(&mut self, other: &Image, mode: MergeMode) -> Result<(), CompositeError> {
        let overlap = self.bounds.intersect(&other.bounds);
        if overlap.is_empty() {
            return Err(CompositeError::OutOfBoundsError {
                requested: other.bounds,
                available: self.bounds,
            });
        }
        match mode {
            MergeMode::ZBuffer => self.merge_z(other, &overlap)?,
            MergeMode::Blend => self.merge_over(other, &overlap),
        }
        self.partition = self.partition.min(other.partition);
        Ok(())
    }

    /// Overwrite the overlapping pixels with those of `tile`. Used to stitch
    /// disjoint, already composited tiles into a whole image.
    pub fn paste(&mut self, tile: &Image) -> Result<(), CompositeError> {
        let overlap = self.bounds.intersect(&tile.bounds);
        if overlap.is_empty() {
            return Err(CompositeError::OutOfBoundsError {
                requested: tile.bounds,
                available: self.bounds,
            });
        }
        if self.depths.is_some() && tile.depths.is_some() {
            self.ensure_origins();
        }
        let w = overlap.width();
        for y in overlap.y_min..=overlap.y_max {
            let d = self.row_start(&overlap, y);
            let s = tile.row_start(&overlap, y);
            self.pixels[d * CHANNELS..(d + w) * CHANNELS]
                .copy_from_slice(&tile.pixels[s * CHANNELS..(s + w) * CHANNELS]);
            if let (Some(dz), Some(sz)) = (self.depths.as_mut(), tile.depths.as_ref()) {
                dz[d..d + w].copy_from_slice(&sz[s..s + w]);
                if let Some(dst_o) = self.origins.as_mut() {
                    match &tile.origins {
                        Some(src_o) => dst_o[d..d + w].copy_from_slice(&src_o[s..s + w]),
                        None => dst_o[d..d + w].fill(tile.partition),
                    }
                }
            }
        }
        self.partition = self.partition.min(tile.partition);
        Ok(())
    }

    /// Blend a solid straight-alpha background color under the image.
    pub fn composite_background(&mut self, rgba: [f32; 4]) {
        let bg = premultiply(rgba);
        for p in self.pixels.chunks_exact_mut(CHANNELS) {
            let keep = 1.0 - p[3];
            for ch in 0..CHANNELS {
                p[ch] += bg[ch] * keep;
            }
        }
    }

    /// 8-bit straight-alpha RGBA, row-major, for image encoders.
    pub fn to_rgba8(&self) -> Vec<u8> {
        let to_u8 = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        let mut out = Vec::with_capacity(self.pixels.len());
        for p in self.pixels.chunks_exact(CHANNELS) {
            let a = p[3];
            let inv = if a > 0.0 { 1.0 / a } else { 0.0 };
            out.extend_from_slice(&[to_u8(p[0] * inv), to_u8(p[1] * inv), to_u8(p[2] * inv), to_u8(a)]);
        }
        out
    }

    /// Hand the finished image to an external encoder together with its text
    /// comments.
    pub fn save_with<E: ImageEncoder>(
        &self,
        encoder: &mut E,
        comments: &[String],
    ) -> Result<(), E::Error> {
        encoder.encode(&self.to_rgba8(), self.width(), self.height(), comments)
    }

    /// Index of pixel `(region.x_min, y)` in this image's buffers.
    fn row_start(&self, region: &Bounds, y: i32) -> usize {
        (y - self.bounds.y_min) as usize * self.bounds.width() + (region.x_min - self.bounds.x_min) as usize
    }

    fn ensure_origins(&mut self) {
        if self.origins.is_none() {
            let part = self.partition;
            self.origins = Some(match &self.depths {
                Some(z) => z.iter().map(|&d| if merge::is_present(d) { part } else { NO_ORIGIN }).collect(),
                None => vec![part; self.bounds.area()],
            });
        }
    }

    fn merge_z(&mut self, other: &Image, overlap: &Bounds) -> Result<(), CompositeError> {
        let src_z = other.depths.as_deref().ok_or(CompositeError::MissingBufferError(other.partition))?;
        if self.depths.is_none() {
            return Err(CompositeError::MissingBufferError(self.partition));
        }
        self.ensure_origins();
        let (Some(dst_z), Some(dst_o)) = (self.depths.as_mut(), self.origins.as_mut()) else {
            return Err(CompositeError::MissingBufferError(self.partition));
        };

        let dst_w = self.bounds.width();
        let src_w = other.bounds.width();
        let n = overlap.width();
        let row0 = (overlap.y_min - self.bounds.y_min) as usize;
        let col0 = (overlap.x_min - self.bounds.x_min) as usize;
        let src_row0 = (overlap.y_min - other.bounds.y_min) as usize;
        let src_col0 = (overlap.x_min - other.bounds.x_min) as usize;
        let src_px = &other.pixels;
        let src_o = other.origins.as_deref();
        let src_part = other.partition;

        let row = |r: usize, px: &mut [f32], z: &mut [f32], o: &mut [PartitionId]| {
            let s = (src_row0 + r) * src_w + src_col0;
            let origins = match src_o {
                Some(o) => Origins::PerPixel(&o[s..s + n]),
                None => Origins::Uniform(src_part),
            };
            merge::z_row(
                &mut px[col0 * CHANNELS..(col0 + n) * CHANNELS],
                &mut z[col0..col0 + n],
                &mut o[col0..col0 + n],
                &src_px[s * CHANNELS..(s + n) * CHANNELS],
                &src_z[s..s + n],
                origins,
            );
        };

        #[cfg(feature = "rayon")]
        {
            use rayon::prelude::*;
            self.pixels
                .par_chunks_mut(dst_w * CHANNELS)
                .zip(dst_z.par_chunks_mut(dst_w))
                .zip(dst_o.par_chunks_mut(dst_w))
                .skip(row0)
                .take(overlap.height())
                .enumerate()
                .for_each(|(r, ((px, z), o))| row(r, px, z, o));
        }
        #[cfg(not(feature = "rayon"))]
        {
            self.pixels
                .chunks_mut(dst_w * CHANNELS)
                .zip(dst_z.chunks_mut(dst_w))
                .zip(dst_o.chunks_mut(dst_w))
                .skip(row0)
                .take(overlap.height())
                .enumerate()
                .for_each(|(r, ((px, z), o))| row(r, px, z, o));
        }
        Ok(())
    }

    fn merge_over(&mut self, other: &Image, overlap: &Bounds) {
        let dst_w = self.bounds.width();
        let src_w = other.bounds.width();
        let n = overlap.width();
        let row0 = (overlap.y_min - self.bounds.y_min) as usize;
        let col0 = (overlap.x_min - self.bounds.x_min) as usize;
        let src_row0 = (overlap.y_min - other.bounds.y_min) as usize;
        let src_col0 = (overlap.x_min - other.bounds.x_min) as usize;
        let src_px = &other.pixels;

        let row = |r: usize, px: &mut [f32]| {
            let s = (src_row0 + r) * src_w + src_col0;
            merge::over_row(
                &mut px[col0 * CHANNELS..(col0 + n) * CHANNELS],
                &src_px[s * CHANNELS..(s + n) * CHANNELS],
            );
        };

        #[cfg(feature = "rayon")]
        {
            use rayon::prelude::*;
            self.pixels
                .par_chunks_mut(dst_w * CHANNELS)
                .skip(row0)
                .take(overlap.height())
                .enumerate()
                .for_each(|(r, px)| row(r, px));
        }
        #[cfg(not(feature = "rayon"))]
        {
            self.pixels
                .chunks_mut(dst_w * CHANNELS)
                .skip(row0)
                .take(overlap.height())
                .enumerate()
                .for_each(|(r, px)| row(r, px));
        }

        if let (Some(dst_z), Some(src_z)) = (self.depths.as_mut(), other.depths.as_ref()) {
            for r in 0..overlap.height() {
                let d = (row0 + r) * dst_w + col0;
                let s = (src_row0 + r) * src_w + src_col0;
                merge::min_depth_row(&mut dst_z[d..d + n], &src_z[s..s + n]);
            }
        }
    }
}

fn check_len(buffer: &'static str, bounds: Bounds, expected: usize, actual: usize) -> Result<(), CompositeError> {
    if expected != actual {
        return Err(CompositeError::BufferLengthError { buffer, bounds, expected, actual });
    }
    Ok(())
}

impl fmt::Display for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Image(")?;
        if self.partition != NO_ORIGIN {
            write!(f, "partition {}, ", self.partition)?;
        }
        write!(f, "{}", self.bounds)?;
        if self.depths.is_some() {
            write!(f, ", depth")?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn solid(bounds: Bounds, rgba: [f32; 4], depth: f32, partition: PartitionId) -> Image {
        let mut img = Image::new(bounds, true).with_partition(partition);
        img.fill(rgba, Some(depth));
        img
    }

    #[test]
    fn new_image_is_cleared() {
        let img = Image::new(Bounds::new(0, 1, 0, 2), true);
        assert_eq!(img.pixels().len(), 2 * 3 * CHANNELS);
        assert!(img.pixels().iter().all(|&p| p == 0.0));
        assert!(img.depths().unwrap().iter().all(|&d| d == NO_DEPTH));
        assert_eq!(img.origin_at(0, 0), None);
    }

    #[test]
    fn from_parts_rejects_short_buffers() {
        let err = Image::from_parts(Bounds::new(0, 1, 0, 1), vec![0.0; 15], None, 0).unwrap_err();
        assert!(matches!(err, CompositeError::BufferLengthError { expected: 16, actual: 15, .. }));
    }

    #[test]
    fn extract_clips_to_intersection() {
        let mut img = Image::new(Bounds::new(0, 3, 0, 3), true).with_partition(2);
        img.set_pixel(2, 1, [1.0, 0.0, 0.0, 1.0], Some(0.25)).unwrap();
        let sub = img.extract(&Bounds::new(2, 10, 1, 1)).unwrap();
        assert_eq!(sub.bounds(), Bounds::new(2, 3, 1, 1));
        assert_eq!(sub.pixel(2, 1), Some([1.0, 0.0, 0.0, 1.0]));
        assert_eq!(sub.depth(2, 1), Some(0.25));
        assert_eq!(sub.partition(), 2);
        assert!(matches!(
            img.extract(&Bounds::new(8, 9, 8, 9)),
            Err(CompositeError::OutOfBoundsError { .. })
        ));
    }

    #[test]
    fn z_merge_partial_overlap_passes_through() {
        let mut a = solid(Bounds::new(0, 3, 0, 0), [1.0, 0.0, 0.0, 1.0], 0.5, 0);
        let b = solid(Bounds::new(2, 5, 0, 0), [0.0, 1.0, 0.0, 1.0], 0.1, 1);
        a.merge(&b, MergeMode::ZBuffer).unwrap();
        assert_eq!(a.pixel(1, 0), Some([1.0, 0.0, 0.0, 1.0]));
        assert_eq!(a.pixel(2, 0), Some([0.0, 1.0, 0.0, 1.0]));
        assert_eq!(a.origin_at(3, 0), Some(1));
        assert_eq!(a.origin_at(0, 0), Some(0));
        assert_eq!(a.partition(), 0);
    }

    #[test]
    fn z_merge_without_depth_fails() {
        let mut a = Image::new(Bounds::new(0, 1, 0, 1), true);
        let b = Image::new(Bounds::new(0, 1, 0, 1), false).with_partition(4);
        assert!(matches!(a.merge(&b, MergeMode::ZBuffer), Err(CompositeError::MissingBufferError(4))));
    }

    #[test]
    fn paste_overwrites_region() {
        let mut canvas = Image::new(Bounds::new(0, 3, 0, 3), true);
        let tile = solid(Bounds::new(2, 3, 2, 3), [0.0, 0.0, 1.0, 1.0], 0.0, 5);
        canvas.paste(&tile).unwrap();
        assert_eq!(canvas.pixel(3, 3), Some([0.0, 0.0, 1.0, 1.0]));
        assert_eq!(canvas.pixel(0, 0), Some([0.0; 4]));
        assert_eq!(canvas.origin_at(2, 2), Some(5));
        assert_eq!(canvas.origin_at(0, 0), None);
    }

    #[test]
    fn background_fills_transparent_pixels() {
        let mut img = Image::new(Bounds::new(0, 1, 0, 0), false);
        img.set_pixel(1, 0, premultiply([1.0, 0.0, 0.0, 0.5]), None).unwrap();
        img.composite_background([1.0, 1.0, 1.0, 1.0]);
        assert_eq!(img.pixel(0, 0), Some([1.0, 1.0, 1.0, 1.0]));
        let p = img.pixel(1, 0).unwrap();
        assert_abs_diff_eq!(p[0], 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(p[1], 0.5, epsilon = 1e-6);
        assert_abs_diff_eq!(p[3], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn rgba8_unpremultiplies() {
        let mut img = Image::new(Bounds::new(0, 0, 0, 0), false);
        img.fill(premultiply([1.0, 0.5, 0.0, 0.5]), None);
        assert_eq!(img.to_rgba8(), vec![255, 128, 0, 128]);
    }
}
