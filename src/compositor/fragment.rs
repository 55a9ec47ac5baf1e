//! Order-tagged sub-images and the local fold every compositor ends with.
//!
//! A `Fragment` is an image that is the complete composite of the partitions
//! at visibility positions `first..=last` inside its bounds. Each position is
//! rendered by exactly one rank, so fragments with touching spans can be
//! merged early without waiting for anything else; the "over" operator is
//! associative, only its operand order matters.

use crate::error::CompositeError;
use crate::image::wire::Reader;
use crate::image::{Bounds, Image, MergeMode};

#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    /// Nearest visibility position covered (0 = closest to the viewer).
    pub first: u32,
    /// Farthest visibility position covered.
    pub last: u32,
    pub image: Image,
}

impl Fragment {
    pub fn new(position: u32, image: Image) -> Self {
        Self { first: position, last: position, image }
    }

    pub fn bounds(&self) -> Bounds {
        self.image.bounds()
    }
}

/// The parts of `fragments` inside `region`; fragments that miss it are
/// skipped.
pub fn clip_all(fragments: &[Fragment], region: &Bounds) -> Result<Vec<Fragment>, CompositeError> {
    let mut out = Vec::new();
    for f in fragments.iter().filter(|f| f.bounds().overlaps(region)) {
        out.push(Fragment { first: f.first, last: f.last, image: f.image.extract(region)? });
    }
    Ok(out)
}

/// Composite every fragment into one image covering `region`.
///
/// Blend mode paints back to front: the farthest span first, each nearer one
/// over the accumulation.
pub fn fold(
    region: Bounds,
    mut fragments: Vec<Fragment>,
    mode: MergeMode,
    has_depth: bool,
) -> Result<Image, CompositeError> {
    let mut acc = Image::new(region, has_depth || mode == MergeMode::ZBuffer);
    if mode == MergeMode::Blend {
        fragments.sort_by(|a, b| b.first.cmp(&a.first));
    }
    for f in fragments.iter().filter(|f| f.bounds().overlaps(&region)) {
        acc.merge(&f.image, mode)?;
    }
    Ok(acc)
}

/// Merge what can be merged before more data arrives.
///
/// Z-buffer fragments always collapse into one. Blend fragments collapse only
/// when their spans touch, nearer over farther.
pub fn coalesce(mut fragments: Vec<Fragment>, mode: MergeMode) -> Result<Vec<Fragment>, CompositeError> {
    if fragments.len() < 2 {
        return Ok(fragments);
    }
    match mode {
        MergeMode::ZBuffer => {
            let region = fragments.iter().fold(Bounds::empty(), |b, f| b.union(&f.bounds()));
            let first = fragments.iter().map(|f| f.first).min().unwrap_or(0);
            let last = fragments.iter().map(|f| f.last).max().unwrap_or(0);
            let image = fold(region, fragments, mode, true)?;
            Ok(vec![Fragment { first, last, image }])
        }
        MergeMode::Blend => {
            fragments.sort_by_key(|f| f.first);
            let mut out: Vec<Fragment> = Vec::with_capacity(fragments.len());
            for far in fragments {
                match out.last_mut() {
                    Some(near) if near.last + 1 == far.first => {
                        let region = near.bounds().union(&far.bounds());
                        let mut image = Image::new(region, near.image.has_depth() || far.image.has_depth());
                        image.merge(&far.image, MergeMode::Blend)?;
                        image.merge(&near.image, MergeMode::Blend)?;
                        near.last = far.last;
                        near.image = image;
                    }
                    _ => out.push(far),
                }
            }
            Ok(out)
        }
    }
}

/// `u32` count, then per fragment `u32 first`, `u32 last`, `u64` length and
/// the image bytes.
pub fn encode_batch(fragments: &[Fragment]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&(fragments.len() as u32).to_le_bytes());
    for f in fragments {
        let bytes = f.image.to_bytes();
        out.extend_from_slice(&f.first.to_le_bytes());
        out.extend_from_slice(&f.last.to_le_bytes());
        out.extend_from_slice(&(bytes.len() as u64).to_le_bytes());
        out.extend_from_slice(&bytes);
    }
    out
}

pub fn decode_batch(bytes: &[u8]) -> Result<Vec<Fragment>, CompositeError> {
    let mut r = Reader::new(bytes);
    let count = r.u32()? as usize;
    let mut out = Vec::with_capacity(count.min(1024));
    for _ in 0..count {
        let first = r.u32()?;
        let last = r.u32()?;
        if last < first {
            return Err(CompositeError::MalformedMessage(format!("fragment span {first}..{last} is reversed")));
        }
        let len = usize::try_from(r.u64()?)
            .map_err(|_| CompositeError::MalformedMessage("fragment length overflows".into()))?;
        let image = Image::from_bytes(r.take(len)?)?;
        out.push(Fragment { first, last, image });
    }
    r.finish()?;
    Ok(out)
}

/// `u32` count followed by four `i32` per rectangle.
pub fn encode_bounds(bounds: &[Bounds]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + bounds.len() * 16);
    out.extend_from_slice(&(bounds.len() as u32).to_le_bytes());
    for b in bounds {
        for v in [b.x_min, b.x_max, b.y_min, b.y_max] {
            out.extend_from_slice(&v.to_le_bytes());
        }
    }
    out
}

pub fn decode_bounds(bytes: &[u8]) -> Result<Vec<Bounds>, CompositeError> {
    let mut r = Reader::new(bytes);
    let count = r.u32()? as usize;
    let mut out = Vec::with_capacity(count.min(1024));
    for _ in 0..count {
        out.push(Bounds::new(r.i32()?, r.i32()?, r.i32()?, r.i32()?));
    }
    r.finish()?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::premultiply;
    use approx::assert_abs_diff_eq;

    fn layer(position: u32, bounds: Bounds, rgba: [f32; 4]) -> Fragment {
        let mut img = Image::new(bounds, false).with_partition(position);
        img.fill(premultiply(rgba), None);
        Fragment::new(position, img)
    }

    #[test]
    fn blend_coalesces_only_touching_spans() {
        let b = Bounds::new(0, 1, 0, 1);
        let frags = vec![
            layer(3, b, [0.0, 0.0, 1.0, 0.5]),
            layer(0, b, [1.0, 0.0, 0.0, 0.5]),
            layer(1, b, [0.0, 1.0, 0.0, 0.5]),
        ];
        let merged = coalesce(frags.clone(), MergeMode::Blend).unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!((merged[0].first, merged[0].last), (0, 1));
        assert_eq!((merged[1].first, merged[1].last), (3, 3));

        let direct = fold(b, frags, MergeMode::Blend, false).unwrap();
        let staged = fold(b, merged, MergeMode::Blend, false).unwrap();
        for (x, y) in direct.pixels().iter().zip(staged.pixels()) {
            assert_abs_diff_eq!(x, y, epsilon = 1e-6);
        }
    }

    #[test]
    fn batch_round_trip_keeps_spans() {
        let frags = vec![layer(2, Bounds::new(0, 2, 1, 1), [1.0, 1.0, 1.0, 1.0]), layer(5, Bounds::empty(), [0.0; 4])];
        let back = decode_batch(&encode_batch(&frags)).unwrap();
        assert_eq!(back, frags);
        assert!(decode_batch(&[1, 0, 0]).is_err());
        assert_eq!(decode_batch(&encode_batch(&[])).unwrap(), vec![]);
    }

    #[test]
    fn clip_skips_disjoint() {
        let frags = vec![layer(0, Bounds::new(0, 1, 0, 1), [1.0; 4]), layer(1, Bounds::new(5, 6, 5, 6), [1.0; 4])];
        let clipped = clip_all(&frags, &Bounds::new(1, 3, 0, 0)).unwrap();
        assert_eq!(clipped.len(), 1);
        assert_eq!(clipped[0].bounds(), Bounds::new(1, 1, 0, 0));
    }
}
