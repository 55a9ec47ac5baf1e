//! Tests for per-pixel merge semantics of `Image`.
//!
//! Z-buffer merges must be commutative, associative and idempotent so that
//! compositors may merge in any grouping; blend merges must follow the "over"
//! operator and depend on order.

use approx::assert_abs_diff_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sortlast::{Bounds, Image, MergeMode, NO_DEPTH, premultiply};

/// Random opaque image with depths drawn from a coarse grid so that exact
/// ties between partitions are frequent, and some pixels left empty.
fn random_opaque(rng: &mut StdRng, bounds: Bounds, partition: u32) -> Image {
    let mut img = Image::new(bounds, true).with_partition(partition);
    for y in bounds.y_min..=bounds.y_max {
        for x in bounds.x_min..=bounds.x_max {
            if rng.gen_bool(0.2) {
                continue;
            }
            let rgba = [rng.r#gen(), rng.r#gen(), rng.r#gen(), 1.0];
            let depth = rng.gen_range(0..4) as f32 * 0.25;
            img.set_pixel(x, y, rgba, Some(depth)).unwrap();
        }
    }
    img
}

fn merged(a: &Image, b: &Image, mode: MergeMode) -> Image {
    let mut out = a.clone();
    out.merge(b, mode).unwrap();
    out
}

#[test]
fn zbuffer_merge_is_commutative() {
    let mut rng = StdRng::seed_from_u64(7);
    let b = Bounds::new(0, 7, 0, 5);
    for _ in 0..20 {
        let x = random_opaque(&mut rng, b, 1);
        let y = random_opaque(&mut rng, b, 2);
        assert_eq!(merged(&x, &y, MergeMode::ZBuffer), merged(&y, &x, MergeMode::ZBuffer));
    }
}

#[test]
fn zbuffer_merge_is_associative() {
    let mut rng = StdRng::seed_from_u64(11);
    let b = Bounds::new(-3, 4, 2, 6);
    for _ in 0..20 {
        let x = random_opaque(&mut rng, b, 5);
        let y = random_opaque(&mut rng, b, 3);
        let z = random_opaque(&mut rng, b, 9);
        let left = merged(&merged(&x, &y, MergeMode::ZBuffer), &z, MergeMode::ZBuffer);
        let right = merged(&x, &merged(&y, &z, MergeMode::ZBuffer), MergeMode::ZBuffer);
        assert_eq!(left, right);
    }
}

#[test]
fn zbuffer_self_merge_is_idempotent() {
    let mut rng = StdRng::seed_from_u64(3);
    let b = Bounds::new(0, 4, 0, 4);
    let a = random_opaque(&mut rng, b, 4);
    let m = merged(&a, &a, MergeMode::ZBuffer);
    assert_eq!(m.pixels(), a.pixels());
    assert_eq!(m.depths(), a.depths());
}

#[test]
fn equal_depth_goes_to_lower_partition() {
    let b = Bounds::new(0, 1, 0, 1);
    let mut low = Image::new(b, true).with_partition(2);
    low.fill([0.0, 1.0, 0.0, 1.0], Some(0.5));
    let mut high = Image::new(b, true).with_partition(6);
    high.fill([1.0, 0.0, 0.0, 1.0], Some(0.5));
    for m in [merged(&low, &high, MergeMode::ZBuffer), merged(&high, &low, MergeMode::ZBuffer)] {
        assert_eq!(m.pixel(1, 1), Some([0.0, 1.0, 0.0, 1.0]));
        assert_eq!(m.origin_at(1, 1), Some(2));
    }
}

#[test]
fn nearer_opaque_sample_wins() {
    let b = Bounds::new(0, 1, 0, 1);
    let mut red = Image::new(b, true).with_partition(0);
    red.fill([1.0, 0.0, 0.0, 1.0], Some(0.2));
    let mut blue = Image::new(b, true).with_partition(1);
    blue.fill([0.0, 0.0, 1.0, 1.0], Some(0.8));
    let m = merged(&blue, &red, MergeMode::ZBuffer);
    for y in 0..2 {
        for x in 0..2 {
            assert_eq!(m.pixel(x, y), Some([1.0, 0.0, 0.0, 1.0]));
            assert_eq!(m.depth(x, y), Some(0.2));
        }
    }
}

#[test]
fn empty_pixels_pass_through() {
    let b = Bounds::new(0, 1, 0, 0);
    let mut a = Image::new(b, true).with_partition(0);
    a.set_pixel(0, 0, [1.0, 0.0, 0.0, 1.0], Some(0.9)).unwrap();
    let mut c = Image::new(b, true).with_partition(1);
    c.set_pixel(1, 0, [0.0, 1.0, 0.0, 1.0], Some(0.1)).unwrap();
    let m = merged(&a, &c, MergeMode::ZBuffer);
    assert_eq!(m.pixel(0, 0), Some([1.0, 0.0, 0.0, 1.0]));
    assert_eq!(m.pixel(1, 0), Some([0.0, 1.0, 0.0, 1.0]));

    let nothing = merged(&Image::new(b, true), &Image::new(b, true), MergeMode::ZBuffer);
    assert_eq!(nothing.depth(0, 0), Some(NO_DEPTH));
    assert_eq!(nothing.origin_at(0, 0), None);
}

/// Half-transparent red over opaque blue.
#[test]
fn over_operator_closed_form() {
    let b = Bounds::new(0, 0, 0, 0);
    let mut dst = Image::new(b, false);
    dst.fill(premultiply([0.0, 0.0, 1.0, 1.0]), None);
    let mut src = Image::new(b, false);
    src.fill(premultiply([1.0, 0.0, 0.0, 0.5]), None);
    let out = merged(&dst, &src, MergeMode::Blend).pixel(0, 0).unwrap();
    let expected = [0.5, 0.0, 0.5, 1.0];
    for ch in 0..4 {
        assert_abs_diff_eq!(out[ch], expected[ch], epsilon = 1e-7);
    }
}

#[test]
fn blend_depends_on_order() {
    let b = Bounds::new(0, 1, 0, 1);
    let layer = |rgba: [f32; 4]| {
        let mut img = Image::new(b, false);
        img.fill(premultiply(rgba), None);
        img
    };
    let blue = layer([0.0, 0.0, 1.0, 0.5]);
    let green = layer([0.0, 1.0, 0.0, 0.5]);
    let red = layer([1.0, 0.0, 0.0, 0.5]);

    // Back to front: blue farthest, red nearest.
    let mut acc = Image::new(b, false);
    for l in [&blue, &green, &red] {
        acc.merge(l, MergeMode::Blend).unwrap();
    }
    let expected = [0.5, 0.25, 0.125, 0.875];
    let got = acc.pixel(1, 0).unwrap();
    for ch in 0..4 {
        assert_abs_diff_eq!(got[ch], expected[ch], epsilon = 1e-6);
    }

    let mut reversed = Image::new(b, false);
    for l in [&red, &green, &blue] {
        reversed.merge(l, MergeMode::Blend).unwrap();
    }
    let other = reversed.pixel(1, 0).unwrap();
    assert!((other[0] - got[0]).abs() > 1e-3);
    assert!((other[2] - got[2]).abs() > 1e-3);
    assert_abs_diff_eq!(other[3], got[3], epsilon = 1e-6);
}

#[test]
fn disjoint_merge_is_out_of_bounds() {
    let mut a = Image::new(Bounds::new(0, 1, 0, 1), true);
    let b = Image::new(Bounds::new(5, 6, 5, 6), true);
    assert!(matches!(
        a.merge(&b, MergeMode::ZBuffer),
        Err(sortlast::CompositeError::OutOfBoundsError { .. })
    ));
}

struct Recorder {
    calls: Vec<(Vec<u8>, usize, usize, Vec<String>)>,
}

impl sortlast::ImageEncoder for Recorder {
    type Error = std::convert::Infallible;

    fn encode(&mut self, rgba: &[u8], width: usize, height: usize, comments: &[String]) -> Result<(), Self::Error> {
        self.calls.push((rgba.to_vec(), width, height, comments.to_vec()));
        Ok(())
    }
}

/// The encoder sees unpremultiplied 8-bit pixels, the image size and the
/// comments unchanged.
#[test]
fn encoder_receives_straight_rgba8_and_comments() {
    let mut img = Image::new(Bounds::new(10, 12, 5, 6), false);
    img.fill(premultiply([0.0, 1.0, 0.0, 0.5]), None);
    let mut rec = Recorder { calls: Vec::new() };
    img.save_with(&mut rec, &["frame 3".to_string()]).unwrap();
    let (rgba, w, h, comments) = &rec.calls[0];
    assert_eq!((*w, *h), (3, 2));
    assert_eq!(rgba.len(), 3 * 2 * 4);
    assert_eq!(&rgba[..4], &[0, 255, 0, 128]);
    assert_eq!(comments, &vec!["frame 3".to_string()]);
}
