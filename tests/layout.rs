//! Properties of the screen and rank layout helpers: tile ownership,
//! visibility ordering and radix selection.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use sortlast::utils::factor::radix_factors;
use sortlast::{Bounds, PartitionDescriptor, TileLayout, TileMap, VisibilityOrder};

/// Every pixel of a random screen has exactly one owner, whatever the
/// rank count or layout.
#[test]
fn tiles_partition_random_screens() {
    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..50 {
        let x0 = rng.gen_range(-20..20);
        let y0 = rng.gen_range(-20..20);
        let global = Bounds::new(x0, x0 + rng.gen_range(0..40), y0, y0 + rng.gen_range(0..30));
        let ranks = rng.gen_range(1..20);
        for layout in [TileLayout::Rows, TileLayout::Blocks] {
            let map = TileMap::new(global, ranks, layout);
            assert_eq!(map.len(), ranks);
            let area: usize = map.tiles().iter().map(|t| t.area()).sum();
            assert_eq!(area, global.area(), "{global} on {ranks} ranks, {layout:?}");
            for (i, a) in map.tiles().iter().enumerate() {
                assert_eq!(a.intersect(&global), *a);
                for b in &map.tiles()[i + 1..] {
                    assert!(!a.overlaps(b));
                }
            }
        }
    }
}

/// Shuffling the descriptor list never changes the order.
#[test]
fn visibility_ignores_input_order() {
    let mut rng = StdRng::seed_from_u64(5);
    let mut parts: Vec<PartitionDescriptor> = (0..16)
        .map(|id| {
            let c = [rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0)];
            PartitionDescriptor::new(id, c)
        })
        .collect();
    // Two exact duplicates of a centroid must still order deterministically.
    parts[3].centroid = parts[9].centroid;
    let view = [0.3, -0.2, 0.9];
    let reference = VisibilityOrder::new(&parts, view).unwrap();
    for _ in 0..10 {
        parts.shuffle(&mut rng);
        let order = VisibilityOrder::new(&parts, view).unwrap();
        assert_eq!(order.front_to_back(), reference.front_to_back());
    }
    let p3 = reference.position(3).unwrap();
    let p9 = reference.position(9).unwrap();
    assert_eq!(p9, p3 + 1);
}

/// Radix choices always multiply back to the rank count.
#[test]
fn radices_respect_target() {
    for n in 2..300 {
        for target in [2, 4, 8] {
            let radices = radix_factors(n, target);
            assert_eq!(radices.iter().product::<usize>(), n);
            assert!(radices.iter().all(|&k| k >= 2));
        }
    }
}
