use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sortlast::{
    Bounds, Comm, CompositeContext, CompositeMode, CompositeOptions, CompositorKind, Image, MergeMode, run_local,
};

fn opaque_layer(rng: &mut StdRng, bounds: Bounds, id: u32) -> Image {
    let mut img = Image::new(bounds, true).with_partition(id);
    for y in bounds.y_min..=bounds.y_max {
        for x in bounds.x_min..=bounds.x_max {
            let rgba = [rng.r#gen(), rng.r#gen(), rng.r#gen(), 1.0];
            img.set_pixel(x, y, rgba, Some(rng.r#gen())).unwrap();
        }
    }
    img
}

fn bench_merge(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(0);
    let bounds = Bounds::from_origin(0, 0, 512, 512);
    let a = opaque_layer(&mut rng, bounds, 0);
    let b = opaque_layer(&mut rng, bounds, 1);

    for mode in [MergeMode::ZBuffer, MergeMode::Blend] {
        c.bench_function(&format!("merge 512x512 {mode:?}"), |ben| {
            ben.iter(|| {
                let mut dst = a.clone();
                dst.merge(black_box(&b), mode).unwrap();
                dst
            })
        });
    }
}

fn bench_compositors(c: &mut Criterion) {
    let ranks = 8;
    let mut rng = StdRng::seed_from_u64(1);
    let layers: Vec<Image> = (0..ranks)
        .map(|r| opaque_layer(&mut rng, Bounds::from_origin(0, 0, 256, 256), r as u32))
        .collect();

    let mut group = c.benchmark_group("composite 8 ranks 256x256");
    for kind in [CompositorKind::DirectSend, CompositorKind::RadixK, CompositorKind::Collector] {
        let options = CompositeOptions { strategy: kind, ..Default::default() };
        group.bench_with_input(BenchmarkId::from_parameter(format!("{kind:?}")), &options, |ben, options| {
            ben.iter(|| {
                run_local(ranks, |comm| {
                    let ctx = CompositeContext::new(options.clone());
                    ctx.composite(&comm, vec![layers[comm.rank()].clone()], &CompositeMode::<f64>::ZBuffer)
                        .unwrap()
                })
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_merge, bench_compositors);
criterion_main!(benches);
