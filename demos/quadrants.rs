use std::io::Write;

use sortlast::{Bounds, Comm, CompositeContext, CompositeMode, CompositeOptions, Image, ImageEncoder, run_local};

/// Binary PPM writer; alpha is dropped and comments become `#` lines.
struct PpmEncoder<W: Write> {
    out: W,
}

impl<W: Write> ImageEncoder for PpmEncoder<W> {
    type Error = std::io::Error;

    fn encode(&mut self, rgba: &[u8], width: usize, height: usize, comments: &[String]) -> Result<(), Self::Error> {
        writeln!(self.out, "P6")?;
        for c in comments {
            writeln!(self.out, "# {c}")?;
        }
        writeln!(self.out, "{width} {height}\n255")?;
        // PPM stores the top row first.
        for row in rgba.chunks_exact(width * 4).rev() {
            for px in row.chunks_exact(4) {
                self.out.write_all(&px[..3])?;
            }
        }
        Ok(())
    }
}

fn main() {
    // e.g. `cargo run --example quadrants -- -composite_strategy radix_k`
    let args: Vec<String> = std::env::args().skip(1).collect();
    let options = CompositeOptions::from_args(&args).unwrap();
    let ranks = 4;
    let size = 64;

    let colors = [[1.0, 0.0, 0.0, 1.0], [0.0, 1.0, 0.0, 1.0], [0.0, 0.0, 1.0, 1.0], [1.0, 1.0, 0.0, 1.0]];
    let results = run_local(ranks, |comm| {
        let q = comm.rank();
        let (x0, y0) = ((q % 2) as i32 * size, (q / 2) as i32 * size);
        let mut img = Image::new(Bounds::new(x0, x0 + size - 1, y0, y0 + size - 1), true).with_partition(q as u32);
        img.fill(colors[q], Some(0.5));
        let ctx = CompositeContext::new(options.clone());
        ctx.composite(&comm, vec![img], &CompositeMode::<f64>::ZBuffer)
    });

    for (rank, result) in results.into_iter().enumerate() {
        match result.unwrap() {
            Some(img) => {
                println!("rank {rank}: {img}");
                let file = std::fs::File::create("quadrants.ppm").unwrap();
                let mut encoder = PpmEncoder { out: std::io::BufWriter::new(file) };
                let comments = vec![format!("composited on {ranks} ranks")];
                img.save_with(&mut encoder, &comments).unwrap();
                println!("wrote quadrants.ppm");
            }
            None => println!("rank {rank}: no image"),
        }
    }
}
