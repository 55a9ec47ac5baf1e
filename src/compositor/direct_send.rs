//! Direct-send: one all-to-all round over a static tile assignment.
//!
//! Ranks first all-gather the bounds of their contributions so each rank
//! knows which peers will send it something; pairs with nothing to exchange
//! skip the message entirely. Step `s` pairs rank `r` with destination
//! `r + s` and source `r - s`, which keeps blocking transports deadlock free.

use super::fragment::{Fragment, decode_batch, decode_bounds, encode_batch, encode_bounds, fold};
use super::{CompositeJob, Compositor};
use crate::error::CompositeError;
use crate::image::{Bounds, Image};
use crate::parallel::Comm;
use crate::utils::tiling::{TileLayout, TileMap};

#[derive(Debug, Clone, Copy, Default)]
pub struct DirectSend {
    pub layout: TileLayout,
}

impl DirectSend {
    pub fn new(layout: TileLayout) -> Self {
        Self { layout }
    }
}

impl Compositor for DirectSend {
    fn composite<C: Comm>(&mut self, comm: &C, job: &CompositeJob) -> Result<Option<Image>, CompositeError> {
        let (rank, size) = (comm.rank(), comm.size());
        let tiles = TileMap::new(job.global, size, self.layout);
        let my_tile = tiles.tile(rank);

        let footprint: Vec<Bounds> = job.fragments.iter().map(|f| f.bounds()).collect();
        let footprints = comm
            .all_gather(&encode_bounds(&footprint))?
            .iter()
            .map(|b| decode_bounds(b))
            .collect::<Result<Vec<_>, _>>()?;

        let mut outgoing = split_by_owner(&job.fragments, &tiles)?;
        let mut received = std::mem::take(&mut outgoing[rank]);
        let mut sent = 0usize;
        for shift in 1..size {
            let dest = (rank + shift) % size;
            let src = (rank + size - shift) % size;
            let outgoing = std::mem::take(&mut outgoing[dest]);
            let need_recv = footprints[src].iter().any(|b| b.overlaps(&my_tile));
            match (!outgoing.is_empty(), need_recv) {
                (true, true) => {
                    received.extend(decode_batch(&comm.exchange(dest, &encode_batch(&outgoing), src)?)?);
                    sent += 1;
                }
                (true, false) => {
                    comm.send(dest, &encode_batch(&outgoing))?;
                    sent += 1;
                }
                (false, true) => received.extend(decode_batch(&comm.recv(src)?)?),
                (false, false) => {}
            }
        }
        log::debug!(
            target: "sortlast::direct_send",
            "rank {rank}: sent {sent} messages, folding {} fragments into tile {my_tile}",
            received.len(),
        );

        if my_tile.is_empty() {
            return Ok(None);
        }
        fold(my_tile, received, job.mode, job.has_depth).map(Some)
    }
}

/// Cut every local fragment along the tile boundaries, one list per owning
/// rank.
fn split_by_owner(fragments: &[Fragment], tiles: &TileMap) -> Result<Vec<Vec<Fragment>>, CompositeError> {
    let mut out: Vec<Vec<Fragment>> = vec![Vec::new(); tiles.len()];
    for f in fragments {
        let footprint = f.bounds();
        for (owner, part) in tiles.overlapping(&footprint) {
            out[owner].push(Fragment { first: f.first, last: f.last, image: f.image.extract(&part)? });
        }
    }
    Ok(out)
}
