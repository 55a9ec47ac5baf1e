//! Radix-k: factored exchange-and-shrink.
//!
//! The rank count is factored into radices `k_0 * k_1 * ...`. Ranks are laid
//! out as a mixed-radix number; in round `i` the ranks that differ only in
//! digit `i` form a group, split their (shared) current region into `k_i`
//! slabs, and each member keeps the slab matching its digit after exchanging
//! the other slabs with the rest of the group. After the last round every
//! rank holds the final pixels of a region `1/P` of the screen.
//!
//! Rounds are kept in an arena indexed by round number; round `i + 1` reads
//! only round `i`'s fragments.

use super::fragment::{Fragment, clip_all, coalesce, decode_batch, encode_batch, fold};
use super::{CompositeJob, Compositor};
use crate::error::CompositeError;
use crate::image::{Bounds, Image};
use crate::parallel::Comm;
use crate::utils::factor::radix_factors;

#[derive(Debug, Clone, Copy)]
pub struct RadixK {
    /// Largest group size to aim for per round.
    pub target: usize,
}

impl Default for RadixK {
    fn default() -> Self {
        Self { target: 8 }
    }
}

impl RadixK {
    pub fn new(target: usize) -> Self {
        Self { target }
    }
}

/// State at the start of one round.
#[derive(Debug)]
struct Round {
    region: Bounds,
    fragments: Vec<Fragment>,
}

impl Compositor for RadixK {
    fn composite<C: Comm>(&mut self, comm: &C, job: &CompositeJob) -> Result<Option<Image>, CompositeError> {
        let (rank, size) = (comm.rank(), comm.size());
        let radices = radix_factors(size, self.target);

        let start = coalesce(clip_all(&job.fragments, &job.global)?, job.mode)?;
        let mut rounds = vec![Round { region: job.global, fragments: start }];
        let mut stride = 1;
        for (i, &k) in radices.iter().enumerate() {
            let digit = (rank / stride) % k;
            let base = rank - digit * stride;
            let region = rounds[i].region;
            let current = std::mem::take(&mut rounds[i].fragments);

            let slabs: Vec<Bounds> = (0..k).map(|j| region.split(k, j)).collect();
            let mine = slabs[digit];
            let mut next = clip_all(&current, &mine)?;
            for s in 1..k {
                let to = (digit + s) % k;
                let from = (digit + k - s) % k;
                let outgoing = clip_all(&current, &slabs[to])?;
                let bytes = comm.exchange(base + to * stride, &encode_batch(&outgoing), base + from * stride)?;
                next.extend(decode_batch(&bytes)?);
            }
            let next = coalesce(next, job.mode)?;
            log::debug!(
                target: "sortlast::radix_k",
                "rank {rank}: round {i} (k = {k}) kept {mine} with {} fragments",
                next.len(),
            );
            rounds.push(Round { region: mine, fragments: next });
            stride *= k;
        }

        let Some(last) = rounds.pop() else {
            return Ok(None);
        };
        if last.region.is_empty() {
            return Ok(None);
        }
        fold(last.region, last.fragments, job.mode, job.has_depth).map(Some)
    }
}
