//! Gather-to-one baseline: every rank ships its whole contribution to one
//! root, which folds everything sequentially.

use super::fragment::{decode_batch, encode_batch, fold};
use super::{CompositeJob, Compositor};
use crate::error::CompositeError;
use crate::image::Image;
use crate::parallel::Comm;

#[derive(Debug, Clone, Copy, Default)]
pub struct Collector {
    pub root: usize,
}

impl Collector {
    pub fn new(root: usize) -> Self {
        Self { root }
    }
}

impl Compositor for Collector {
    fn composite<C: Comm>(&mut self, comm: &C, job: &CompositeJob) -> Result<Option<Image>, CompositeError> {
        if self.root >= comm.size() {
            return Err(CompositeError::ConfigurationError(format!(
                "collector root {} outside communicator of size {}",
                self.root,
                comm.size()
            )));
        }
        let Some(batches) = comm.gather(&encode_batch(&job.fragments), self.root)? else {
            return Ok(None);
        };
        let mut fragments = Vec::new();
        for b in &batches {
            fragments.extend(decode_batch(b)?);
        }
        log::debug!(
            target: "sortlast::collector",
            "root {}: folding {} fragments into {}",
            self.root,
            fragments.len(),
            job.global,
        );
        if job.global.is_empty() {
            return Ok(None);
        }
        fold(job.global, fragments, job.mode, job.has_depth).map(Some)
    }
}
