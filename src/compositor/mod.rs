//! Parallel compositing algorithms.
//!
//! Every compositor consumes this rank's prepared fragments and leaves the
//! rank holding the fully composited image of the screen region it ends up
//! owning (or nothing). Stitching those regions into a whole image is the
//! job of [`gather::assemble`].

use crate::error::CompositeError;
use crate::image::{Bounds, Image, MergeMode};
use crate::parallel::Comm;

pub mod fragment;
pub mod direct_send;
pub mod radix_k;
pub mod collector;
pub mod gather;

pub use fragment::Fragment;
pub use direct_send::DirectSend;
pub use radix_k::RadixK;
pub use collector::Collector;
pub use gather::{Delivery, assemble};

/// One rank's share of a compositing call.
#[derive(Debug, Clone)]
pub struct CompositeJob {
    /// Local, non-empty contributions tagged with their visibility position.
    pub fragments: Vec<Fragment>,
    /// Screen rectangle of the final image, identical on every rank.
    pub global: Bounds,
    pub mode: MergeMode,
    /// Whether the composited result carries a depth buffer.
    pub has_depth: bool,
}

/// Common interface of the exchange algorithms.
pub trait Compositor {
    /// Run the exchange; returns the composited region this rank owns.
    fn composite<C: Comm>(&mut self, comm: &C, job: &CompositeJob) -> Result<Option<Image>, CompositeError>;
}
