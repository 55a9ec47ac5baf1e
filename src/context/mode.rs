//! Compositing mode and the data each mode needs.

use num_traits::Float;

use crate::error::CompositeError;
use crate::image::MergeMode;
use crate::utils::visibility::{PartitionDescriptor, VisibilityOrder};

/// How partial images combine.
///
/// `Blend` carries what is needed to order partitions: the view direction
/// (eye into the scene) and the descriptors of every partition in the job,
/// not just the local ones.
#[derive(Debug, Clone, PartialEq)]
pub enum CompositeMode<T = f64> {
    /// Opaque surfaces: nearest depth wins.
    ZBuffer,
    /// Transparent or volumetric content: "over" in visibility order.
    Blend {
        view_dir: [T; 3],
        partitions: Vec<PartitionDescriptor<T>>,
    },
}

impl<T: Float> CompositeMode<T> {
    pub fn merge_mode(&self) -> MergeMode {
        match self {
            CompositeMode::ZBuffer => MergeMode::ZBuffer,
            CompositeMode::Blend { .. } => MergeMode::Blend,
        }
    }

    /// Visibility order for `Blend`; z-buffering needs none.
    pub fn visibility(&self) -> Result<Option<VisibilityOrder>, CompositeError> {
        match self {
            CompositeMode::ZBuffer => Ok(None),
            CompositeMode::Blend { view_dir, partitions } => VisibilityOrder::new(partitions, *view_dir).map(Some),
        }
    }

    /// Bytes every rank must agree on: mode tag, view direction and the
    /// descriptor list.
    pub(crate) fn fingerprint(&self, out: &mut Vec<u8>) {
        match self {
            CompositeMode::ZBuffer => out.push(0),
            CompositeMode::Blend { view_dir, partitions } => {
                out.push(1);
                for c in view_dir {
                    out.extend_from_slice(&c.to_f64().unwrap_or(f64::NAN).to_bits().to_le_bytes());
                }
                out.extend_from_slice(&(partitions.len() as u32).to_le_bytes());
                for p in partitions {
                    out.extend_from_slice(&p.id.to_le_bytes());
                    for c in &p.centroid {
                        out.extend_from_slice(&c.to_f64().unwrap_or(f64::NAN).to_bits().to_le_bytes());
                    }
                }
            }
        }
    }
}
