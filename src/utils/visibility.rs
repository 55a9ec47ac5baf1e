//! Visibility ordering of data partitions along a view direction.
//!
//! Partitions are ranked by the signed projection of their centroid onto the
//! view direction (which points from the eye into the scene), nearest first.
//! Projections that agree within a relative tolerance count as equal and are
//! ordered by partition id, so every rank derives the same permutation from
//! the same inputs.

use std::collections::HashMap;

use num_traits::Float;

use crate::error::CompositeError;
use crate::image::PartitionId;

/// A partition's identity and where it sits in world space.
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionDescriptor<T = f64> {
    pub id: PartitionId,
    pub centroid: [T; 3],
}

impl<T: Float> PartitionDescriptor<T> {
    pub fn new(id: PartitionId, centroid: [T; 3]) -> Self {
        Self { id, centroid }
    }

    /// Descriptor for an axis-aligned bounding box.
    pub fn from_box(id: PartitionId, min: [T; 3], max: [T; 3]) -> Self {
        let two = T::one() + T::one();
        let centroid = [0, 1, 2].map(|i| (min[i] + max[i]) / two);
        Self { id, centroid }
    }
}

/// Total order over partitions, nearest to the viewer first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibilityOrder {
    order: Vec<PartitionId>,
    position: HashMap<PartitionId, usize>,
}

impl VisibilityOrder {
    /// Sort `partitions` along `view_dir`.
    ///
    /// # Errors
    /// `ConfigurationError` for a zero or non-finite direction, a non-finite
    /// centroid or a repeated partition id.
    pub fn new<T: Float>(partitions: &[PartitionDescriptor<T>], view_dir: [T; 3]) -> Result<Self, CompositeError> {
        let dir_len = dot(&view_dir, &view_dir).sqrt();
        if !dir_len.is_finite() || dir_len == T::zero() {
            return Err(CompositeError::ConfigurationError("view direction must be finite and non-zero".into()));
        }
        let dir = view_dir.map(|c| c / dir_len);

        let mut keyed = Vec::with_capacity(partitions.len());
        for p in partitions {
            let proj = dot(&p.centroid, &dir);
            if !proj.is_finite() {
                return Err(CompositeError::ConfigurationError(format!(
                    "partition {} has a non-finite centroid",
                    p.id
                )));
            }
            keyed.push((proj, p.id));
        }
        keyed.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal).then(a.1.cmp(&b.1)));

        // Runs of near-equal projections are re-sorted by id.
        let mut start = 0;
        while start < keyed.len() {
            let anchor = keyed[start].0;
            let mut end = start + 1;
            while end < keyed.len() && nearly_equal(anchor, keyed[end].0) {
                end += 1;
            }
            keyed[start..end].sort_by_key(|k| k.1);
            start = end;
        }

        let order: Vec<PartitionId> = keyed.into_iter().map(|k| k.1).collect();
        let mut position = HashMap::with_capacity(order.len());
        for (pos, &id) in order.iter().enumerate() {
            if position.insert(id, pos).is_some() {
                return Err(CompositeError::ConfigurationError(format!("partition {id} listed twice")));
            }
        }
        Ok(Self { order, position })
    }

    /// Partition ids, nearest first.
    pub fn front_to_back(&self) -> &[PartitionId] {
        &self.order
    }

    /// Partition ids, farthest first (the order "over" blending consumes).
    pub fn back_to_front(&self) -> impl Iterator<Item = PartitionId> + '_ {
        self.order.iter().rev().copied()
    }

    /// Rank of `id` in front-to-back order.
    pub fn position(&self, id: PartitionId) -> Option<usize> {
        self.position.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

fn dot<T: Float>(a: &[T; 3], b: &[T; 3]) -> T {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn nearly_equal<T: Float>(a: T, b: T) -> bool {
    let scale = a.abs().max(b.abs()).max(T::one());
    let tol = T::epsilon() * T::from(64.0).unwrap_or_else(T::one) * scale;
    (a - b).abs() <= tol
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorts_along_view_direction() {
        let parts = vec![
            PartitionDescriptor::new(0, [0.0, 0.0, 5.0]),
            PartitionDescriptor::new(1, [0.0, 0.0, -1.0]),
            PartitionDescriptor::new(2, [0.0, 0.0, 2.0]),
        ];
        let order = VisibilityOrder::new(&parts, [0.0, 0.0, 1.0]).unwrap();
        assert_eq!(order.front_to_back(), &[1, 2, 0]);
        assert_eq!(order.back_to_front().collect::<Vec<_>>(), vec![0, 2, 1]);
        assert_eq!(order.position(2), Some(1));

        let flipped = VisibilityOrder::new(&parts, [0.0, 0.0, -3.0]).unwrap();
        assert_eq!(flipped.front_to_back(), &[0, 2, 1]);
    }

    #[test]
    fn ties_break_by_id() {
        let parts = vec![
            PartitionDescriptor::new(7, [1.0, 0.0, 0.0]),
            PartitionDescriptor::new(3, [1.0, 5.0, 0.0]),
            PartitionDescriptor::new(5, [1.0 + 1e-15, -2.0, 0.0]),
        ];
        let order = VisibilityOrder::new(&parts, [1.0, 0.0, 0.0]).unwrap();
        assert_eq!(order.front_to_back(), &[3, 5, 7]);
    }

    #[test]
    fn rejects_bad_input() {
        let parts = vec![PartitionDescriptor::new(1, [0.0f32; 3]), PartitionDescriptor::new(1, [1.0f32; 3])];
        assert!(VisibilityOrder::new(&parts, [0.0, 0.0, 1.0]).is_err());
        assert!(VisibilityOrder::new(&parts[..1], [0.0, 0.0, 0.0]).is_err());
    }

    #[test]
    fn box_centroid() {
        let d = PartitionDescriptor::from_box(4, [0.0, 0.0, 0.0], [2.0, 4.0, 6.0]);
        assert_eq!(d.centroid, [1.0, 2.0, 3.0]);
    }
}
