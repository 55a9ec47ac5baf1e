//! Partial-image value types: screen bounds, pixel/depth buffers, the
//! per-pixel merge rules and the byte layout used to ship sub-images between
//! ranks.

pub mod bounds;
pub mod buffer;
pub mod merge;
pub mod wire;

pub use bounds::Bounds;
pub use buffer::{CHANNELS, Image, NO_DEPTH, PartitionId, premultiply};
pub use merge::MergeMode;
pub use wire::WireFlags;
