pub mod factor;
pub mod tiling;
pub mod visibility;

pub use tiling::{TileLayout, TileMap};
pub use visibility::{PartitionDescriptor, VisibilityOrder};
