//! sortlast: sort-last parallel image compositing
//!
//! This crate merges the partial images rendered by many processes (one per
//! data partition) into a single image, using only point-to-point and
//! collective message passing. It provides direct-send, radix-k and
//! gather-to-one compositors with z-buffer and visibility-ordered blending,
//! over MPI or an in-process transport.

pub mod parallel;

pub mod compositor;
pub mod config;
pub mod context;
pub mod core;
pub mod error;
pub mod image;
pub mod utils;

// Re-exports for convenience
pub use compositor::{Delivery, Fragment};
pub use config::*;
pub use context::*;
pub use crate::core::traits::ImageEncoder;
pub use error::*;
pub use image::*;
pub use parallel::{Comm, LocalComm, UniverseComm, run_local};
pub use utils::*;
