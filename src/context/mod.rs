//! Context module for sortlast.
//!
//! This module provides the compositing mode and the context/factory type
//! that validates a compositing call across ranks, selects an algorithm and
//! delivers the final image.
//!
//! Modules:
//! - [`mode`]: the `CompositeMode` tagged variant (`ZBuffer` or `Blend` with its view data).
//! - [`composite_context`]: the `CompositeContext` driver and `CompositorKind` selection.
//!
//! # Example
//! ```rust,ignore
//! use sortlast::{CompositeContext, CompositeMode, CompositeOptions};
//! let ctx = CompositeContext::new(CompositeOptions::default());
//! let image = ctx.composite(&comm, local_images, &CompositeMode::<f64>::ZBuffer)?;
//! ```

pub mod mode;
pub use mode::CompositeMode;
pub mod composite_context;
pub use composite_context::{CompositeContext, CompositorKind};
