pub mod options;
pub use options::CompositeOptions;
