pub mod frames;
pub mod metadata;

// Re-export key types for easier use by dependent crates
pub use frames::{Category, CategoryTable, FrameTable, SENTINEL};
pub use metadata::{Metadata, MetadataRecord, PointSet};
