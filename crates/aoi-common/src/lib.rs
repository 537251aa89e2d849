//! Common types shared across the staging workspace.

pub mod bbox;
pub mod dataset;
pub mod error;
pub mod tier;

pub use bbox::BoundingBox;
pub use dataset::{ColumnarFile, HdfDataset, RasterDataset, TabularFile, VectorFile};
pub use error::{StageError, StageResult};
pub use tier::Tier;
