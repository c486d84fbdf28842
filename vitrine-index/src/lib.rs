//! vitrine-index: the product catalog and exact inner-product search over it

pub mod catalog;
pub mod error;
pub mod similarity;

pub use catalog::{demo_catalog, load_catalog, DEMO_SEED};
pub use error::IndexError;
pub use similarity::SimilarityIndex;
