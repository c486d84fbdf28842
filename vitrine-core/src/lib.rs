//! vitrine-core: shared records, error taxonomy, collaborator traits and
//! configuration for the vitrine product-matching pipeline.

pub mod config;
pub mod error;
pub mod math;
pub mod traits;
pub mod types;

pub use config::{ConfigError, VitrineConfig};
pub use error::{ComputeError, ErrorKind, FetchError, PipelineError};
pub use traits::{Embedder, FrameSource, ObjectDetector};
pub use types::{
    BoundingBox, CatalogEntry, Detection, Embedding, Frame, FrameData, Match, MatchResult,
    ProcessRequest, DEFAULT_EMBEDDING_DIM, NORM_TOLERANCE,
};
