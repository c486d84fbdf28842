//! Frame sources: where the pixels of a request come from

pub mod file;
pub mod http;
pub mod sampling;
pub mod video;

pub use file::FileFrameSource;
pub use http::{HttpFrameSource, MediaKind, OpenGraphExtractor};
pub use sampling::sample_indices;
pub use video::VideoSampler;
