//! vitrine-server: URL handling, request orchestration and the HTTP API

pub mod encoding;
pub mod http;
pub mod pipeline;
pub mod startup;
pub mod url;

pub use http::{create_router, ApiState};
pub use pipeline::{canned_results, Pipeline, PipelineSettings, RunTracker, Stage};
pub use url::{normalize_url, UrlPolicy};
