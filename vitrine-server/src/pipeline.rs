//! Request orchestration: URL, frames, detections, embeddings, matches

use crate::url::UrlPolicy;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task;
use tracing::{debug, error, info, info_span, warn, Instrument};
use vitrine_core::{
    ComputeError, Detection, Embedder, FetchError, Frame, FrameSource, Match, MatchResult,
    ObjectDetector, PipelineError, ProcessRequest,
};
use vitrine_index::SimilarityIndex;

/// Where a request currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    FramesFetched,
    Detected,
    EmbeddedAndMatched,
    Responded,
    Error,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Tracks the stage of one request and logs every transition.
#[derive(Debug)]
pub struct RunTracker {
    stage: Stage,
    started: Instant,
}

impl RunTracker {
    pub fn new() -> Self {
        Self {
            stage: Stage::Received,
            started: Instant::now(),
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn advance(&mut self, next: Stage) {
        debug!(
            "{} -> {} after {:?}",
            self.stage,
            next,
            self.started.elapsed()
        );
        self.stage = next;
    }

    /// Move to `Error`, logging the full cause.
    pub fn fail(&mut self, err: &PipelineError) {
        match err {
            PipelineError::InvalidInput(_)
            | PipelineError::NoMedia
            | PipelineError::NoObjectsFound => {
                info!("{} failed at {}: {}", err.kind(), self.stage, err)
            }
            PipelineError::FetchFailure(_) => {
                warn!("{} failed at {}: {}", err.kind(), self.stage, err)
            }
            PipelineError::Compute(_) | PipelineError::Internal(_) => {
                error!("{} failed at {}: {}", err.kind(), self.stage, err)
            }
        }
        self.stage = Stage::Error;
    }
}

impl Default for RunTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-request knobs of the orchestrator.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub top_k: usize,
    pub fetch_timeout: Duration,
    pub include_crops: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            top_k: 5,
            fetch_timeout: Duration::from_secs(60),
            include_crops: true,
        }
    }
}

/// Fixed response of `test_mode` requests.
pub fn canned_results() -> Vec<MatchResult> {
    vec![MatchResult {
        object_category: "chair".to_string(),
        confidence: 0.92,
        bounding_box: None,
        frame_index: None,
        cropped_image: None,
        matches: vec![Match {
            product_id: None,
            name: "Modern Chair".to_string(),
            image_url: "https://example.com/chair.jpg".to_string(),
            similarity_score: 0.95,
        }],
    }]
}

/// Composes frame source, detector, embedder and index for one request at a
/// time. Holds no per-request state; share it behind an `Arc`.
pub struct Pipeline {
    urls: UrlPolicy,
    source: Arc<dyn FrameSource>,
    detector: Arc<dyn ObjectDetector>,
    embedder: Arc<dyn Embedder>,
    index: Arc<SimilarityIndex>,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(
        source: Arc<dyn FrameSource>,
        detector: Arc<dyn ObjectDetector>,
        embedder: Arc<dyn Embedder>,
        index: Arc<SimilarityIndex>,
        settings: PipelineSettings,
    ) -> Result<Self, PipelineError> {
        if embedder.dimension() != index.dimension() {
            return Err(ComputeError::DimensionMismatch {
                expected: index.dimension(),
                actual: embedder.dimension(),
            }
            .into());
        }
        if settings.top_k == 0 {
            return Err(PipelineError::Internal("top_k must be at least 1".to_string()));
        }
        let urls = UrlPolicy::new()
            .map_err(|e| PipelineError::Internal(format!("URL pattern: {}", e)))?;

        Ok(Self {
            urls,
            source,
            detector,
            embedder,
            index,
            settings,
        })
    }

    pub fn index(&self) -> &Arc<SimilarityIndex> {
        &self.index
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Run one request end to end. Results come in frame order, then
    /// per-frame detection order.
    pub async fn process(&self, request: &ProcessRequest) -> Result<Vec<MatchResult>, PipelineError> {
        let span = info_span!("process", url = %request.url, test_mode = request.test_mode);
        async move {
            let mut tracker = RunTracker::new();
            match self.run(request, &mut tracker).await {
                Ok(results) => {
                    tracker.advance(Stage::Responded);
                    info!(
                        "Responded with {} results in {:?}",
                        results.len(),
                        tracker.started.elapsed()
                    );
                    Ok(results)
                }
                Err(err) => {
                    tracker.fail(&err);
                    Err(err)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn run(
        &self,
        request: &ProcessRequest,
        tracker: &mut RunTracker,
    ) -> Result<Vec<MatchResult>, PipelineError> {
        let url = self.urls.check(&request.url)?;
        info!("Processing URL: {}", url);

        if request.test_mode {
            info!("Running in test mode with mock data");
            return Ok(canned_results());
        }

        let frames = self.fetch(&url).await?;
        if frames.is_empty() {
            return Err(PipelineError::NoMedia);
        }
        info!("Fetched {} frames", frames.len());
        tracker.advance(Stage::FramesFetched);

        let detections = self.detect(frames).await?;
        if detections.is_empty() {
            return Err(PipelineError::NoObjectsFound);
        }
        info!("Detected {} product objects", detections.len());
        tracker.advance(Stage::Detected);

        let results = self.embed_and_match(detections).await?;
        tracker.advance(Stage::EmbeddedAndMatched);
        Ok(results)
    }

    async fn fetch(&self, url: &str) -> Result<Vec<Frame>, PipelineError> {
        let timeout = self.settings.fetch_timeout;
        let source = self.source.clone();
        let url = url.to_string();
        let mut handle =
            task::spawn(async move { source.fetch_frames(&url).await }.in_current_span());

        match tokio::time::timeout(timeout, &mut handle).await {
            Ok(joined) => {
                let frames = joined
                    .map_err(|e| PipelineError::Internal(format!("fetch task failed: {}", e)))??;
                Ok(frames)
            }
            Err(_) => {
                handle.abort();
                Err(FetchError::Timeout(timeout).into())
            }
        }
    }

    async fn detect(&self, frames: Vec<Frame>) -> Result<Vec<Detection>, PipelineError> {
        let detector = self.detector.clone();
        let detections = task::spawn_blocking(move || -> Result<Vec<Detection>, ComputeError> {
            let mut all = Vec::new();
            for frame in &frames {
                all.extend(detector.detect(frame)?);
            }
            Ok(all)
        })
        .await
        .map_err(|e| PipelineError::Internal(format!("detection task failed: {}", e)))??;
        Ok(detections)
    }

    async fn embed_and_match(
        &self,
        detections: Vec<Detection>,
    ) -> Result<Vec<MatchResult>, PipelineError> {
        let embedder = self.embedder.clone();
        let index = self.index.clone();
        let top_k = self.settings.top_k;
        let include_crops = self.settings.include_crops;

        let results = task::spawn_blocking(move || -> Result<Vec<MatchResult>, PipelineError> {
            detections
                .into_iter()
                .map(|detection| -> Result<MatchResult, PipelineError> {
                    let embedding = embedder.embed(&detection.cropped_image)?;
                    let matches = index
                        .search_embedding(&embedding, top_k)
                        .map_err(|e| PipelineError::Internal(format!("search failed: {}", e)))?;
                    Ok(MatchResult {
                        object_category: detection.category,
                        confidence: detection.confidence,
                        bounding_box: Some(detection.bounding_box),
                        frame_index: Some(detection.frame_index),
                        cropped_image: include_crops.then_some(detection.cropped_image),
                        matches,
                    })
                })
                .collect()
        })
        .await
        .map_err(|e| PipelineError::Internal(format!("matching task failed: {}", e)))??;
        Ok(results)
    }
}
