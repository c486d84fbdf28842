//! Wiring the pipeline from configuration

use crate::pipeline::{Pipeline, PipelineSettings};
use anyhow::{bail, Context};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use vitrine_core::{Embedder, ObjectDetector, VitrineConfig};
use vitrine_eye::models::ModelManager;
use vitrine_eye::{CategoryFilter, HttpFrameSource, VideoSampler, COCO_CLASSES};
use vitrine_index::{demo_catalog, load_catalog, SimilarityIndex};

pub fn settings_from(config: &VitrineConfig) -> PipelineSettings {
    PipelineSettings {
        top_k: config.pipeline.top_k,
        fetch_timeout: config.pipeline.fetch_timeout(),
        include_crops: config.pipeline.include_crops,
    }
}

pub fn category_filter(config: &VitrineConfig) -> CategoryFilter {
    let filter = CategoryFilter::new(&config.pipeline.product_categories);
    let unreachable = filter.unreachable(COCO_CLASSES);
    if !unreachable.is_empty() {
        warn!(
            "Categories the detector labels never produce: {}",
            unreachable.join(", ")
        );
    }
    filter
}

/// Build the similarity index from the configured catalog file, or the demo
/// catalog when none is set.
pub fn build_index(
    config: &VitrineConfig,
    embedder: Option<&dyn Embedder>,
) -> anyhow::Result<SimilarityIndex> {
    let dimension = config.catalog.embedding_dim;
    let entries = match &config.catalog.path {
        Some(path) => load_catalog(path, dimension, embedder)
            .with_context(|| format!("Failed to load catalog {:?}", path))?,
        None => {
            info!("No catalog configured, using the demo catalog");
            demo_catalog(dimension)?
        }
    };
    Ok(SimilarityIndex::build(entries, dimension)?)
}

async fn resolve_models(config: &VitrineConfig) -> anyhow::Result<(PathBuf, PathBuf)> {
    let models = &config.models;
    if models.auto_download {
        let manager = ModelManager::new(Arc::new(models.clone()));
        let detector = manager.get_detector_model().await?;
        let embedder = manager.get_embedder_model().await?;
        return Ok((detector, embedder));
    }

    let (detector, embedder) = (models.detector_path(), models.embedder_path());
    for path in [&detector, &embedder] {
        if !path.exists() {
            bail!(
                "Model file {:?} not found. Run `download-model all` or enable models.auto_download",
                path
            );
        }
    }
    Ok((detector, embedder))
}

#[cfg(feature = "onnx")]
fn load_models(
    config: &VitrineConfig,
    detector_path: &std::path::Path,
    embedder_path: &std::path::Path,
) -> anyhow::Result<(Arc<dyn ObjectDetector>, Arc<dyn Embedder>)> {
    use vitrine_eye::models::{ClipModel, YoloModel};
    use vitrine_eye::{ProductDetector, VisualEmbedder, YoloDecoder};

    let models = &config.models;
    let size = models.detector_input_size;
    let decoder = YoloDecoder::new(
        (size, size),
        models.confidence_threshold,
        models.nms_threshold,
    );

    let yolo = YoloModel::new(detector_path, decoder, models.intra_threads)?;
    let clip = ClipModel::new(embedder_path, models.intra_threads)?;

    let detector: Arc<dyn ObjectDetector> =
        Arc::new(ProductDetector::new(Arc::new(yolo), category_filter(config)));
    let embedder: Arc<dyn Embedder> =
        Arc::new(VisualEmbedder::new(Arc::new(clip), config.catalog.embedding_dim));
    Ok((detector, embedder))
}

#[cfg(not(feature = "onnx"))]
fn load_models(
    _config: &VitrineConfig,
    _detector_path: &std::path::Path,
    _embedder_path: &std::path::Path,
) -> anyhow::Result<(Arc<dyn ObjectDetector>, Arc<dyn Embedder>)> {
    bail!("vitrine-server was built without the `onnx` feature; no inference backend available")
}

/// Load models, catalog and frame source and assemble the pipeline.
pub async fn build_pipeline(config: &VitrineConfig) -> anyhow::Result<Pipeline> {
    info!("Loading models from {:?}", config.models.model_dir);
    let (detector_path, embedder_path) = resolve_models(config).await?;
    let (detector, embedder) = load_models(config, &detector_path, &embedder_path)?;
    info!("Models ready");

    let index = build_index(config, Some(embedder.as_ref()))?;
    info!("Catalog ready with {} products", index.len());

    let pipeline = &config.pipeline;
    let sampler = VideoSampler::new(&pipeline.ffmpeg_path, pipeline.sample_fps, pipeline.max_frames);
    let source = HttpFrameSource::new(sampler, pipeline.max_download_bytes)?;

    Ok(Pipeline::new(
        Arc::new(source),
        detector,
        embedder,
        Arc::new(index),
        settings_from(config),
    )?)
}
