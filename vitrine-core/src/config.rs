// Configuration system for vitrine

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// Product categories searched for by default: the union of the category
/// lists the detector has been run with.
pub const DEFAULT_PRODUCT_CATEGORIES: &[&str] = &[
    "tie", "handbag", "suitcase", "bottle", "wine glass", "cup", "chair", "couch", "tv",
    "laptop", "mouse", "remote", "keyboard", "cell phone", "book", "clock", "vase", "scissors",
    "teddy bear", "hair drier", "toothbrush", "backpack", "umbrella", "shoe", "sunglasses",
    "hat", "dining table", "bed", "mirror",
];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    /// Allowed CORS origins; empty means any origin.
    pub cors_origins: Vec<String>,
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: Vec::new(),
            log_level: "info".to_string(),
        }
    }
}

/// Model files and inference settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub model_dir: PathBuf,
    pub detector_file: String,
    pub embedder_file: String,
    /// Square input side of the detector network.
    pub detector_input_size: u32,
    pub confidence_threshold: f32,
    pub nms_threshold: f32,
    pub intra_threads: usize,
    /// Download missing model files from the URLs below at startup.
    pub auto_download: bool,
    pub detector_url: Option<String>,
    pub embedder_url: Option<String>,
    pub detector_sha256: Option<String>,
    pub embedder_sha256: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("./models"),
            detector_file: "yolov8x.onnx".to_string(),
            embedder_file: "clip_vit_b32_visual.onnx".to_string(),
            detector_input_size: 640,
            confidence_threshold: 0.25,
            nms_threshold: 0.45,
            intra_threads: 4,
            auto_download: false,
            detector_url: None,
            embedder_url: None,
            detector_sha256: None,
            embedder_sha256: None,
        }
    }
}

impl ModelConfig {
    pub fn detector_path(&self) -> PathBuf {
        self.model_dir.join(&self.detector_file)
    }

    pub fn embedder_path(&self) -> PathBuf {
        self.model_dir.join(&self.embedder_file)
    }
}

/// Per-request pipeline behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Matches returned per detected object.
    pub top_k: usize,
    pub product_categories: Vec<String>,
    /// Upper bound on frames taken from one video.
    pub max_frames: usize,
    /// Frames sampled per second of video.
    pub sample_fps: f32,
    pub fetch_timeout_secs: u64,
    pub max_download_bytes: u64,
    pub include_crops: bool,
    pub jpeg_quality: u8,
    pub ffmpeg_path: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            product_categories: DEFAULT_PRODUCT_CATEGORIES
                .iter()
                .map(|c| c.to_string())
                .collect(),
            max_frames: 30,
            sample_fps: 1.0,
            fetch_timeout_secs: 60,
            max_download_bytes: 200 * 1024 * 1024,
            include_crops: true,
            jpeg_quality: 85,
            ffmpeg_path: "ffmpeg".to_string(),
        }
    }
}

impl PipelineConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

/// Product catalog source
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// JSON catalog file; the built-in demo catalog is used when unset.
    pub path: Option<PathBuf>,
    pub embedding_dim: usize,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            path: None,
            embedding_dim: crate::types::DEFAULT_EMBEDDING_DIM,
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VitrineConfig {
    pub server: ServerConfig,
    pub models: ModelConfig,
    pub pipeline: PipelineConfig,
    pub catalog: CatalogConfig,
}

impl VitrineConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Override fields from `VITRINE_*` environment variables
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(host) = lookup("VITRINE_HOST") {
            self.server.bind_address = host;
        }
        if let Some(port) = lookup("VITRINE_PORT") {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => warn!("Ignoring invalid VITRINE_PORT: {}", port),
            }
        }
        if let Some(level) = lookup("VITRINE_LOG_LEVEL") {
            self.server.log_level = level;
        }
        if let Some(dir) = lookup("VITRINE_MODEL_DIR") {
            self.models.model_dir = PathBuf::from(dir);
        }
        if let Some(path) = lookup("VITRINE_CATALOG") {
            self.catalog.path = Some(PathBuf::from(path));
        }
        if let Some(k) = lookup("VITRINE_TOP_K") {
            match k.parse() {
                Ok(k) => self.pipeline.top_k = k,
                Err(_) => warn!("Ignoring invalid VITRINE_TOP_K: {}", k),
            }
        }
        if let Some(ffmpeg) = lookup("VITRINE_FFMPEG") {
            self.pipeline.ffmpeg_path = ffmpeg;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::ValidationError(msg.to_string()));

        if self.server.port == 0 {
            return invalid("server.port cannot be 0");
        }
        if self.models.detector_input_size == 0 || self.models.detector_input_size % 32 != 0 {
            return invalid("models.detector_input_size must be a positive multiple of 32");
        }
        if !(0.0..=1.0).contains(&self.models.confidence_threshold) {
            return invalid("models.confidence_threshold must be within [0, 1]");
        }
        if !(0.0..=1.0).contains(&self.models.nms_threshold) {
            return invalid("models.nms_threshold must be within [0, 1]");
        }
        if self.models.intra_threads == 0 {
            return invalid("models.intra_threads must be > 0");
        }
        if self.pipeline.top_k == 0 || self.pipeline.top_k > 100 {
            return invalid("pipeline.top_k must be between 1 and 100");
        }
        if self.pipeline.product_categories.is_empty() {
            return invalid("pipeline.product_categories cannot be empty");
        }
        if self.pipeline.max_frames == 0 || self.pipeline.max_frames > 1000 {
            return invalid("pipeline.max_frames must be between 1 and 1000");
        }
        if !self.pipeline.sample_fps.is_finite()
            || self.pipeline.sample_fps <= 0.0
            || self.pipeline.sample_fps > 60.0
        {
            return invalid("pipeline.sample_fps must be within (0, 60]");
        }
        if self.pipeline.fetch_timeout_secs == 0 {
            return invalid("pipeline.fetch_timeout_secs must be > 0");
        }
        if self.pipeline.jpeg_quality == 0 || self.pipeline.jpeg_quality > 100 {
            return invalid("pipeline.jpeg_quality must be between 1 and 100");
        }
        if self.catalog.embedding_dim == 0 {
            return invalid("catalog.embedding_dim must be > 0");
        }

        Ok(())
    }
}
