//! Model manager with auto-download functionality

use crate::error::VisionError;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use vitrine_core::config::ModelConfig;

const MAX_MODEL_SIZE: u64 = 2_000_000_000; // 2GB max
const MIN_MODEL_SIZE: usize = 1024;
const DOWNLOAD_TIMEOUT_SECS: u64 = 3600;

/// Locates model files and downloads the missing ones.
pub struct ModelManager {
    config: Arc<ModelConfig>,
}

impl ModelManager {
    pub fn new(config: Arc<ModelConfig>) -> Self {
        Self { config }
    }

    /// Ensure model directory exists
    pub fn ensure_model_dir(&self) -> Result<PathBuf, VisionError> {
        let model_dir = &self.config.model_dir;
        if !model_dir.exists() {
            fs::create_dir_all(model_dir)?;
            info!("Created model directory: {:?}", model_dir);
        }
        Ok(model_dir.clone())
    }

    /// Return the path of `model_name`, downloading it from `url` when it is
    /// missing and a URL is known.
    pub async fn ensure_model(
        &self,
        model_name: &str,
        url: Option<&str>,
        checksum: Option<&str>,
    ) -> Result<PathBuf, VisionError> {
        if model_name.is_empty() || model_name.len() > 255 {
            return Err(VisionError::Model("Invalid model name".to_string()));
        }
        if model_name.contains("..") || model_name.contains('/') || model_name.contains('\\') {
            return Err(VisionError::Model("Model name contains invalid characters".to_string()));
        }

        let model_path = self.config.model_dir.join(model_name);
        if model_path.exists() {
            info!("Model {} found at {:?}", model_name, model_path);
            return Ok(model_path);
        }

        let url = url.ok_or_else(|| {
            VisionError::Model(format!(
                "Model {} missing from {:?} and no download URL configured",
                model_name, self.config.model_dir
            ))
        })?;
        if url.is_empty() || url.len() > 2048 {
            return Err(VisionError::Model("Invalid URL".to_string()));
        }
        if !url.starts_with("https://") {
            return Err(VisionError::Model("Only HTTPS URLs are allowed for model downloads".to_string()));
        }

        self.ensure_model_dir()?;
        let bytes = download(url).await?;

        match checksum {
            Some(expected) if !expected.is_empty() => {
                verify_checksum(&bytes, expected)?;
                info!("Verified checksum for model {}", model_name);
            }
            _ => warn!(
                "Downloaded {} bytes for model {} (checksum verification skipped)",
                bytes.len(),
                model_name
            ),
        }

        // Write to a temp file first, then rename
        let temp_path = model_path.with_extension("tmp");
        fs::write(&temp_path, &bytes)?;
        if let Err(e) = fs::rename(&temp_path, &model_path) {
            let _ = fs::remove_file(&temp_path);
            return Err(VisionError::Io(e));
        }

        info!("Model {} saved to {:?}", model_name, model_path);
        Ok(model_path)
    }

    /// Get detector model path, downloading if needed
    pub async fn get_detector_model(&self) -> Result<PathBuf, VisionError> {
        self.ensure_model(
            &self.config.detector_file,
            self.config.detector_url.as_deref(),
            self.config.detector_sha256.as_deref(),
        )
        .await
    }

    /// Get embedder model path, downloading if needed
    pub async fn get_embedder_model(&self) -> Result<PathBuf, VisionError> {
        self.ensure_model(
            &self.config.embedder_file,
            self.config.embedder_url.as_deref(),
            self.config.embedder_sha256.as_deref(),
        )
        .await
    }
}

async fn download(url: &str) -> Result<Vec<u8>, VisionError> {
    info!("Downloading model from {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
        .build()?;
    let mut response = client.get(url).send().await?;

    if !response.status().is_success() {
        return Err(VisionError::Model(format!(
            "Failed to download model: HTTP {}",
            response.status()
        )));
    }
    if let Some(content_length) = response.content_length() {
        if content_length > MAX_MODEL_SIZE {
            return Err(VisionError::Model(format!(
                "Model too large: {} bytes (max {} bytes)",
                content_length, MAX_MODEL_SIZE
            )));
        }
    }

    let mut bytes = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        bytes.extend_from_slice(&chunk);
        if bytes.len() as u64 > MAX_MODEL_SIZE {
            return Err(VisionError::Model(format!(
                "Downloaded model too large (max {} bytes)",
                MAX_MODEL_SIZE
            )));
        }
    }

    if bytes.len() < MIN_MODEL_SIZE {
        return Err(VisionError::Model("Downloaded file too small, likely corrupted".to_string()));
    }
    Ok(bytes)
}

/// Compare the SHA-256 of `bytes` with a hex digest.
pub fn verify_checksum(bytes: &[u8], expected: &str) -> Result<(), VisionError> {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let computed = hex::encode(hasher.finalize());

    if computed.eq_ignore_ascii_case(expected.trim()) {
        Ok(())
    } else {
        Err(VisionError::Model(format!(
            "Checksum mismatch: expected {}, got {}",
            expected, computed
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn manager_in(dir: &TempDir) -> ModelManager {
        let config = ModelConfig {
            model_dir: dir.path().join("models"),
            ..ModelConfig::default()
        };
        ModelManager::new(Arc::new(config))
    }

    #[tokio::test]
    async fn test_ensure_model_dir_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let manager = manager_in(&temp_dir);

        let dir = manager.ensure_model_dir().unwrap();
        assert!(dir.exists());
        assert!(manager.ensure_model_dir().is_ok());
    }

    #[tokio::test]
    async fn test_ensure_model_invalid_name() {
        let temp_dir = TempDir::new().unwrap();
        let manager = manager_in(&temp_dir);
        let url = Some("https://example.com/model.onnx");

        assert!(manager.ensure_model("", url, None).await.is_err());
        assert!(manager.ensure_model("../evil", url, None).await.is_err());
        assert!(manager.ensure_model("model/name", url, None).await.is_err());
    }

    #[tokio::test]
    async fn test_ensure_model_invalid_url() {
        let temp_dir = TempDir::new().unwrap();
        let manager = manager_in(&temp_dir);

        assert!(manager.ensure_model("model.onnx", Some(""), None).await.is_err());
        assert!(manager
            .ensure_model("model.onnx", Some("http://example.com/model.onnx"), None)
            .await
            .is_err());
        assert!(manager.ensure_model("model.onnx", None, None).await.is_err());
    }

    #[tokio::test]
    async fn test_existing_model_is_not_downloaded() {
        let temp_dir = TempDir::new().unwrap();
        let manager = manager_in(&temp_dir);
        let dir = manager.ensure_model_dir().unwrap();
        fs::write(dir.join("yolov8x.onnx"), b"onnx").unwrap();

        let path = manager.get_detector_model().await.unwrap();
        assert_eq!(path, dir.join("yolov8x.onnx"));
    }

    #[test]
    fn test_verify_checksum() {
        // sha256("abc")
        let digest = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";
        assert!(verify_checksum(b"abc", digest).is_ok());
        assert!(verify_checksum(b"abc", &digest.to_uppercase()).is_ok());
        assert!(verify_checksum(b"abd", digest).is_err());
    }
}
