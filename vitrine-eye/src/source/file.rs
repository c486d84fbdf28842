//! Local media: a single image file or a directory of frames

use super::sampling::sample_indices;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;
use vitrine_core::{FetchError, Frame, FrameSource};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "gif", "webp"];

/// Frame source over the local filesystem. The "URL" is a path, optionally
/// prefixed with `file://`. Directories are read in file-name order and
/// evenly sampled down to `max_frames`.
#[derive(Debug, Clone)]
pub struct FileFrameSource {
    root: Option<PathBuf>,
    max_frames: usize,
}

impl FileFrameSource {
    pub fn new(max_frames: usize) -> Self {
        Self {
            root: None,
            max_frames,
        }
    }

    /// Resolve relative paths against `root`.
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    fn resolve(&self, url: &str) -> PathBuf {
        let path = Path::new(url.strip_prefix("file://").unwrap_or(url));
        match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

#[async_trait]
impl FrameSource for FileFrameSource {
    async fn fetch_frames(&self, url: &str) -> Result<Vec<Frame>, FetchError> {
        let path = self.resolve(url);
        let metadata = tokio::fs::metadata(&path).await?;

        if metadata.is_file() {
            if !is_image(&path) {
                return Err(FetchError::UnsupportedMedia(format!("{:?} is not an image", path)));
            }
            let bytes = tokio::fs::read(&path).await?;
            return Ok(vec![Frame::encoded(0, bytes)]);
        }

        let mut files = Vec::new();
        let mut entries = tokio::fs::read_dir(&path).await?;
        while let Some(entry) = entries.next_entry().await? {
            let file = entry.path();
            if is_image(&file) {
                files.push(file);
            }
        }
        files.sort();

        let picks = sample_indices(files.len(), self.max_frames);
        debug!("Sampling {} of {} frames from {:?}", picks.len(), files.len(), path);

        let mut frames = Vec::with_capacity(picks.len());
        for (index, pick) in picks.into_iter().enumerate() {
            let bytes = tokio::fs::read(&files[pick]).await?;
            frames.push(Frame::encoded(index, bytes));
        }
        Ok(frames)
    }
}
