//! Video frame extraction through an external ffmpeg process

use crate::error::VisionError;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};
use vitrine_core::Frame;

/// Samples still frames out of a video file.
#[derive(Debug, Clone)]
pub struct VideoSampler {
    ffmpeg_path: PathBuf,
    sample_fps: f32,
    max_frames: usize,
}

impl VideoSampler {
    pub fn new(ffmpeg_path: impl Into<PathBuf>, sample_fps: f32, max_frames: usize) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            sample_fps,
            max_frames,
        }
    }

    /// Arguments passed to ffmpeg for one extraction run.
    pub fn ffmpeg_args(&self, input: &Path, output_pattern: &Path) -> Vec<String> {
        vec![
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-nostdin".to_string(),
            "-i".to_string(),
            input.to_string_lossy().into_owned(),
            "-vf".to_string(),
            format!("fps={}", self.sample_fps),
            "-frames:v".to_string(),
            self.max_frames.to_string(),
            output_pattern.to_string_lossy().into_owned(),
        ]
    }

    /// Extract frames from the video at `input`, in playback order.
    pub async fn sample_file(&self, input: &Path) -> Result<Vec<Frame>, VisionError> {
        if self.max_frames == 0 {
            return Ok(Vec::new());
        }

        let out_dir = tempfile::tempdir()?;
        let pattern = out_dir.path().join("frame_%05d.png");
        let args = self.ffmpeg_args(input, &pattern);
        debug!("Running {:?} {:?}", self.ffmpeg_path, args);

        let output = Command::new(&self.ffmpeg_path)
            .args(&args)
            .kill_on_drop(true)
            .output()
            .await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VisionError::Processing(format!(
                "ffmpeg exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let frames = read_frame_dir(out_dir.path(), self.max_frames).await?;
        info!("Extracted {} frames from {:?}", frames.len(), input);
        Ok(frames)
    }

    /// Extract frames from in-memory video bytes.
    pub async fn sample_bytes(&self, video: &[u8]) -> Result<Vec<Frame>, VisionError> {
        let file = tempfile::Builder::new().suffix(".mp4").tempfile()?;
        tokio::fs::write(file.path(), video).await?;
        self.sample_file(file.path()).await
    }
}

/// Load the images of `dir` in file-name order, up to `limit` of them.
async fn read_frame_dir(dir: &Path, limit: usize) -> Result<Vec<Frame>, VisionError> {
    let mut paths = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("png") {
            paths.push(path);
        }
    }
    paths.sort();
    paths.truncate(limit);

    let mut frames = Vec::with_capacity(paths.len());
    for (index, path) in paths.iter().enumerate() {
        let bytes = tokio::fs::read(path).await?;
        frames.push(Frame::encoded(index, bytes));
    }
    Ok(frames)
}
