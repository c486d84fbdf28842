//! Remote media over HTTP(S)

use super::video::VideoSampler;
use crate::error::VisionError;
use async_trait::async_trait;
use bytes::Bytes;
use regex::Regex;
use std::time::Duration;
use tracing::{debug, info, warn};
use vitrine_core::{FetchError, Frame, FrameSource};

const USER_AGENT: &str = concat!("Mozilla/5.0 (compatible; vitrine/", env!("CARGO_PKG_VERSION"), ")");
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// What a downloaded body turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
    Html,
    Other(String),
}

impl MediaKind {
    /// Classify from the `Content-Type` header, sniffing the body when the
    /// header is missing or generic.
    pub fn classify(content_type: Option<&str>, body: &[u8]) -> Self {
        let mime = content_type
            .and_then(|ct| ct.split(';').next())
            .map(|ct| ct.trim().to_ascii_lowercase())
            .unwrap_or_default();

        if mime.starts_with("image/") {
            return MediaKind::Image;
        }
        if mime.starts_with("video/") {
            return MediaKind::Video;
        }
        if mime == "text/html" || mime == "application/xhtml+xml" {
            return MediaKind::Html;
        }

        if image::guess_format(body).is_ok() {
            MediaKind::Image
        } else if body.len() >= 12 && &body[4..8] == b"ftyp" {
            MediaKind::Video
        } else if looks_like_html(body) {
            MediaKind::Html
        } else {
            MediaKind::Other(mime)
        }
    }
}

fn looks_like_html(body: &[u8]) -> bool {
    let head = String::from_utf8_lossy(&body[..body.len().min(512)]).to_ascii_lowercase();
    head.contains("<!doctype html") || head.contains("<html")
}

/// Finds the media a page advertises through Open Graph meta tags.
#[derive(Debug, Clone)]
pub struct OpenGraphExtractor {
    tag: Regex,
    attr: Regex,
}

impl OpenGraphExtractor {
    pub fn new() -> Result<Self, VisionError> {
        let tag = Regex::new(r"(?is)<meta\b[^>]*>")
            .map_err(|e| VisionError::Processing(format!("Invalid meta tag pattern: {}", e)))?;
        let attr = Regex::new(r#"(?i)([a-z_:-]+)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
            .map_err(|e| VisionError::Processing(format!("Invalid attribute pattern: {}", e)))?;
        Ok(Self { tag, attr })
    }

    /// Absolute media URL of the page: the first `og:video` if any, else the
    /// first `og:image`.
    pub fn extract(&self, html: &str) -> Option<String> {
        let mut image = None;

        for tag in self.tag.find_iter(html) {
            let mut property = None;
            let mut content = None;
            for cap in self.attr.captures_iter(tag.as_str()) {
                let value = cap.get(2).or_else(|| cap.get(3)).map(|m| m.as_str());
                match cap[1].to_ascii_lowercase().as_str() {
                    "property" | "name" => property = value.map(str::to_ascii_lowercase),
                    "content" => content = value,
                    _ => {}
                }
            }

            let (Some(property), Some(content)) = (property, content) else {
                continue;
            };
            let url = unescape(content.trim());
            if !(url.starts_with("https://") || url.starts_with("http://")) {
                continue;
            }

            match property.as_str() {
                "og:video" | "og:video:url" | "og:video:secure_url" => return Some(url),
                "og:image" | "og:image:url" | "og:image:secure_url" if image.is_none() => {
                    image = Some(url)
                }
                _ => {}
            }
        }

        image
    }
}

fn unescape(value: &str) -> String {
    value
        .replace("&amp;", "&")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
}

/// Frame source that downloads the URL and turns the response into frames:
/// an image is one frame, a video is sampled, a page is followed once to the
/// media it advertises.
pub struct HttpFrameSource {
    client: reqwest::Client,
    video: VideoSampler,
    extractor: OpenGraphExtractor,
    max_download_bytes: u64,
}

impl HttpFrameSource {
    pub fn new(video: VideoSampler, max_download_bytes: u64) -> Result<Self, VisionError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            video,
            extractor: OpenGraphExtractor::new()?,
            max_download_bytes,
        })
    }

    async fn download(&self, url: &str) -> Result<(MediaKind, Bytes), FetchError> {
        debug!("Downloading {}", url);
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        if let Some(length) = response.content_length() {
            if length > self.max_download_bytes {
                return Err(self.too_large());
            }
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?
        {
            body.extend_from_slice(&chunk);
            if body.len() as u64 > self.max_download_bytes {
                return Err(self.too_large());
            }
        }

        let kind = MediaKind::classify(content_type.as_deref(), &body);
        debug!("Downloaded {} bytes of {:?} from {}", body.len(), kind, url);
        Ok((kind, Bytes::from(body)))
    }

    fn too_large(&self) -> FetchError {
        FetchError::UnsupportedMedia(format!(
            "media larger than {} bytes",
            self.max_download_bytes
        ))
    }

    async fn frames_from(&self, kind: MediaKind, body: Bytes) -> Result<Vec<Frame>, FetchError> {
        match kind {
            MediaKind::Image => Ok(vec![Frame::encoded(0, body)]),
            MediaKind::Video => Ok(self.video.sample_bytes(&body).await?),
            MediaKind::Html => {
                warn!("Media URL resolved to another page, no media found");
                Ok(Vec::new())
            }
            MediaKind::Other(mime) => Err(FetchError::UnsupportedMedia(format!(
                "content type '{}'",
                mime
            ))),
        }
    }
}

#[async_trait]
impl FrameSource for HttpFrameSource {
    async fn fetch_frames(&self, url: &str) -> Result<Vec<Frame>, FetchError> {
        let (kind, body) = self.download(url).await?;

        let (kind, body) = match kind {
            MediaKind::Html => {
                let html = String::from_utf8_lossy(&body);
                match self.extractor.extract(&html) {
                    Some(media_url) => {
                        info!("Resolved page {} to media {}", url, media_url);
                        self.download(&media_url).await?
                    }
                    None => {
                        info!("Page {} advertises no media", url);
                        return Ok(Vec::new());
                    }
                }
            }
            other => (other, body),
        };

        self.frames_from(kind, body).await
    }
}
