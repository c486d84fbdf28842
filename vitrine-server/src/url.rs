//! Instagram URL normalization and validation

use regex::Regex;
use vitrine_core::PipelineError;

const INVALID_URL: &str = "URL must be an Instagram reel or post URL";

/// Checks URLs against the accepted Instagram post and reel shapes.
#[derive(Debug, Clone)]
pub struct UrlPolicy {
    accepted: Regex,
}

impl UrlPolicy {
    pub fn new() -> Result<Self, regex::Error> {
        let accepted =
            Regex::new(r"^https?://(www\.)?instagram\.com/(reel|reels|p)/[A-Za-z0-9_-]+/?$")?;
        Ok(Self { accepted })
    }

    /// Reject anything that is not a post or reel URL after normalization.
    pub fn validate(&self, url: &str) -> Result<(), PipelineError> {
        if self.accepted.is_match(url) {
            Ok(())
        } else {
            Err(PipelineError::InvalidInput(INVALID_URL.to_string()))
        }
    }

    /// Normalize then validate, returning the URL to fetch.
    pub fn check(&self, url: &str) -> Result<String, PipelineError> {
        let normalized = normalize_url(url);
        self.validate(&normalized)?;
        Ok(normalized)
    }
}

/// Trim whitespace, drop query and fragment, and rewrite
/// `.../share/reel/<id>` links to the canonical reel URL.
pub fn normalize_url(url: &str) -> String {
    let url = url.trim();
    let url = url.split(|c: char| c == '?' || c == '#').next().unwrap_or(url);

    if let Some((_, rest)) = url.split_once("/share/reel/") {
        let reel_id = rest.split('/').next().unwrap_or(rest);
        if !reel_id.is_empty() {
            return format!("https://www.instagram.com/reel/{}/", reel_id);
        }
    }

    url.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_share_url_becomes_reel_url() {
        assert_eq!(
            normalize_url("https://www.instagram.com/share/reel/BAB1xYz9_/"),
            "https://www.instagram.com/reel/BAB1xYz9_/"
        );
        assert_eq!(
            normalize_url("  https://instagram.com/share/reel/abc?igsh=xyz  "),
            "https://www.instagram.com/reel/abc/"
        );
    }

    #[test]
    fn test_normalize_drops_query_and_fragment() {
        assert_eq!(
            normalize_url("https://www.instagram.com/p/C0de/?img_index=1#top"),
            "https://www.instagram.com/p/C0de/"
        );
        assert_eq!(normalize_url("https://example.com/x"), "https://example.com/x");
    }

    #[test]
    fn test_validate_accepts_posts_and_reels() {
        let policy = UrlPolicy::new().unwrap();
        for url in [
            "https://www.instagram.com/reel/ABC123/",
            "http://www.instagram.com/reel/ABC123/",
            "https://www.instagram.com/p/ABC123/",
            "https://www.instagram.com/reels/DKTyUyGKeig/",
            "https://instagram.com/p/ABC-123_x",
        ] {
            assert!(policy.validate(url).is_ok(), "{}", url);
        }
    }

    #[test]
    fn test_validate_rejects_other_urls() {
        let policy = UrlPolicy::new().unwrap();
        for url in [
            "",
            "not a url",
            "https://www.instagram.com/",
            "https://www.instagram.com/someuser/",
            "https://www.instagram.com/reel/",
            "https://evil.com/instagram.com/reel/ABC/",
            "https://www.instagram.com.evil.com/reel/ABC/",
            "ftp://www.instagram.com/reel/ABC/",
        ] {
            let err = policy.validate(url).unwrap_err();
            assert_eq!(err.status_code(), 400, "{}", url);
        }
    }

    #[test]
    fn test_check_normalizes_first() {
        let policy = UrlPolicy::new().unwrap();
        assert_eq!(
            policy
                .check("https://www.instagram.com/share/reel/XyZ/?utm_source=ig")
                .unwrap(),
            "https://www.instagram.com/reel/XyZ/"
        );
    }
}
