//! Pre-rendered payloads with an optional pre-compressed twin

use bytes::Bytes;

use crate::compress;

pub const HTML: &str = "text/html; charset=utf-8";
pub const RSS: &str = "application/rss+xml; charset=utf-8";

/// A rendered payload ready to be served.
///
/// When `compressed` is present it decompresses to exactly `raw`. A failed
/// compression leaves it empty and the payload is served uncompressed.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    raw: Bytes,
    compressed: Option<Bytes>,
    content_type: &'static str,
}

impl Artifact {
    /// Compress `raw` and wrap both forms
    pub fn new(raw: impl Into<Bytes>, content_type: &'static str) -> Self {
        let raw = raw.into();
        let compressed = match compress::compress(&raw) {
            Ok(compressed) => Some(Bytes::from(compressed)),
            Err(e) => {
                tracing::warn!("Serving {} uncompressed: {}", content_type, e);
                None
            }
        };

        Self {
            raw,
            compressed,
            content_type,
        }
    }

    /// Wrap a payload without a compressed form
    pub fn uncompressed(raw: impl Into<Bytes>, content_type: &'static str) -> Self {
        Self {
            raw: raw.into(),
            compressed: None,
            content_type,
        }
    }

    pub fn html(raw: impl Into<Bytes>) -> Self {
        Self::new(raw, HTML)
    }

    pub fn rss(raw: impl Into<Bytes>) -> Self {
        Self::new(raw, RSS)
    }

    pub fn raw_bytes(&self) -> &Bytes {
        &self.raw
    }

    pub fn compressed_bytes(&self) -> Option<&Bytes> {
        self.compressed.as_ref()
    }

    pub fn content_type(&self) -> &'static str {
        self.content_type
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compressed_form_matches_raw() {
        let page = "<html><body><p>hello</p></body></html>".repeat(20);
        let artifact = Artifact::html(page.clone());

        assert_eq!(artifact.content_type(), HTML);
        assert_eq!(artifact.raw_bytes().as_ref(), page.as_bytes());

        let compressed = artifact.compressed_bytes().unwrap();
        assert_eq!(compress::decompress(compressed).unwrap(), page.as_bytes());
    }

    #[test]
    fn test_uncompressed_artifact() {
        let artifact = Artifact::uncompressed("<rss/>", RSS);
        assert!(artifact.compressed_bytes().is_none());
        assert_eq!(artifact.raw_bytes().as_ref(), b"<rss/>");
    }
}
