//! capsule-rs: a content cache and pre-rendering pipeline for a personal site
//!
//! Markdown posts are loaded once at startup, rendered to HTML, compressed,
//! indexed by identifier and served from memory along with an RSS feed.

pub mod cache;
pub mod compress;
pub mod config;
pub mod content;
pub mod feed;
pub mod server;
pub mod templates;

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use cache::PostCache;
use config::ContentSourceKind;
use content::{
    ContentLoader, DirectorySource, EmbeddedSource, MarkdownRenderer, Render, EMBEDDED_CONTENT,
};

/// A site rooted at a directory holding `_config.yml`
#[derive(Debug, Clone)]
pub struct Site {
    /// Site configuration
    pub config: config::SiteConfig,
    /// Base directory
    pub base_dir: PathBuf,
    /// Markdown posts
    pub content_dir: PathBuf,
    /// Assets served under `/static`
    pub static_dir: PathBuf,
}

impl Site {
    /// Create a new site from a directory.
    ///
    /// `_config.yml` is optional; environment overrides are applied on top.
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        let config_path = base_dir.join("_config.yml");

        let mut config = if config_path.exists() {
            config::SiteConfig::load(&config_path)?
        } else {
            config::SiteConfig::default()
        };
        config.apply_env()?;

        Ok(Self::with_config(base_dir, config))
    }

    /// Create a site from an already resolved configuration
    pub fn with_config(base_dir: PathBuf, config: config::SiteConfig) -> Self {
        let content_dir = base_dir.join(&config.content_dir);
        let static_dir = base_dir.join(&config.static_dir);

        Self {
            config,
            base_dir,
            content_dir,
            static_dir,
        }
    }

    /// Build the (still empty) post cache over the configured content source
    pub fn cache(&self) -> Arc<PostCache> {
        let renderer: Arc<dyn Render> = Arc::new(MarkdownRenderer::new());
        let loader = match self.config.content_source {
            ContentSourceKind::Directory => {
                ContentLoader::new(DirectorySource::new(&self.content_dir), renderer)
            }
            ContentSourceKind::Embedded => ContentLoader::new(
                EmbeddedSource::new(&EMBEDDED_CONTENT, self.config.embedded_content_dir()),
                renderer,
            ),
        };
        Arc::new(PostCache::new(Arc::new(loader), self.config.feed_config()))
    }
}
