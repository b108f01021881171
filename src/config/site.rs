//! Site configuration (_config.yml)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::feed::{join_url, FeedConfig};

/// Environment variable overriding [`SiteConfig::url`]
pub const ENV_BASE_URL: &str = "RSS_BASE_URL";
/// Environment variable overriding [`SiteConfig::port`]
pub const ENV_PORT: &str = "PORT";

/// Where posts are read from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentSourceKind {
    /// `content_dir` on disk, relative to the base directory
    #[default]
    Directory,
    /// The `content/` tree compiled into the binary
    Embedded,
}

/// Main site configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    // Site
    pub title: String,
    pub description: String,
    pub author: String,
    pub language: String,

    // URL
    pub url: String,
    pub posts_route: String,

    // Directory
    pub content_source: ContentSourceKind,
    pub content_dir: String,
    pub static_dir: String,

    // Server
    pub ip: String,
    pub port: u16,
    pub init_timeout_secs: u64,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: "reflections".to_string(),
            description: String::new(),
            author: String::new(),
            language: "en-us".to_string(),

            url: "http://localhost:9090".to_string(),
            posts_route: "reflections".to_string(),

            content_source: ContentSourceKind::Directory,
            content_dir: "content/reflections".to_string(),
            static_dir: "static".to_string(),

            ip: "0.0.0.0".to_string(),
            port: 9090,
            init_timeout_secs: 30,
        }
    }
}

impl SiteConfig {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {:?}", path))?;
        let config: SiteConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse config {:?}", path))?;
        Ok(config)
    }

    /// Apply `RSS_BASE_URL` and `PORT` from the environment
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(
            std::env::var(ENV_BASE_URL).ok(),
            std::env::var(ENV_PORT).ok(),
        )
    }

    fn apply_overrides(&mut self, url: Option<String>, port: Option<String>) -> Result<()> {
        if let Some(url) = url.filter(|u| !u.is_empty()) {
            tracing::debug!("Base URL overridden by {}: {}", ENV_BASE_URL, url);
            self.url = url;
        }
        if let Some(port) = port.filter(|p| !p.is_empty()) {
            self.port = port
                .parse()
                .with_context(|| format!("invalid {} value {:?}", ENV_PORT, port))?;
        }
        Ok(())
    }

    /// Feed settings derived from the site configuration
    pub fn feed_config(&self) -> FeedConfig {
        FeedConfig {
            base_url: join_url(&self.url, &self.posts_route)
                .trim_end_matches('/')
                .to_string(),
            title: self.title.clone(),
            description: self.description.clone(),
            language: self.language.clone(),
        }
    }

    /// `content_dir` inside the embedded `content/` tree
    pub fn embedded_content_dir(&self) -> PathBuf {
        let dir = Path::new(&self.content_dir);
        dir.strip_prefix("content").unwrap_or(dir).to_path_buf()
    }

    /// Route prefix of the post pages, e.g. `/reflections`
    pub fn posts_path(&self) -> String {
        join_url("", &self.posts_route)
            .trim_end_matches('/')
            .to_string()
    }
}
