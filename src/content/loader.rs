//! Content loader - turns every content file in a source into a post

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use super::frontmatter::FrontMatterError;
use super::post::identifier_for;
use super::render::RenderError;
use super::{ContentSource, FrontMatter, Post, Render};

/// Why a single content file could not become a post
#[derive(Error, Debug)]
pub enum PostError {
    #[error("failed to read file: {0}")]
    Read(#[from] io::Error),

    #[error("file is not valid UTF-8")]
    Encoding(#[from] std::string::FromUtf8Error),

    #[error("cannot derive an identifier from the file name")]
    Identifier,

    #[error(transparent)]
    FrontMatter(#[from] FrontMatterError),

    #[error(transparent)]
    Render(#[from] RenderError),
}

/// The content root itself could not be enumerated
#[derive(Error, Debug)]
#[error("failed to read content root {location}: {source}")]
pub struct LoadError {
    pub location: String,
    #[source]
    pub source: io::Error,
}

/// A content file that was left out of the corpus
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedPost {
    pub path: PathBuf,
    pub reason: String,
}

/// Outcome of loading a content root: the posts that loaded, in discovery
/// order, and the files that were skipped.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub posts: Vec<Post>,
    pub skipped: Vec<SkippedPost>,
}

/// Produces the full, unordered set of posts for the cache
pub trait PostLoader: Send + Sync {
    fn load(&self) -> Result<LoadReport, LoadError>;
}

/// Loads posts from a content source, rendering each body once.
///
/// A file that fails to load is logged and skipped; only an unreadable
/// content root fails the whole load.
pub struct ContentLoader {
    source: Box<dyn ContentSource>,
    renderer: Arc<dyn Render>,
}

impl ContentLoader {
    /// Create a new content loader
    pub fn new<S>(source: S, renderer: Arc<dyn Render>) -> Self
    where
        S: ContentSource + 'static,
    {
        Self {
            source: Box::new(source),
            renderer,
        }
    }

    /// Load a single post from a file
    fn load_post(&self, path: &Path) -> Result<Post, PostError> {
        let id = identifier_for(path).ok_or(PostError::Identifier)?;
        let raw = String::from_utf8(self.source.read(path)?)?;
        let (fm, body) = FrontMatter::parse(&raw)?;
        let content = self.renderer.render(body)?;

        Ok(Post::new(id, fm, content, path.to_path_buf()))
    }
}

impl PostLoader for ContentLoader {
    fn load(&self) -> Result<LoadReport, LoadError> {
        let location = self.source.describe();
        let files = self.source.list().map_err(|source| LoadError {
            location: location.clone(),
            source,
        })?;

        let mut report = LoadReport::default();

        for path in files {
            match self.load_post(&path) {
                Ok(post) => {
                    tracing::debug!("Loaded post {} from {:?}", post.id, path);
                    report.posts.push(post);
                }
                Err(e) => {
                    tracing::warn!("Skipping post {:?}: {}", path, e);
                    report.skipped.push(SkippedPost {
                        path,
                        reason: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            "Loaded {} posts from {} ({} skipped)",
            report.posts.len(),
            location,
            report.skipped.len()
        );

        Ok(report)
    }
}
