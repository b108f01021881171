//! Post model

use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use super::FrontMatter;

/// A published post
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Post {
    /// Identifier derived from the file name; lookup key and URL slug
    pub id: String,

    /// Post title
    pub title: String,

    /// Post author
    pub author: String,

    /// Publication timestamp
    pub published_at: DateTime<FixedOffset>,

    /// Post tags, in authored order
    pub tags: Vec<String>,

    /// Short summary used in listings and the feed
    pub excerpt: String,

    /// Rendered HTML body
    pub content: String,

    /// Source file, relative to the content source
    #[serde(skip)]
    pub source: PathBuf,
}

impl Post {
    /// Assemble a post from its parsed front-matter and rendered body
    pub fn new(id: String, fm: FrontMatter, content: String, source: PathBuf) -> Self {
        Self {
            id,
            title: fm.title,
            author: fm.author,
            published_at: fm.published_at,
            tags: fm.tags,
            excerpt: fm.excerpt,
            content,
            source,
        }
    }

    /// Newest first; equal timestamps fall back to identifier order
    pub fn newest_first(a: &Post, b: &Post) -> Ordering {
        b.published_at
            .cmp(&a.published_at)
            .then_with(|| a.id.cmp(&b.id))
    }
}

/// Derive a post identifier from its file name (`hello-world.md` -> `hello-world`)
pub fn identifier_for(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
