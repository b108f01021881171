//! Content module - discovers, parses and renders posts

mod frontmatter;
pub mod loader;
mod markdown;
mod post;
mod render;
mod source;

pub use frontmatter::{FrontMatter, FrontMatterError};
pub use loader::{ContentLoader, LoadError, LoadReport, PostError, PostLoader, SkippedPost};
pub use markdown::{html_escape, MarkdownRenderer, HIGHLIGHT_THEME};
pub use post::{identifier_for, Post};
pub use render::{Render, RenderError};
pub use source::{
    is_content_file, ContentSource, DirectorySource, EmbeddedSource, EMBEDDED_CONTENT,
};
