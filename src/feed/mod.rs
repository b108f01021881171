//! RSS 2.0 feed generation
//!
//! The feed is built once from the final, sorted post list and cached as an
//! [`Artifact`] next to the posts.

use chrono::{DateTime, FixedOffset, Utc};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::Artifact;
use crate::content::Post;

/// RFC 1123 with a numeric zone, e.g. `Mon, 02 Jan 2006 15:04:05 -0700`
pub const DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %z";

/// Characters escaped when an identifier becomes a URL path segment
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Feed settings, fixed before the cache is initialized
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Absolute URL posts live under, e.g. `https://example.com/reflections`
    pub base_url: String,
    pub title: String,
    pub description: String,
    /// Channel language tag
    pub language: String,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FeedError {
    #[error("failed to encode rss feed: {0}")]
    Encode(String),
}

/// Join a base URL and a path with exactly one `/` between them
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Percent-encode an identifier for use as one URL path segment
pub fn path_segment(id: &str) -> String {
    utf8_percent_encode(id, SEGMENT).to_string()
}

/// Absolute link of a post
pub fn post_link(config: &FeedConfig, id: &str) -> String {
    join_url(&config.base_url, &path_segment(id))
}

/// Newest publication timestamp, or `now` when there are no posts
pub fn last_build_date(posts: &[Post], now: DateTime<Utc>) -> DateTime<FixedOffset> {
    posts
        .iter()
        .map(|p| p.published_at)
        .max()
        .unwrap_or_else(|| now.fixed_offset())
}

/// Generate the feed artifact for the given, already ordered, posts
pub fn generate(posts: &[Post], config: &FeedConfig) -> Result<Artifact, FeedError> {
    let xml = render(posts, config, Utc::now())?;
    tracing::info!("Generated rss feed with {} items", posts.len());
    Ok(Artifact::rss(xml))
}

/// Render the feed document. Identical inputs produce identical bytes.
pub fn render(
    posts: &[Post],
    config: &FeedConfig,
    now: DateTime<Utc>,
) -> Result<Vec<u8>, FeedError> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    write(
        &mut writer,
        Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)),
    )?;

    let mut rss = BytesStart::new("rss");
    rss.push_attribute(("version", "2.0"));
    write(&mut writer, Event::Start(rss))?;
    write(&mut writer, Event::Start(BytesStart::new("channel")))?;

    text_element(&mut writer, "title", &config.title)?;
    text_element(&mut writer, "link", &config.base_url)?;
    text_element(&mut writer, "description", &config.description)?;
    text_element(&mut writer, "language", &config.language)?;
    text_element(
        &mut writer,
        "lastBuildDate",
        &last_build_date(posts, now).format(DATE_FORMAT).to_string(),
    )?;

    for post in posts {
        let link = post_link(config, &post.id);

        write(&mut writer, Event::Start(BytesStart::new("item")))?;
        text_element(&mut writer, "title", &post.title)?;
        text_element(&mut writer, "link", &link)?;
        text_element(&mut writer, "description", &post.excerpt)?;
        text_element(
            &mut writer,
            "pubDate",
            &post.published_at.format(DATE_FORMAT).to_string(),
        )?;
        text_element(&mut writer, "guid", &link)?;
        write(&mut writer, Event::End(BytesEnd::new("item")))?;
    }

    write(&mut writer, Event::End(BytesEnd::new("channel")))?;
    write(&mut writer, Event::End(BytesEnd::new("rss")))?;

    let mut xml = writer.into_inner();
    xml.push(b'\n');
    Ok(xml)
}

fn write(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<(), FeedError> {
    writer
        .write_event(event)
        .map_err(|e| FeedError::Encode(e.to_string()))
}

fn text_element(writer: &mut Writer<Vec<u8>>, name: &str, text: &str) -> Result<(), FeedError> {
    write(writer, Event::Start(BytesStart::new(name)))?;
    write(writer, Event::Text(BytesText::new(text)))?;
    write(writer, Event::End(BytesEnd::new(name)))
}
