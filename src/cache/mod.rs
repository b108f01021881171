//! In-memory post cache
//!
//! The cache is filled exactly once: the loader runs, posts are sorted
//! newest first and indexed by identifier, every post page is rendered and
//! compressed, and the feed is built from the final order. After that the
//! state is frozen and read without locking.

pub mod artifact;

use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use thiserror::Error;

pub use artifact::Artifact;

use crate::content::{LoadError, Post, PostLoader, SkippedPost};
use crate::feed::{self, FeedConfig};
use crate::templates;

/// Errors that leave the cache permanently unusable
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CacheError {
    #[error("{0}")]
    ContentRoot(String),

    #[error("duplicate post identifier `{0}`")]
    DuplicateIdentifier(String),

    #[error("cache initialization did not finish within {0:?}")]
    Timeout(Duration),

    #[error("cache initialization aborted: {0}")]
    Aborted(String),
}

impl From<LoadError> for CacheError {
    fn from(err: LoadError) -> Self {
        CacheError::ContentRoot(err.to_string())
    }
}

/// Lifecycle of a [`PostCache`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    Initializing,
    Ready,
    Failed,
}

impl Phase {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Phase::Initializing,
            2 => Phase::Ready,
            3 => Phase::Failed,
            _ => Phase::Uninitialized,
        }
    }
}

/// A post together with its pre-rendered page
#[derive(Debug, Clone)]
pub struct CachedPost {
    pub post: Post,
    pub page: Artifact,
}

/// Frozen state of a ready cache
#[derive(Debug)]
struct Snapshot {
    posts: Vec<Post>,
    by_id: HashMap<String, CachedPost>,
    feed: Option<Artifact>,
    skipped: Vec<SkippedPost>,
}

/// The process-wide post store, shared by reference with request handlers
pub struct PostCache {
    loader: Arc<dyn PostLoader>,
    feed_config: FeedConfig,
    phase: AtomicU8,
    state: OnceLock<Result<Snapshot, CacheError>>,
}

impl PostCache {
    /// Create an empty cache; nothing is loaded until [`PostCache::initialize`]
    pub fn new(loader: Arc<dyn PostLoader>, feed_config: FeedConfig) -> Self {
        Self {
            loader,
            feed_config,
            phase: AtomicU8::new(Phase::Uninitialized as u8),
            state: OnceLock::new(),
        }
    }

    /// Load, sort and index all posts, then build the feed.
    ///
    /// Only the first call does any work. Concurrent callers block until it
    /// finishes and then all see the same result. A panic while loading is
    /// recorded as a terminal [`CacheError::Aborted`].
    pub fn initialize(&self) -> Result<(), CacheError> {
        let state = self.state.get_or_init(|| {
            self.phase.store(Phase::Initializing as u8, Ordering::Release);

            let result = panic::catch_unwind(AssertUnwindSafe(|| self.build()))
                .unwrap_or_else(|payload| Err(CacheError::Aborted(panic_message(&*payload))));
            let phase = match &result {
                Ok(snapshot) => {
                    tracing::info!(
                        "Post cache ready: {} posts, {} skipped, feed {}",
                        snapshot.posts.len(),
                        snapshot.skipped.len(),
                        if snapshot.feed.is_some() {
                            "available"
                        } else {
                            "unavailable"
                        }
                    );
                    Phase::Ready
                }
                Err(e) => {
                    tracing::error!("Post cache initialization failed: {}", e);
                    Phase::Failed
                }
            };
            self.phase.store(phase as u8, Ordering::Release);

            result
        });

        state.as_ref().map(|_| ()).map_err(|e| e.clone())
    }

    /// Run [`PostCache::initialize`] on the blocking pool, giving up after `limit`.
    ///
    /// A timeout does not cancel the load; it keeps running and its result
    /// is what later callers observe.
    pub async fn initialize_within(self: &Arc<Self>, limit: Duration) -> Result<(), CacheError> {
        let cache = Arc::clone(self);
        let task = tokio::task::spawn_blocking(move || cache.initialize());

        match tokio::time::timeout(limit, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(CacheError::Aborted(e.to_string())),
            Err(_) => {
                tracing::error!("Post cache initialization timed out after {:?}", limit);
                Err(CacheError::Timeout(limit))
            }
        }
    }

    fn build(&self) -> Result<Snapshot, CacheError> {
        let report = self.loader.load()?;

        let mut posts = report.posts;
        posts.sort_by(Post::newest_first);

        let mut by_id = HashMap::with_capacity(posts.len());
        for post in &posts {
            if by_id.contains_key(&post.id) {
                return Err(CacheError::DuplicateIdentifier(post.id.clone()));
            }
            let page = Artifact::html(templates::post_page(post));
            by_id.insert(
                post.id.clone(),
                CachedPost {
                    post: post.clone(),
                    page,
                },
            );
        }

        let feed = match feed::generate(&posts, &self.feed_config) {
            Ok(feed) => Some(feed),
            Err(e) => {
                tracing::warn!("RSS feed unavailable: {}", e);
                None
            }
        };

        Ok(Snapshot {
            posts,
            by_id,
            feed,
            skipped: report.skipped,
        })
    }

    fn snapshot(&self) -> Option<&Snapshot> {
        self.state.get().and_then(|state| state.as_ref().ok())
    }

    /// Where the cache is in its lifecycle
    pub fn phase(&self) -> Phase {
        Phase::from_u8(self.phase.load(Ordering::Acquire))
    }

    /// The initialization error, if initialization failed
    pub fn error(&self) -> Option<&CacheError> {
        self.state.get().and_then(|state| state.as_ref().err())
    }

    /// All posts, newest first. Empty until the cache is ready.
    pub fn all_posts(&self) -> &[Post] {
        self.snapshot().map(|s| s.posts.as_slice()).unwrap_or(&[])
    }

    /// Look up a post by identifier
    pub fn post_by_identifier(&self, id: &str) -> Option<&CachedPost> {
        self.snapshot().and_then(|s| s.by_id.get(id))
    }

    /// The feed, if the cache is ready and the feed could be generated
    pub fn feed(&self) -> Option<&Artifact> {
        self.snapshot().and_then(|s| s.feed.as_ref())
    }

    /// Content files left out of the corpus during loading
    pub fn skipped(&self) -> &[SkippedPost] {
        self.snapshot().map(|s| s.skipped.as_slice()).unwrap_or(&[])
    }

    pub fn feed_config(&self) -> &FeedConfig {
        &self.feed_config
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "loader panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compress;
    use crate::content::{ContentLoader, DirectorySource, LoadReport, Render, RenderError};
    use chrono::DateTime;
    use std::fs;
    use std::io;
    use std::path::PathBuf;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    fn feed_config() -> FeedConfig {
        FeedConfig {
            base_url: "https://example.com/reflections".to_string(),
            title: "Reflections".to_string(),
            description: "Test feed".to_string(),
            language: "en-us".to_string(),
        }
    }

    fn post(id: &str, at: &str) -> Post {
        Post {
            id: id.to_string(),
            title: format!("Title {}", id),
            author: "Jordan".to_string(),
            published_at: DateTime::parse_from_rfc3339(at).unwrap(),
            tags: Vec::new(),
            excerpt: format!("Excerpt {}", id),
            content: format!("<p>body {}</p>", id),
            source: PathBuf::from(format!("{}.md", id)),
        }
    }

    /// Returns fixed posts and counts how often it was asked
    struct CountingLoader {
        posts: Vec<Post>,
        calls: AtomicUsize,
        delay: Duration,
    }

    impl CountingLoader {
        fn new(posts: Vec<Post>) -> Self {
            Self {
                posts,
                calls: AtomicUsize::new(0),
                delay: Duration::ZERO,
            }
        }
    }

    impl PostLoader for CountingLoader {
        fn load(&self) -> Result<LoadReport, LoadError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            thread::sleep(self.delay);
            Ok(LoadReport {
                posts: self.posts.clone(),
                skipped: Vec::new(),
            })
        }
    }

    struct FailingLoader;

    impl PostLoader for FailingLoader {
        fn load(&self) -> Result<LoadReport, LoadError> {
            Err(LoadError {
                location: "content/reflections".to_string(),
                source: io::Error::new(io::ErrorKind::NotFound, "no such directory"),
            })
        }
    }

    #[test]
    fn test_empty_before_initialize() {
        let cache = PostCache::new(
            Arc::new(CountingLoader::new(vec![post("a", "2024-01-01T00:00:00Z")])),
            feed_config(),
        );
        assert_eq!(cache.phase(), Phase::Uninitialized);
        assert!(cache.all_posts().is_empty());
        assert!(cache.post_by_identifier("a").is_none());
        assert!(cache.feed().is_none());
    }

    #[test]
    fn test_posts_are_sorted_newest_first() {
        let loader = CountingLoader::new(vec![
            post("middle", "2024-03-01T00:00:00Z"),
            post("oldest", "2023-01-01T00:00:00Z"),
            post("newest", "2024-09-01T00:00:00Z"),
        ]);
        let cache = PostCache::new(Arc::new(loader), feed_config());
        cache.initialize().unwrap();

        assert_eq!(cache.phase(), Phase::Ready);
        let ids: Vec<_> = cache.all_posts().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["newest", "middle", "oldest"]);
        for pair in cache.all_posts().windows(2) {
            assert!(pair[0].published_at > pair[1].published_at);
        }
    }

    #[test]
    fn test_lookup_by_identifier() {
        let loader = CountingLoader::new(vec![
            post("first", "2024-01-01T00:00:00Z"),
            post("second", "2024-02-01T00:00:00Z"),
        ]);
        let cache = PostCache::new(Arc::new(loader), feed_config());
        cache.initialize().unwrap();

        for id in ["first", "second"] {
            let cached = cache.post_by_identifier(id).unwrap();
            assert_eq!(cached.post.id, id);

            let page = cached.page.raw_bytes();
            let html = std::str::from_utf8(page).unwrap();
            assert!(html.contains(&format!("<p>body {}</p>", id)));

            let compressed = cached.page.compressed_bytes().unwrap();
            assert_eq!(&compress::decompress(compressed).unwrap()[..], &page[..]);
        }
        assert!(cache.post_by_identifier("never-loaded").is_none());
    }

    #[test]
    fn test_concurrent_initialize_loads_once() {
        let mut loader = CountingLoader::new(vec![
            post("a", "2024-01-01T00:00:00Z"),
            post("b", "2024-01-02T00:00:00Z"),
        ]);
        loader.delay = Duration::from_millis(50);
        let loader = Arc::new(loader);
        let cache = PostCache::new(loader.clone(), feed_config());

        let observed: Vec<Vec<String>> = thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    scope.spawn(|| {
                        cache.initialize().unwrap();
                        cache
                            .all_posts()
                            .iter()
                            .map(|p| p.id.clone())
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(loader.calls.load(Ordering::SeqCst), 1);
        for ids in &observed {
            assert_eq!(ids, &vec!["b".to_string(), "a".to_string()]);
        }

        // Later calls stay no-ops
        cache.initialize().unwrap();
        assert_eq!(loader.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_duplicate_identifier_fails_initialization() {
        let loader = CountingLoader::new(vec![
            post("same", "2024-01-01T00:00:00Z"),
            post("same", "2024-02-01T00:00:00Z"),
        ]);
        let cache = PostCache::new(Arc::new(loader), feed_config());

        let err = cache.initialize().unwrap_err();
        assert_eq!(err, CacheError::DuplicateIdentifier("same".to_string()));
        assert_eq!(cache.phase(), Phase::Failed);
        assert_eq!(cache.error(), Some(&err));
        assert!(cache.all_posts().is_empty());
        assert!(cache.feed().is_none());

        // The failure is terminal
        assert_eq!(cache.initialize().unwrap_err(), err);
    }

    /// Panics the first time it is asked to load
    struct PanickingLoader {
        calls: AtomicUsize,
    }

    impl PostLoader for PanickingLoader {
        fn load(&self) -> Result<LoadReport, LoadError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("renderer blew up");
            }
            Ok(LoadReport::default())
        }
    }

    #[test]
    fn test_panicking_load_is_terminal_failure() {
        let loader = Arc::new(PanickingLoader {
            calls: AtomicUsize::new(0),
        });
        let cache = PostCache::new(loader.clone(), feed_config());

        let err = cache.initialize().unwrap_err();
        assert_eq!(err, CacheError::Aborted("renderer blew up".to_string()));
        assert_eq!(cache.phase(), Phase::Failed);

        // The load is never retried
        assert_eq!(cache.initialize().unwrap_err(), err);
        assert_eq!(cache.phase(), Phase::Failed);
        assert_eq!(loader.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_panicking_load_within_timeout() {
        let loader = Arc::new(PanickingLoader {
            calls: AtomicUsize::new(0),
        });
        let cache = Arc::new(PostCache::new(loader.clone(), feed_config()));

        let err = cache
            .initialize_within(Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::Aborted(_)));
        assert_eq!(cache.phase(), Phase::Failed);

        assert!(cache.initialize().is_err());
        assert_eq!(loader.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unreadable_root_is_terminal_failure() {
        let cache = PostCache::new(Arc::new(FailingLoader), feed_config());
        let err = cache.initialize().unwrap_err();
        assert!(matches!(err, CacheError::ContentRoot(_)));
        assert!(err.to_string().contains("content/reflections"));
        assert_eq!(cache.phase(), Phase::Failed);
    }

    #[test]
    fn test_feed_follows_final_order() {
        let loader = CountingLoader::new(vec![
            post("older", "2024-01-01T00:00:00Z"),
            post("newer", "2024-06-01T00:00:00Z"),
        ]);
        let cache = PostCache::new(Arc::new(loader), feed_config());
        cache.initialize().unwrap();

        let feed = cache.feed().unwrap();
        let xml = std::str::from_utf8(feed.raw_bytes()).unwrap();
        let newer = xml.find("https://example.com/reflections/newer").unwrap();
        let older = xml.find("https://example.com/reflections/older").unwrap();
        assert!(newer < older);
        assert_eq!(xml.matches("<item>").count(), 2);
    }

    #[test]
    fn test_empty_corpus() {
        let dir = tempfile::tempdir().unwrap();
        let renderer: Arc<dyn Render> = Arc::new(|b: &str| Ok::<_, RenderError>(b.to_string()));
        let loader = ContentLoader::new(DirectorySource::new(dir.path()), renderer);
        let cache = PostCache::new(Arc::new(loader), feed_config());

        let before = chrono::Utc::now();
        cache.initialize().unwrap();

        assert!(cache.all_posts().is_empty());
        assert!(cache.post_by_identifier("anything").is_none());

        let xml = std::str::from_utf8(cache.feed().unwrap().raw_bytes()).unwrap();
        assert!(!xml.contains("<item>"));
        let start = xml.find("<lastBuildDate>").unwrap() + "<lastBuildDate>".len();
        let end = xml.find("</lastBuildDate>").unwrap();
        let built = DateTime::parse_from_str(&xml[start..end], feed::DATE_FORMAT).unwrap();
        // Formatting drops sub-second precision
        assert!(built.timestamp() >= before.timestamp());
    }

    #[test]
    fn test_malformed_file_is_skipped_and_reported() {
        let dir = tempfile::tempdir().unwrap();
        for (name, date) in [("one.md", "2024-01-01"), ("two.md", "2024-01-02")] {
            fs::write(
                dir.path().join(name),
                format!("---\ntitle: {}\npublished_at: {}\n---\nbody\n", name, date),
            )
            .unwrap();
        }
        fs::write(dir.path().join("broken.md"), "no front matter").unwrap();

        let renderer: Arc<dyn Render> = Arc::new(|b: &str| Ok::<_, RenderError>(b.to_string()));
        let loader = ContentLoader::new(DirectorySource::new(dir.path()), renderer);
        let cache = PostCache::new(Arc::new(loader), feed_config());
        cache.initialize().unwrap();

        assert_eq!(cache.phase(), Phase::Ready);
        let ids: Vec<_> = cache.all_posts().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["two", "one"]);
        assert!(cache.post_by_identifier("broken").is_none());
        assert_eq!(cache.skipped().len(), 1);
        assert!(cache.skipped()[0].path.ends_with("broken.md"));
    }

    #[tokio::test]
    async fn test_initialize_within_limit() {
        let cache = Arc::new(PostCache::new(
            Arc::new(CountingLoader::new(vec![post("a", "2024-01-01T00:00:00Z")])),
            feed_config(),
        ));
        cache
            .initialize_within(Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(cache.all_posts().len(), 1);
    }

    #[tokio::test]
    async fn test_initialize_timeout_is_reported() {
        let mut loader = CountingLoader::new(vec![post("a", "2024-01-01T00:00:00Z")]);
        loader.delay = Duration::from_millis(300);
        let cache = Arc::new(PostCache::new(Arc::new(loader), feed_config()));

        let limit = Duration::from_millis(20);
        let err = cache.initialize_within(limit).await.unwrap_err();
        assert_eq!(err, CacheError::Timeout(limit));
        assert_ne!(cache.phase(), Phase::Ready);
        assert!(cache.all_posts().is_empty());
    }
}
