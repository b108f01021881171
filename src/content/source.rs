//! Read-only views over the place content files live

use include_dir::{include_dir, Dir};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A read-only filesystem view rooted at the content directory.
///
/// Listing is flat: only files directly inside the root are returned,
/// sorted by file name, and only when their extension is `md`.
pub trait ContentSource: Send + Sync {
    /// Human readable location, used in logs
    fn describe(&self) -> String;

    /// List candidate content files
    fn list(&self) -> io::Result<Vec<PathBuf>>;

    /// Read one file previously returned by [`ContentSource::list`]
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;
}

/// Check if a file is a content file
pub fn is_content_file(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("md")
}

/// Content stored in a directory on disk
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ContentSource for DirectorySource {
    fn describe(&self) -> String {
        self.root.display().to_string()
    }

    fn list(&self) -> io::Result<Vec<PathBuf>> {
        if !fs::metadata(&self.root)?.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a directory", self.root.display()),
            ));
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .sort_by_file_name()
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 => return Err(e.into()),
                // A broken entry is still listed so that reading it fails and
                // the file is reported as skipped
                Err(e) => {
                    match e.path().filter(|p| is_content_file(p)) {
                        Some(path) => files.push(path.to_path_buf()),
                        None => {
                            tracing::warn!("Ignoring unreadable entry in {:?}: {}", self.root, e)
                        }
                    }
                    continue;
                }
            };
            if entry.file_type().is_file() && is_content_file(entry.path()) {
                files.push(entry.into_path());
            }
        }

        Ok(files)
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }
}

/// The `content/` tree compiled into the binary
pub static EMBEDDED_CONTENT: Dir<'static> = include_dir!("$CARGO_MANIFEST_DIR/content");

/// Content compiled into the binary with `include_dir!`
#[derive(Debug, Clone)]
pub struct EmbeddedSource {
    dir: &'static Dir<'static>,
    root: PathBuf,
}

impl EmbeddedSource {
    /// `root` is relative to the embedded directory; empty means the top level
    pub fn new<P: AsRef<Path>>(dir: &'static Dir<'static>, root: P) -> Self {
        Self {
            dir,
            root: root.as_ref().to_path_buf(),
        }
    }

    fn root_dir(&self) -> Option<&'static Dir<'static>> {
        if self.root.as_os_str().is_empty() {
            Some(self.dir)
        } else {
            self.dir.get_dir(&self.root)
        }
    }
}

impl ContentSource for EmbeddedSource {
    fn describe(&self) -> String {
        format!("embedded:{}", self.root.display())
    }

    fn list(&self) -> io::Result<Vec<PathBuf>> {
        let root = self.root_dir().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("embedded directory {} not found", self.root.display()),
            )
        })?;

        let mut files: Vec<PathBuf> = root
            .files()
            .map(|f| f.path().to_path_buf())
            .filter(|p| is_content_file(p))
            .collect();
        files.sort();

        Ok(files)
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.dir
            .get_file(path)
            .map(|f| f.contents().to_vec())
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("embedded file {} not found", path.display()),
                )
            })
    }
}
