//! Download tasks as handed to the scheduler

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::File;
use tokio::sync::Mutex;

/// A caller-owned read/write handle
pub type SharedFile = Arc<Mutex<File>>;

/// Where the content of a task ends up
#[derive(Clone)]
pub enum Destination {
    /// Written to `<path><temp_suffix>` and renamed into place on success
    Path(PathBuf),
    /// Written in place, no temp file and no publish step
    File(SharedFile),
}

impl Destination {
    pub fn path(&self) -> Option<&Path> {
        match self {
            Destination::Path(path) => Some(path),
            Destination::File(_) => None,
        }
    }
}

impl fmt::Debug for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Destination::File(_) => f.write_str("File(..)"),
        }
    }
}

impl From<PathBuf> for Destination {
    fn from(path: PathBuf) -> Self {
        Destination::Path(path)
    }
}

impl From<&Path> for Destination {
    fn from(path: &Path) -> Self {
        Destination::Path(path.to_path_buf())
    }
}

/// One URL to fetch; immutable once enqueued
#[derive(Debug, Clone)]
pub struct DownloadTask {
    pub id: usize,
    pub url: String,
    pub destination: Destination,
    pub label: String,
}

impl DownloadTask {
    pub fn new(
        id: usize,
        url: impl Into<String>,
        destination: impl Into<Destination>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            id,
            url: url.into(),
            destination: destination.into(),
            label: label.into(),
        }
    }
}

/// Sibling temp path: the destination with `suffix` appended to its name
pub fn temp_path(destination: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = destination.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}
