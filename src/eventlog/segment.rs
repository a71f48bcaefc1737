//! Segment roots and name filters.
//!
//! A segment root is anything that can list entries and open one of them
//! for sequential reading: a local directory or an object store prefix.

use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::{Arc, OnceLock};
use std::task::{Context, Poll};

use async_trait::async_trait;
use parking_lot::RwLock;
use regex::Regex;
use tokio::io::{AsyncRead, ReadBuf};

/// Sequential byte stream over one segment.
pub type SegmentStream = Box<dyn AsyncRead + Send + Unpin>;

/// Location of a segment within its root.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SegmentPath {
    /// Entry name the filter is applied to.
    pub name: String,
    /// Full location, for logging and callbacks.
    pub location: String,
}

impl fmt::Display for SegmentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.location)
    }
}

/// Storage holding the segments of one logical stream.
#[async_trait]
pub trait SegmentRoot: Send + Sync {
    /// Human-readable location of the root itself.
    fn location(&self) -> String;

    /// List every entry under the root. Filtering happens in the reader.
    async fn list(&self) -> io::Result<Vec<SegmentPath>>;

    /// Open an entry for sequential reading from its start.
    async fn open(&self, path: &SegmentPath) -> io::Result<SegmentStream>;
}

/// Segments stored as files in a local directory.
#[derive(Debug, Clone)]
pub struct LocalSegmentRoot {
    dir: PathBuf,
}

impl LocalSegmentRoot {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }
}

#[async_trait]
impl SegmentRoot for LocalSegmentRoot {
    fn location(&self) -> String {
        self.dir.display().to_string()
    }

    async fn list(&self) -> io::Result<Vec<SegmentPath>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            // The writer may not have created the directory yet.
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut out = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            out.push(SegmentPath {
                location: entry.path().display().to_string(),
                name,
            });
        }
        Ok(out)
    }

    async fn open(&self, path: &SegmentPath) -> io::Result<SegmentStream> {
        let file = tokio::fs::File::open(self.dir.join(&path.name)).await?;
        Ok(Box::new(file))
    }
}

type ObjectBody = Arc<RwLock<Vec<u8>>>;

/// Segments held as named objects under a bucket prefix.
///
/// Objects can be appended to while a reader has them open, which is how a
/// synced object-storage mirror of a live log directory behaves.
#[derive(Clone, Default)]
pub struct ObjectSegmentRoot {
    prefix: String,
    objects: Arc<RwLock<BTreeMap<String, ObjectBody>>>,
}

impl ObjectSegmentRoot {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            objects: Arc::default(),
        }
    }

    /// Create or replace an object.
    pub fn put(&self, name: &str, bytes: Vec<u8>) {
        self.objects
            .write()
            .insert(name.to_string(), Arc::new(RwLock::new(bytes)));
    }

    /// Append bytes to an object, creating it if needed.
    pub fn append(&self, name: &str, bytes: &[u8]) {
        let body = self
            .objects
            .write()
            .entry(name.to_string())
            .or_default()
            .clone();
        body.write().extend_from_slice(bytes);
    }

    fn object_location(&self, name: &str) -> String {
        format!("{}/{}", self.prefix.trim_end_matches('/'), name)
    }
}

impl fmt::Debug for ObjectSegmentRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectSegmentRoot")
            .field("prefix", &self.prefix)
            .field("objects", &self.objects.read().len())
            .finish()
    }
}

#[async_trait]
impl SegmentRoot for ObjectSegmentRoot {
    fn location(&self) -> String {
        self.prefix.clone()
    }

    async fn list(&self) -> io::Result<Vec<SegmentPath>> {
        Ok(self
            .objects
            .read()
            .keys()
            .map(|name| SegmentPath {
                name: name.clone(),
                location: self.object_location(name),
            })
            .collect())
    }

    async fn open(&self, path: &SegmentPath) -> io::Result<SegmentStream> {
        let body = self.objects.read().get(&path.name).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("no object {}", path.location))
        })?;
        Ok(Box::new(ObjectReader { body, pos: 0 }))
    }
}

/// Reads an object from a position, observing later appends.
struct ObjectReader {
    body: ObjectBody,
    pos: usize,
}

impl AsyncRead for ObjectReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let body = self.body.read();
        let available = body.len().saturating_sub(self.pos);
        let n = available.min(buf.remaining());
        buf.put_slice(&body[self.pos..self.pos + n]);
        drop(body);
        self.pos += n;
        Poll::Ready(Ok(()))
    }
}

/// Selects the entries of a root that belong to one stream.
pub trait SegmentFilter: Send + Sync {
    /// Sequence number of a member segment, or `None` for foreign entries.
    fn sequence(&self, name: &str) -> Option<u64>;
}

impl<F> SegmentFilter for F
where
    F: Fn(&str) -> Option<u64> + Send + Sync,
{
    fn sequence(&self, name: &str) -> Option<u64> {
        self(name)
    }
}

/// Filter for TensorBoard event files:
/// `events.out.tfevents.<seq>.<hostname>[.<pid>.<id>]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TfEventsFilter {
    /// Entries with an earlier sequence number belong to older runs.
    pub start_time_sec: u64,
    /// Accept only files written on this host when set.
    pub hostname: Option<String>,
}

fn tfevents_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"tfevents\.(\d+)\.(.+)$").expect("tfevents pattern is valid")
    })
}

impl SegmentFilter for TfEventsFilter {
    fn sequence(&self, name: &str) -> Option<u64> {
        let caps = tfevents_pattern().captures(name)?;
        let seq: u64 = caps.get(1)?.as_str().parse().ok()?;
        if seq < self.start_time_sec {
            return None;
        }
        if let Some(host) = &self.hostname {
            let tag = caps.get(2)?.as_str();
            let matches = tag == host
                || tag
                    .strip_prefix(host.as_str())
                    .is_some_and(|rest| rest.starts_with('.'));
            if !matches {
                return None;
            }
        }
        Some(seq)
    }
}
