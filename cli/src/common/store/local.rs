//! # Local Filesystem Object Store (`common::store::local`)
//!
//! File: cli/src/common/store/local.rs
//!
//! ## Overview
//!
//! `LocalStore` maps the object store contract onto a directory tree:
//!
//! ```text
//! <root>/
//!   sample-bucket/        <- collection
//!     a.txt               <- object "a.txt"
//!     logs/2024/01.log    <- object "logs/2024/01.log"
//! ```
//!
//! Listing walks the collection lazily with `walkdir`, sorted by file name.
//! New objects are written to a `tempfile::NamedTempFile` in the store root,
//! outside every collection, and renamed into place on commit. An in-progress
//! archive therefore never shows up in a listing, and an abandoned one is
//! deleted when its sink is dropped.
//!
use super::{ObjectAttrs, ObjectDescriptor, ObjectIter, ObjectSink, ObjectStore};
use chrono::{DateTime, Utc};
use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Component, Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, trace};
use walkdir::{DirEntry, WalkDir};

/// Object store backed by a local directory.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn collection_dir(&self, collection: &str) -> io::Result<PathBuf> {
        check_relative(collection, "collection")?;
        Ok(self.root.join(collection))
    }

    fn object_path(&self, collection: &str, name: &str) -> io::Result<PathBuf> {
        check_relative(name, "object")?;
        Ok(self.collection_dir(collection)?.join(name))
    }
}

/// Rejects names that are empty or would escape their parent directory.
fn check_relative(name: &str, what: &str) -> io::Result<()> {
    let path = Path::new(name);
    let plain = !name.is_empty()
        && path
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
    if plain {
        Ok(())
    } else {
        Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid {what} name '{name}'"),
        ))
    }
}

/// Builds the descriptor of a listed file; its name is the `/`-joined path
/// relative to the collection directory.
fn describe(collection_dir: &Path, entry: &DirEntry) -> io::Result<ObjectDescriptor> {
    let relative = entry
        .path()
        .strip_prefix(collection_dir)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    // Names must round-trip through `open`, so non-UTF-8 paths are a listing error.
    let name = relative
        .components()
        .map(|c| {
            c.as_os_str().to_str().ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("object path {} is not valid UTF-8", entry.path().display()),
                )
            })
        })
        .collect::<io::Result<Vec<_>>>()?
        .join("/");
    let metadata = entry.metadata().map_err(io::Error::from)?;
    Ok(ObjectDescriptor {
        name,
        size: metadata.len(),
        last_modified: DateTime::<Utc>::from(metadata.modified()?),
    })
}

impl ObjectStore for LocalStore {
    fn list(&self, collection: &str) -> io::Result<ObjectIter<'_>> {
        let dir = self.collection_dir(collection)?;
        if !dir.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("collection directory {} does not exist", dir.display()),
            ));
        }
        debug!("Listing objects under {}", dir.display());
        let walker = WalkDir::new(&dir).min_depth(1).sort_by_file_name();
        let objects = walker.into_iter().filter_map(move |entry| match entry {
            Ok(entry) if entry.file_type().is_file() => Some(describe(&dir, &entry)),
            Ok(_) => None,
            Err(err) => Some(Err(io::Error::from(err))),
        });
        Ok(Box::new(objects))
    }

    fn open(&self, collection: &str, name: &str) -> io::Result<Box<dyn Read + '_>> {
        let path = self.object_path(collection, name)?;
        trace!("Opening {}", path.display());
        Ok(Box::new(File::open(path)?))
    }

    fn stat(&self, collection: &str, name: &str) -> io::Result<ObjectAttrs> {
        let metadata = fs::metadata(self.object_path(collection, name)?)?;
        if !metadata.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("object '{name}' is not a regular file"),
            ));
        }
        Ok(ObjectAttrs {
            size: metadata.len(),
            modified: DateTime::<Utc>::from(metadata.modified()?),
        })
    }

    fn create(&self, collection: &str, name: &str) -> io::Result<Box<dyn ObjectSink + '_>> {
        let target = self.object_path(collection, name)?;
        let file = tempfile::Builder::new()
            .prefix(".bucketzip-")
            .suffix(".partial")
            .tempfile_in(&self.root)?;
        debug!(
            "Writing {} through {}",
            target.display(),
            file.path().display()
        );
        Ok(Box::new(LocalSink { file, target }))
    }
}

/// Uncommitted object; the temp file is removed if this is dropped.
struct LocalSink {
    file: NamedTempFile,
    target: PathBuf,
}

impl Write for LocalSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl Seek for LocalSink {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file.seek(pos)
    }
}

impl ObjectSink for LocalSink {
    fn commit(self: Box<Self>) -> io::Result<()> {
        let LocalSink { mut file, target } = *self;
        file.flush()?;
        file.as_file().sync_all()?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        file.persist(&target).map_err(|e| e.error)?;
        debug!("Committed {}", target.display());
        Ok(())
    }
}
