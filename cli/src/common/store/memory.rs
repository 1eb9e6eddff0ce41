//! In-memory object store for unit tests.
//!
//! Objects of every collection live in one `BTreeMap` keyed by
//! `(collection, name)`, so listings come back in name order like the local
//! store. Hooks inject the failures the pipelines must cope with: a listing
//! that breaks after N objects, a listing size that is out of date with
//! respect to the stored bytes, a failing `stat`, a read stream that breaks
//! part-way, and a failing commit. Open read streams are counted so tests can
//! check that every stream is released.
use super::{ObjectAttrs, ObjectDescriptor, ObjectIter, ObjectSink, ObjectStore};
use chrono::{DateTime, TimeZone, Utc};
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};

#[derive(Debug, Clone)]
struct StoredObject {
    data: Vec<u8>,
    listed_size: Option<u64>,
    modified: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: RefCell<BTreeMap<(String, String), StoredObject>>,
    fail_listing_after: Cell<Option<usize>>,
    fail_commits: Cell<bool>,
    fail_stat: RefCell<BTreeSet<String>>,
    fail_reads: RefCell<BTreeMap<String, usize>>,
    open_readers: Cell<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, collection: &str, name: &str, data: &[u8]) {
        self.insert_object(collection, name, data, None);
    }

    /// Stores `data` but reports `listed_size` from `list`.
    pub fn insert_with_listed_size(&self, collection: &str, name: &str, data: &[u8], listed_size: u64) {
        self.insert_object(collection, name, data, Some(listed_size));
    }

    fn insert_object(&self, collection: &str, name: &str, data: &[u8], listed_size: Option<u64>) {
        let modified = Utc
            .with_ymd_and_hms(2024, 5, 17, 12, 30, 0)
            .single()
            .unwrap_or_default();
        self.objects.borrow_mut().insert(
            (collection.to_string(), name.to_string()),
            StoredObject {
                data: data.to_vec(),
                listed_size,
                modified,
            },
        );
    }

    /// Makes every later listing yield `count` objects and then an error.
    pub fn fail_listing_after(&self, count: usize) {
        self.fail_listing_after.set(Some(count));
    }

    /// Makes every later sink commit fail.
    pub fn fail_commits(&self) {
        self.fail_commits.set(true);
    }

    /// Makes `stat` fail for `name` while `open` keeps working.
    pub fn fail_stat_for(&self, name: &str) {
        self.fail_stat.borrow_mut().insert(name.to_string());
    }

    /// Makes reads of `name` fail once `after` bytes have been returned.
    pub fn fail_reads_of(&self, name: &str, after: usize) {
        self.fail_reads.borrow_mut().insert(name.to_string(), after);
    }

    /// Read streams handed out by `open` and not dropped yet.
    pub fn open_readers(&self) -> usize {
        self.open_readers.get()
    }

    pub fn get(&self, collection: &str, name: &str) -> Option<Vec<u8>> {
        self.objects
            .borrow()
            .get(&(collection.to_string(), name.to_string()))
            .map(|object| object.data.clone())
    }

    fn lookup(&self, collection: &str, name: &str) -> io::Result<StoredObject> {
        self.objects
            .borrow()
            .get(&(collection.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("object '{name}' not found in '{collection}'"),
                )
            })
    }
}

impl ObjectStore for MemoryStore {
    fn list(&self, collection: &str) -> io::Result<ObjectIter<'_>> {
        let mut listing: Vec<io::Result<ObjectDescriptor>> = self
            .objects
            .borrow()
            .iter()
            .filter(|((c, _), _)| c == collection)
            .map(|((_, name), object)| {
                Ok(ObjectDescriptor {
                    name: name.clone(),
                    size: object.listed_size.unwrap_or(object.data.len() as u64),
                    last_modified: object.modified,
                })
            })
            .collect();
        if let Some(count) = self.fail_listing_after.get() {
            listing.truncate(count);
            listing.push(Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "listing interrupted",
            )));
        }
        Ok(Box::new(listing.into_iter()))
    }

    fn open(&self, collection: &str, name: &str) -> io::Result<Box<dyn Read + '_>> {
        let object = self.lookup(collection, name)?;
        let fail_after = self.fail_reads.borrow().get(name).copied();
        self.open_readers.set(self.open_readers.get() + 1);
        Ok(Box::new(MemoryReader {
            data: Cursor::new(object.data),
            fail_after,
            open_readers: &self.open_readers,
        }))
    }

    fn stat(&self, collection: &str, name: &str) -> io::Result<ObjectAttrs> {
        if self.fail_stat.borrow().contains(name) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("stat of '{name}' denied"),
            ));
        }
        let object = self.lookup(collection, name)?;
        Ok(ObjectAttrs {
            size: object.data.len() as u64,
            modified: object.modified,
        })
    }

    fn create(&self, collection: &str, name: &str) -> io::Result<Box<dyn ObjectSink + '_>> {
        Ok(Box::new(MemorySink {
            store: self,
            collection: collection.to_string(),
            name: name.to_string(),
            buffer: Cursor::new(Vec::new()),
        }))
    }
}

struct MemoryReader<'a> {
    data: Cursor<Vec<u8>>,
    /// Bytes left before the stream breaks; `None` never breaks.
    fail_after: Option<usize>,
    open_readers: &'a Cell<usize>,
}

impl Read for MemoryReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.fail_after {
            Some(0) => Err(io::Error::new(
                io::ErrorKind::ConnectionAborted,
                "read stream broke",
            )),
            Some(left) => {
                let limit = left.min(buf.len());
                let n = self.data.read(&mut buf[..limit])?;
                self.fail_after = Some(left - n);
                if n == 0 && !buf.is_empty() {
                    // Exhausted before the break point; fail on the next call.
                    self.fail_after = Some(0);
                    return self.read(buf);
                }
                Ok(n)
            }
            None => self.data.read(buf),
        }
    }
}

impl Drop for MemoryReader<'_> {
    fn drop(&mut self) {
        self.open_readers.set(self.open_readers.get() - 1);
    }
}

struct MemorySink<'a> {
    store: &'a MemoryStore,
    collection: String,
    name: String,
    buffer: Cursor<Vec<u8>>,
}

impl Write for MemorySink<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for MemorySink<'_> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.buffer.seek(pos)
    }
}

impl ObjectSink for MemorySink<'_> {
    fn commit(self: Box<Self>) -> io::Result<()> {
        if self.store.fail_commits.get() {
            return Err(io::Error::new(io::ErrorKind::Other, "commit rejected"));
        }
        let MemorySink {
            store,
            collection,
            name,
            buffer,
        } = *self;
        store.insert(&collection, &name, &buffer.into_inner());
        Ok(())
    }
}
