//! # bucketzip Object Store Contract (`common::store`)
//!
//! File: cli/src/common/store/mod.rs
//!
//! ## Overview
//!
//! The pipelines never talk to a concrete storage backend. They consume the
//! `ObjectStore` trait defined here, which models a generic object store with
//! list, read, stat, and write operations over named collections (buckets).
//!
//! ## Architecture
//!
//! - **`ObjectStore`**: listing returns a lazy, finite, non-restartable iterator
//!   of `ObjectDescriptor`s in backend order; each step may fail.
//! - **`ObjectSink`**: a seekable byte sink for a new object. Nothing becomes
//!   visible under the target name until `commit`; dropping the sink
//!   uncommitted discards it.
//! - **`local`**: the filesystem-backed store used by the binary.
//! - **`memory`**: an in-memory store with failure injection, used by tests.
//!
//! All operations report `std::io::Error`; the pipelines attach the step and
//! object name when they turn it into a `BucketzipError`.
//!
use chrono::{DateTime, Utc};
use std::io::{self, Read, Seek, Write};

pub mod local;
#[cfg(test)]
pub mod memory;

/// One step of a collection listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectDescriptor {
    /// Unique key of the object within its collection.
    pub name: String,
    /// Size in bytes at listing time.
    pub size: u64,
    pub last_modified: DateTime<Utc>,
}

/// Attributes returned by a dedicated metadata lookup.
///
/// These may disagree with the `ObjectDescriptor` from the listing if the
/// object changed in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectAttrs {
    pub size: u64,
    pub modified: DateTime<Utc>,
}

/// Lazy listing of a collection.
pub type ObjectIter<'a> = Box<dyn Iterator<Item = io::Result<ObjectDescriptor>> + 'a>;

/// Destination for a new object.
pub trait ObjectSink: Write + Seek {
    /// Makes the written bytes visible under the sink's name, replacing any
    /// previous object of that name.
    fn commit(self: Box<Self>) -> io::Result<()>;
}

/// Generic object store with list/read/stat/write operations.
pub trait ObjectStore {
    fn list(&self, collection: &str) -> io::Result<ObjectIter<'_>>;

    fn open(&self, collection: &str, name: &str) -> io::Result<Box<dyn Read + '_>>;

    fn stat(&self, collection: &str, name: &str) -> io::Result<ObjectAttrs>;

    /// Starts a new (or replacing) object named `name` in `collection`.
    fn create(&self, collection: &str, name: &str) -> io::Result<Box<dyn ObjectSink + '_>>;
}
