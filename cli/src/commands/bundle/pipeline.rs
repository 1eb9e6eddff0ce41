//! # Aggregation Pipeline Interface
//!
//! File: cli/src/commands/bundle/pipeline.rs
//!
//! ## Overview
//!
//! Both strategies implement `AggregationPipeline`; the command handler picks
//! one with `select` and never branches on the mode again. This module also
//! holds the steps both strategies share: enumerating the bucket, opening an
//! object, and fetching the attributes an entry header is built from.
//!
//! Every object is handled the same way up to the copy:
//!
//! ```text
//! open (ObjectRead) -> stat (Metadata) -> open_entry (ArchiveWrite) -> copy -> drop reader
//! ```
//!
//! The attributes come from a separate `stat` call rather than from the
//! listing, so the entry header reflects the object as it is when read.
//!
use crate::common::archive::container::EntryHeader;
use crate::common::store::{ObjectDescriptor, ObjectStore};
use crate::common::system::memory::MemoryReport;
use crate::core::config::Config;
use crate::core::error::{BucketzipError, Result};
use std::io::{self, Read};
use tracing::debug;

use super::{buffered::BufferedPipeline, streaming::StreamingPipeline};

/// Archive written by the streaming pipeline.
pub const STREAMING_ARCHIVE: &str = "all.zip";
/// Archive written by the buffered pipeline.
pub const BUFFERED_ARCHIVE: &str = "all-waste.zip";

/// Objects with these names are our own output and are never archived.
const ARCHIVE_NAMES: [&str; 2] = [STREAMING_ARCHIVE, BUFFERED_ARCHIVE];

/// Which strategy builds the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Streaming,
    Buffered,
}

impl Mode {
    pub fn from_waste_flag(waste: bool) -> Self {
        if waste {
            Mode::Buffered
        } else {
            Mode::Streaming
        }
    }

    /// Line printed on stdout before the resource report.
    pub fn banner(self) -> &'static str {
        match self {
            Mode::Streaming => "Run by memory saving.",
            Mode::Buffered => "Run by waste memory.",
        }
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub archive_name: String,
    pub entries: usize,
    /// Sum of the bytes read from all archived objects.
    pub uncompressed_bytes: u64,
    /// Size of the persisted archive.
    pub archive_bytes: u64,
}

/// Builds one archive of every object in a collection and persists it back
/// into that collection.
pub trait AggregationPipeline {
    fn archive_name(&self) -> &'static str;

    /// Runs the pipeline end to end. Emits the report header, one sample per
    /// archived object, and one sample labelled with the archive name.
    fn run(
        &self,
        store: &dyn ObjectStore,
        collection: &str,
        report: &mut MemoryReport<'_>,
    ) -> Result<ArchiveSummary>;
}

/// Returns the pipeline implementing `mode`, configured from `config`.
pub fn select(mode: Mode, config: &Config) -> Box<dyn AggregationPipeline> {
    match mode {
        Mode::Streaming => Box::new(StreamingPipeline::new(config.archive.copy_chunk_size)),
        Mode::Buffered => Box::new(BufferedPipeline::new(config.staging_dir())),
    }
}

pub(super) fn enumeration_error(collection: &str, source: io::Error) -> anyhow::Error {
    BucketzipError::Enumeration {
        collection: collection.to_string(),
        source,
    }
    .into()
}

pub(super) fn object_read_error(name: &str, operation: &'static str, source: io::Error) -> anyhow::Error {
    BucketzipError::ObjectRead {
        name: name.to_string(),
        operation,
        source,
    }
    .into()
}

pub(super) fn archive_write_error(entry: &str, source: io::Error) -> anyhow::Error {
    BucketzipError::ArchiveWrite {
        entry: entry.to_string(),
        source,
    }
    .into()
}

pub(super) fn destination_error(archive: &str, source: io::Error) -> anyhow::Error {
    BucketzipError::DestinationWrite {
        archive: archive.to_string(),
        source,
    }
    .into()
}

/// Lists `collection`, skipping previously written archives. The first
/// failing step ends the run, so the iterator is never resumed after an error.
///
/// Objects named exactly `all.zip` or `all-waste.zip` are dropped from the
/// listing and get no archive entry, even if a user stored them. Nested names
/// such as `logs/all.zip` are archived as usual.
pub(super) fn source_objects<'s>(
    store: &'s dyn ObjectStore,
    collection: &str,
) -> Result<impl Iterator<Item = Result<ObjectDescriptor>> + 's> {
    let listing = store
        .list(collection)
        .map_err(|source| enumeration_error(collection, source))?;
    let collection = collection.to_string();
    Ok(listing.filter_map(move |item| match item {
        Ok(object) if ARCHIVE_NAMES.contains(&object.name.as_str()) => {
            debug!("Skipping archive object '{}'", object.name);
            None
        }
        Ok(object) => Some(Ok(object)),
        Err(source) => Some(Err(enumeration_error(&collection, source))),
    }))
}

/// Opens a read stream for `name`; released when the returned box is dropped.
pub(super) fn open_object<'s>(
    store: &'s dyn ObjectStore,
    collection: &str,
    name: &str,
) -> Result<Box<dyn Read + 's>> {
    store
        .open(collection, name)
        .map_err(|source| object_read_error(name, "open", source))
}

/// Looks the object up again and builds its entry header from the result.
pub(super) fn fetch_header(store: &dyn ObjectStore, collection: &str, name: &str) -> Result<EntryHeader> {
    let attrs = store
        .stat(collection, name)
        .map_err(|source| BucketzipError::Metadata {
            name: name.to_string(),
            source,
        })?;
    Ok(EntryHeader::new(name, &attrs))
}
