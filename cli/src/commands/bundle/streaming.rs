//! # Streaming Aggregation Pipeline
//!
//! File: cli/src/commands/bundle/streaming.rs
//!
//! ## Overview
//!
//! Builds `all.zip` directly on the destination sink. Each object is copied
//! from its read stream into its archive entry through one fixed-size buffer
//! that is reused for the whole run, so memory use does not grow with object
//! size.
//!
//! ## Flow
//!
//! 1. Create the destination sink and wrap it in an `ArchiveWriter`.
//! 2. For every listed object: open, stat, open the entry, copy in chunks,
//!    drop the reader, sample.
//! 3. Finalize the archive, commit the sink, sample once more.
//!
//! Any failure aborts the run. The sink is then dropped uncommitted and the
//! partially built archive is discarded by the store.
//!
use super::pipeline::{
    archive_write_error, destination_error, fetch_header, object_read_error, open_object,
    source_objects, AggregationPipeline, ArchiveSummary, STREAMING_ARCHIVE,
};
use crate::common::archive::container::ArchiveWriter;
use crate::common::store::ObjectStore;
use crate::common::system::memory::MemoryReport;
use crate::core::error::Result;
use std::io::{self, Read, Seek, Write};
use tracing::{debug, info};

/// Low-memory strategy: chunked copies straight into the destination.
#[derive(Debug, Clone)]
pub struct StreamingPipeline {
    chunk_size: usize,
}

impl StreamingPipeline {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }
}

impl AggregationPipeline for StreamingPipeline {
    fn archive_name(&self) -> &'static str {
        STREAMING_ARCHIVE
    }

    fn run(
        &self,
        store: &dyn ObjectStore,
        collection: &str,
        report: &mut MemoryReport<'_>,
    ) -> Result<ArchiveSummary> {
        let sink = store
            .create(collection, STREAMING_ARCHIVE)
            .map_err(|source| destination_error(STREAMING_ARCHIVE, source))?;
        let mut archive = ArchiveWriter::new(STREAMING_ARCHIVE, sink);

        report.emit_header();
        let mut buffer = vec![0u8; self.chunk_size];
        let mut uncompressed_bytes = 0;
        for object in source_objects(store, collection)? {
            let object = object?;
            let copied = copy_object(store, collection, &object.name, &mut archive, &mut buffer)?;
            debug!(
                "Archived '{}': {} bytes read (listed as {})",
                object.name, copied, object.size
            );
            uncompressed_bytes += copied;
            report.snapshot(&object.name);
        }

        let entries = archive.entries();
        let mut sink = archive.finalize()?;
        let archive_bytes = sink
            .stream_position()
            .map_err(|source| destination_error(STREAMING_ARCHIVE, source))?;
        sink.commit()
            .map_err(|source| destination_error(STREAMING_ARCHIVE, source))?;
        report.snapshot(STREAMING_ARCHIVE);

        info!(
            "Wrote {} ({} entries, {} bytes) to '{}'",
            STREAMING_ARCHIVE, entries, archive_bytes, collection
        );
        Ok(ArchiveSummary {
            archive_name: STREAMING_ARCHIVE.to_string(),
            entries,
            uncompressed_bytes,
            archive_bytes,
        })
    }
}

/// Copies one object into a new entry and returns the number of bytes read.
fn copy_object<W: Write + Seek>(
    store: &dyn ObjectStore,
    collection: &str,
    name: &str,
    archive: &mut ArchiveWriter<W>,
    buffer: &mut [u8],
) -> Result<u64> {
    let mut reader = open_object(store, collection, name)?;
    let header = fetch_header(store, collection, name)?;
    let mut entry = archive.open_entry(&header)?;
    loop {
        let n = match reader.read(buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(source) => return Err(object_read_error(name, "read", source)),
        };
        entry
            .write_all(&buffer[..n])
            .map_err(|source| archive_write_error(name, source))?;
    }
    Ok(entry.written())
}
