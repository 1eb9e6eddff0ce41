//! # Buffered ("Waste Memory") Aggregation Pipeline
//!
//! File: cli/src/commands/bundle/buffered.rs
//!
//! ## Overview
//!
//! Produces the same archive content as the streaming pipeline, but with the
//! opposite resource profile: every object is read completely into memory
//! before it is written, the archive is built in a local staging file, and
//! the finished archive is read back into memory in one piece before it is
//! uploaded. The sample labelled `all-waste.zip` is taken while that second
//! buffer is held, which is where peak memory shows up.
//!
//! ## Flow
//!
//! 1. Create the staging file (prefix `all-waste.zip`) in the staging directory.
//! 2. For every listed object: open, stat, open the entry, read the whole
//!    object, write it in one call, sample.
//! 3. Finalize the archive and close the staging file.
//! 4. Reopen it, read it entirely, sample, write it to the destination in one
//!    call, commit.
//! 5. Delete the staging file, whatever happened in step 4.
//!
//! If anything fails before step 3 the `ArchiveWriter` and the staging
//! `NamedTempFile` are dropped, which removes the file as well.
//!
use super::pipeline::{
    archive_write_error, destination_error, fetch_header, object_read_error, open_object,
    source_objects, AggregationPipeline, ArchiveSummary, BUFFERED_ARCHIVE,
};
use crate::common::archive::container::ArchiveWriter;
use crate::common::store::ObjectStore;
use crate::common::system::memory::MemoryReport;
use crate::core::error::{BucketzipError, Result};
use std::fs::File;
use std::io::{self, Read, Seek, Write};
use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, TempPath};
use tracing::{debug, info, warn};

/// High-memory strategy: whole-object buffers and a staged archive.
#[derive(Debug, Clone)]
pub struct BufferedPipeline {
    staging_dir: PathBuf,
}

impl BufferedPipeline {
    pub fn new(staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            staging_dir: staging_dir.into(),
        }
    }
}

fn staging_error(operation: &'static str, source: io::Error) -> anyhow::Error {
    BucketzipError::Staging { operation, source }.into()
}

/// Archive staged on local disk, ready to be uploaded.
struct StagedArchive {
    path: TempPath,
    entries: usize,
    uncompressed_bytes: u64,
}

impl AggregationPipeline for BufferedPipeline {
    fn archive_name(&self) -> &'static str {
        BUFFERED_ARCHIVE
    }

    fn run(
        &self,
        store: &dyn ObjectStore,
        collection: &str,
        report: &mut MemoryReport<'_>,
    ) -> Result<ArchiveSummary> {
        report.emit_header();
        let staging = tempfile::Builder::new()
            .prefix(BUFFERED_ARCHIVE)
            .tempfile_in(&self.staging_dir)
            .map_err(|source| staging_error("create", source))?;
        debug!("Staging {} at {}", BUFFERED_ARCHIVE, staging.path().display());

        let staged = build_staged_archive(store, collection, staging, report)?;
        let uploaded = upload_staged(store, collection, &staged.path, report);
        let cleanup = staged.path.close();

        let archive_bytes = match (uploaded, cleanup) {
            (Ok(bytes), Ok(())) => bytes,
            (Ok(_), Err(source)) => return Err(staging_error("cleanup", source)),
            (Err(e), Ok(())) => return Err(e),
            (Err(e), Err(cleanup_err)) => {
                warn!("Failed to remove staging file after upload error: {}", cleanup_err);
                return Err(e);
            }
        };

        info!(
            "Wrote {} ({} entries, {} bytes) to '{}'",
            BUFFERED_ARCHIVE, staged.entries, archive_bytes, collection
        );
        Ok(ArchiveSummary {
            archive_name: BUFFERED_ARCHIVE.to_string(),
            entries: staged.entries,
            uncompressed_bytes: staged.uncompressed_bytes,
            archive_bytes,
        })
    }
}

/// Writes every listed object into the staging file, then finalizes and
/// closes it. The returned `TempPath` still deletes the file when dropped.
fn build_staged_archive(
    store: &dyn ObjectStore,
    collection: &str,
    staging: NamedTempFile,
    report: &mut MemoryReport<'_>,
) -> Result<StagedArchive> {
    let mut archive = ArchiveWriter::new(BUFFERED_ARCHIVE, staging);
    let mut uncompressed_bytes = 0;
    for object in source_objects(store, collection)? {
        let object = object?;
        uncompressed_bytes += buffer_object(store, collection, &object.name, &mut archive)?;
        report.snapshot(&object.name);
    }

    let entries = archive.entries();
    let mut staging = archive.finalize()?;
    staging
        .flush()
        .map_err(|source| staging_error("flush", source))?;
    Ok(StagedArchive {
        path: staging.into_temp_path(),
        entries,
        uncompressed_bytes,
    })
}

/// Reads one object completely, then writes it into a new entry in one call.
fn buffer_object<W: Write + Seek>(
    store: &dyn ObjectStore,
    collection: &str,
    name: &str,
    archive: &mut ArchiveWriter<W>,
) -> Result<u64> {
    let mut reader = open_object(store, collection, name)?;
    let header = fetch_header(store, collection, name)?;
    let mut entry = archive.open_entry(&header)?;
    let mut contents = Vec::new();
    reader
        .read_to_end(&mut contents)
        .map_err(|source| object_read_error(name, "read", source))?;
    entry
        .write_all(&contents)
        .map_err(|source| archive_write_error(name, source))?;
    Ok(contents.len() as u64)
}

/// Reads the staged archive back into memory and writes it to the destination.
fn upload_staged(
    store: &dyn ObjectStore,
    collection: &str,
    staged: &Path,
    report: &mut MemoryReport<'_>,
) -> Result<u64> {
    let mut contents = Vec::new();
    File::open(staged)
        .map_err(|source| staging_error("reopen", source))?
        .read_to_end(&mut contents)
        .map_err(|source| staging_error("read", source))?;
    report.snapshot(BUFFERED_ARCHIVE);

    let mut sink = store
        .create(collection, BUFFERED_ARCHIVE)
        .map_err(|source| destination_error(BUFFERED_ARCHIVE, source))?;
    sink.write_all(&contents)
        .map_err(|source| destination_error(BUFFERED_ARCHIVE, source))?;
    sink.commit()
        .map_err(|source| destination_error(BUFFERED_ARCHIVE, source))?;
    Ok(contents.len() as u64)
}
