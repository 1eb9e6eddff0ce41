//! # bucketzip ZIP Container Writer (`common::archive::container`)
//!
//! File: cli/src/common/archive/container.rs
//!
//! ## Overview
//!
//! This module adapts the `zip` crate to the needs of the aggregation
//! pipelines: one deflate-compressed entry per stored object, entry metadata
//! copied verbatim from the object's attributes, and a central directory that
//! is written exactly once.
//!
//! ## Architecture
//!
//! - `EntryHeader` is built from an object name and its `ObjectAttrs` right
//!   before the entry is opened and is never re-derived afterwards.
//! - `ArchiveWriter` owns the `ZipWriter` and therefore the sink. Entries are
//!   append-only; `finalize` writes the central directory and hands the sink
//!   back. If the writer is dropped without being finalized (an error path
//!   in a pipeline), `Drop` writes the central directory so the container is
//!   not left unterminated.
//!
use crate::common::store::ObjectAttrs;
use crate::core::error::{BucketzipError, Result};
use chrono::{DateTime, Datelike, Timelike, Utc};
use std::io::{self, Seek, Write};
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Unix permission bits stored on every entry.
pub const ENTRY_PERMISSIONS: u32 = 0o755;

/// Entries of this declared size or larger are written with ZIP64 extensions.
const ZIP64_THRESHOLD: u64 = u32::MAX as u64;

/// # Archive Entry Header (`EntryHeader`)
///
/// Metadata of one archive entry, derived 1:1 from the attributes of the
/// object it is built from.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryHeader {
    pub name: String,
    /// Size reported by the store; decides whether the entry needs ZIP64.
    pub uncompressed_size: u64,
    pub modified: DateTime<Utc>,
    pub compression: CompressionMethod,
    pub permissions: u32,
}

impl EntryHeader {
    pub fn new(name: &str, attrs: &ObjectAttrs) -> Self {
        Self {
            name: name.to_string(),
            uncompressed_size: attrs.size,
            modified: attrs.modified,
            compression: CompressionMethod::Deflated,
            permissions: ENTRY_PERMISSIONS,
        }
    }

    fn options(&self) -> SimpleFileOptions {
        SimpleFileOptions::default()
            .compression_method(self.compression)
            .unix_permissions(self.permissions)
            .last_modified_time(dos_time(&self.modified))
            .large_file(self.uncompressed_size >= ZIP64_THRESHOLD)
    }
}

/// Converts a timestamp to the MS-DOS date/time ZIP headers use. Instants
/// outside 1980..=2107 fall back to 1980-01-01 00:00:00.
fn dos_time(modified: &DateTime<Utc>) -> zip::DateTime {
    let year = u16::try_from(modified.year()).unwrap_or_default();
    // Month, day, hour, minute and second always fit in a u8.
    zip::DateTime::from_date_and_time(
        year,
        modified.month() as u8,
        modified.day() as u8,
        modified.hour() as u8,
        modified.minute() as u8,
        modified.second() as u8,
    )
    .unwrap_or_default()
}

fn archive_error(entry: &str, source: io::Error) -> anyhow::Error {
    BucketzipError::ArchiveWrite {
        entry: entry.to_string(),
        source,
    }
    .into()
}

/// # Archive Writer (`ArchiveWriter`)
///
/// Append-only ZIP writer over a seekable sink `W`, finalized exactly once.
pub struct ArchiveWriter<W: Write + Seek> {
    name: String,
    zip: Option<ZipWriter<W>>,
    entries: usize,
}

impl<W: Write + Seek> ArchiveWriter<W> {
    /// Starts an empty archive called `name` on `sink`.
    pub fn new(name: impl Into<String>, sink: W) -> Self {
        Self {
            name: name.into(),
            zip: Some(ZipWriter::new(sink)),
            entries: 0,
        }
    }

    /// Number of entries opened so far.
    pub fn entries(&self) -> usize {
        self.entries
    }

    /// # Open Entry (`open_entry`)
    ///
    /// Begins a new entry described by `header`. The previous entry, if any,
    /// is closed implicitly. Bytes written to the returned `EntryWriter` are
    /// compressed into this entry.
    ///
    /// ## Errors
    ///
    /// `BucketzipError::ArchiveWrite` if the header name is empty, the archive
    /// was already finalized, or the local file header cannot be written.
    pub fn open_entry(&mut self, header: &EntryHeader) -> Result<EntryWriter<'_, W>> {
        if header.name.is_empty() {
            return Err(archive_error(
                &header.name,
                io::Error::new(io::ErrorKind::InvalidInput, "entry name is empty"),
            ));
        }
        let Self { name, zip, entries } = self;
        let zip = zip.as_mut().ok_or_else(|| {
            archive_error(
                &header.name,
                io::Error::new(
                    io::ErrorKind::Other,
                    format!("archive '{name}' is already finalized"),
                ),
            )
        })?;
        zip.start_file(header.name.clone(), header.options())
            .map_err(|e| archive_error(&header.name, io::Error::other(e)))?;
        *entries += 1;
        debug!(
            "Opened entry #{} '{}' ({} bytes declared) in {}",
            entries, header.name, header.uncompressed_size, name
        );
        Ok(EntryWriter { zip, written: 0 })
    }

    /// # Finalize Archive (`finalize`)
    ///
    /// Writes the central directory and returns the underlying sink. Must be
    /// called once, after the last entry has been written.
    pub fn finalize(&mut self) -> Result<W> {
        let zip = self.zip.take().ok_or_else(|| {
            archive_error(
                &self.name,
                io::Error::new(io::ErrorKind::Other, "archive is already finalized"),
            )
        })?;
        let sink = zip
            .finish()
            .map_err(|e| archive_error(&self.name, io::Error::other(e)))?;
        debug!("Finalized {} with {} entries", self.name, self.entries);
        Ok(sink)
    }
}

/// Finalizes an archive dropped on an error path. The store sinks discard
/// the bytes anyway when they are dropped uncommitted, but a caller-owned
/// sink (a `&mut Cursor`, a plain file) is left holding a readable container
/// with every entry completed so far. Doing it here rather than in
/// `ZipWriter`'s own drop lets a failure be logged. The run's error is
/// reported by the caller, so this only logs at debug level.
impl<W: Write + Seek> Drop for ArchiveWriter<W> {
    fn drop(&mut self) {
        if let Some(zip) = self.zip.take() {
            debug!(
                "Archive '{}' abandoned after {} entries; writing its central directory",
                self.name, self.entries
            );
            if let Err(e) = zip.finish() {
                debug!("Could not finalize abandoned archive '{}': {}", self.name, e);
            }
        }
    }
}

/// Writer for the payload of the entry most recently opened.
pub struct EntryWriter<'a, W: Write + Seek> {
    zip: &'a mut ZipWriter<W>,
    written: u64,
}

impl<W: Write + Seek> EntryWriter<'_, W> {
    /// Uncompressed bytes written into this entry so far.
    pub fn written(&self) -> u64 {
        self.written
    }
}

impl<W: Write + Seek> Write for EntryWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.zip.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.zip.flush()
    }
}

/// Reads every entry of a finished archive back as `(name, content)` pairs,
/// in archive order.
#[cfg(test)]
pub fn read_entries(archive: &[u8]) -> Vec<(String, Vec<u8>)> {
    use std::io::Read;

    let mut zip = zip::ZipArchive::new(io::Cursor::new(archive)).expect("valid zip archive");
    (0..zip.len())
        .map(|i| {
            let mut file = zip.by_index(i).expect("entry readable");
            let mut content = Vec::new();
            file.read_to_end(&mut content).expect("entry decompresses");
            (file.name().to_string(), content)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::io::Cursor;

    fn attrs(size: u64) -> ObjectAttrs {
        ObjectAttrs {
            size,
            modified: Utc.with_ymd_and_hms(2023, 11, 2, 8, 15, 42).unwrap(),
        }
    }

    #[test]
    fn test_header_from_attrs() {
        let header = EntryHeader::new("a.txt", &attrs(5));
        assert_eq!(header.name, "a.txt");
        assert_eq!(header.uncompressed_size, 5);
        assert_eq!(header.compression, CompressionMethod::Deflated);
        assert_eq!(header.permissions, 0o755);
        assert_eq!(header.modified, attrs(5).modified);
    }

    #[test]
    fn test_dos_time_conversion() {
        let converted = dos_time(&attrs(0).modified);
        assert_eq!(converted.year(), 2023);
        assert_eq!(converted.month(), 11);
        assert_eq!(converted.day(), 2);
        assert_eq!(converted.hour(), 8);
        assert_eq!(converted.minute(), 15);
        // DOS time has a two-second resolution.
        assert_eq!(converted.second(), 42);

        let too_old = dos_time(&Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(too_old.year(), 1980);
        assert_eq!(too_old.month(), 1);
    }

    #[test]
    fn test_entries_written_in_order() -> Result<()> {
        let mut archive = ArchiveWriter::new("all.zip", Cursor::new(Vec::new()));
        for (name, content) in [("b.txt", "second"), ("a.txt", "hello"), ("empty", "")] {
            let mut entry = archive.open_entry(&EntryHeader::new(name, &attrs(content.len() as u64)))?;
            entry.write_all(content.as_bytes())?;
            assert_eq!(entry.written(), content.len() as u64);
        }
        assert_eq!(archive.entries(), 3);
        let bytes = archive.finalize()?.into_inner();

        let entries = read_entries(&bytes);
        let names: Vec<_> = entries.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["b.txt", "a.txt", "empty"]);
        assert_eq!(entries[1].1, b"hello");
        assert!(entries[2].1.is_empty());

        let mut zip = zip::ZipArchive::new(Cursor::new(bytes))?;
        let file = zip.by_name("a.txt")?;
        assert_eq!(file.compression(), CompressionMethod::Deflated);
        assert_eq!(file.size(), 5);
        assert_eq!(file.unix_mode().map(|m| m & 0o777), Some(0o755));
        Ok(())
    }

    #[test]
    fn test_empty_entry_name_rejected() {
        let mut archive = ArchiveWriter::new("all.zip", Cursor::new(Vec::new()));
        let err = archive
            .open_entry(&EntryHeader::new("", &attrs(0)))
            .err()
            .unwrap();
        assert!(matches!(
            err.downcast_ref::<BucketzipError>(),
            Some(BucketzipError::ArchiveWrite { .. })
        ));
        assert_eq!(archive.entries(), 0);
    }

    #[test]
    fn test_open_after_finalize_rejected() -> Result<()> {
        let mut archive = ArchiveWriter::new("all.zip", Cursor::new(Vec::new()));
        archive.finalize()?;

        let err = archive
            .open_entry(&EntryHeader::new("late.txt", &attrs(1)))
            .err()
            .unwrap();
        assert!(format!("{err:#}").contains("already finalized"));
        assert!(archive.finalize().is_err());
        Ok(())
    }

    #[test]
    fn test_drop_finalizes_archive() -> Result<()> {
        let mut sink = Cursor::new(Vec::new());
        {
            let mut archive = ArchiveWriter::new("all.zip", &mut sink);
            archive
                .open_entry(&EntryHeader::new("a.txt", &attrs(5)))?
                .write_all(b"hello")?;
            // Dropped without finalize, as on an error path.
        }
        let entries = read_entries(sink.get_ref());
        assert_eq!(entries, vec![("a.txt".to_string(), b"hello".to_vec())]);
        Ok(())
    }
}
