//! # bucketzip Archive Utilities Module (`common::archive`)
//!
//! File: cli/src/common/archive/mod.rs
//!
//! ## Overview
//!
//! This module holds everything related to the archive container the
//! pipelines produce. Both pipelines write the same format, a single ZIP
//! file with one deflate-compressed entry per stored object, so they share
//! one adapter.
//!
//! ## Architecture
//!
//! - **`container`**: `EntryHeader` (entry metadata derived from an object's
//!   attributes) and `ArchiveWriter`, a finalize-on-drop wrapper around
//!   `zip::ZipWriter` that works on any seekable byte sink.
//!
//! ```rust,ignore
//! use crate::common::archive::container::{ArchiveWriter, EntryHeader};
//!
//! let mut archive = ArchiveWriter::new("all.zip", sink);
//! let header = EntryHeader::new("a.txt", &attrs);
//! std::io::copy(&mut reader, &mut archive.open_entry(&header)?)?;
//! let sink = archive.finalize()?;
//! ```
//!

/// ZIP container writer and entry headers.
pub mod container;
