//! # bucketzip Common Utilities (`common`)
//!
//! File: cli/src/common/mod.rs
//!
//! ## Overview
//!
//! This module is the root of the shared building blocks the archive
//! pipelines are assembled from. Command logic lives in `commands::`,
//! infrastructure (errors, config) in `core::`.
//!
//! ## Architecture
//!
//! - **`archive`**: The ZIP container adapter (`EntryHeader`, `ArchiveWriter`).
//! - **`store`**: The object store contract and its local-filesystem backend.
//! - **`system`**: Heap accounting and the CSV resource report.
//!

/// ZIP container writing.
pub mod archive;
/// Object store contract and backends.
pub mod store;
/// Heap accounting and resource reporting.
pub mod system;
