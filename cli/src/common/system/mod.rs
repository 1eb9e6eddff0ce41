//! # bucketzip System Utilities Module (`common::system`)
//!
//! File: cli/src/common/system/mod.rs
//!
//! ## Overview
//!
//! This module gathers the process-level inspection the resource report is
//! built on.
//!
//! ## Architecture
//!
//! - **`alloc`**: `CountingAllocator`, the global allocator that tracks live
//!   and cumulative heap bytes and the live allocation count.
//! - **`memory`**: `ResourceSample`, the pure `sample` function, and
//!   `MemoryReport`, which prints samples as CSV lines.
//!
//! ```rust,ignore
//! use crate::common::system::memory::MemoryReport;
//!
//! let mut stdout = std::io::stdout();
//! let mut report = MemoryReport::new(&mut stdout);
//! report.emit_header();
//! report.snapshot("a.txt");
//! ```
//!

pub mod alloc;
pub mod memory;
