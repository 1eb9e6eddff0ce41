//! # bucketzip Error Types
//!
//! File: cli/src/core/error.rs
//!
//! ## Overview
//!
//! This module defines the error kinds raised while aggregating a bucket into
//! an archive. Every kind names the step that failed and carries the object,
//! archive, or operation involved so that an operator can tell exactly where
//! a run stopped.
//!
//! ## Architecture
//!
//! The error system consists of two main components:
//! - `BucketzipError`: A custom error enum using `thiserror` for the specific failure kinds
//! - `Result<T>`: A type alias for `anyhow::Result<T>` for flexible error handling
//!
//! Pipelines return a `BucketzipError` wrapped in `anyhow::Error`; callers that
//! need to react to a particular kind downcast it:
//!
//! ```rust,ignore
//! match pipeline.run(&store, "sample-bucket", &mut report) {
//!     Ok(summary) => println!("{} entries", summary.entries),
//!     Err(e) if matches!(e.downcast_ref::<BucketzipError>(), Some(BucketzipError::Enumeration { .. })) => {
//!         eprintln!("listing failed: {e}");
//!     }
//!     Err(e) => return Err(e),
//! }
//! ```
//!
//! No kind is retried. The first error aborts the run.
//!
use std::io;
use thiserror::Error;

/// Custom error type for bucketzip.
#[derive(Error, Debug)]
pub enum BucketzipError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// Listing the collection failed, either up front or part-way through.
    #[error("Failed to enumerate collection '{collection}'")]
    Enumeration {
        collection: String,
        #[source]
        source: io::Error,
    },

    /// A listed object could not be opened or read to the end.
    #[error("Failed to {operation} object '{name}'")]
    ObjectRead {
        name: String,
        operation: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("Failed to fetch attributes of object '{name}'")]
    Metadata {
        name: String,
        #[source]
        source: io::Error,
    },

    /// Opening an entry, writing its payload, or writing the central directory failed.
    #[error("Failed to write archive entry '{entry}'")]
    ArchiveWrite {
        entry: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to persist archive '{archive}'")]
    DestinationWrite {
        archive: String,
        #[source]
        source: io::Error,
    },

    /// Local temporary storage of the buffered pipeline failed.
    #[error("Staging file {operation} failed")]
    Staging {
        operation: &'static str,
        #[source]
        source: io::Error,
    },
}

/// Type alias for Result using anyhow::Error for broad compatibility.
pub type Result<T> = anyhow::Result<T>;
