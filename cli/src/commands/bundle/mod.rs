//! # bucketzip Bundle Command
//!
//! File: cli/src/commands/bundle/mod.rs
//!
//! ## Overview
//!
//! This module turns every object of a bucket into one ZIP archive stored
//! back in that bucket. Two strategies are available:
//! - **streaming** (default): writes `all.zip`, copying each object through a
//!   small fixed buffer.
//! - **buffered** (`--waste`): writes `all-waste.zip`, holding each object and
//!   finally the whole archive in memory, staged through a local temp file.
//!
//! A CSV resource report on stdout shows the memory profile of the chosen
//! strategy after every object.
//!
//! ## Architecture
//!
//! - `pipeline.rs`: the `AggregationPipeline` trait, mode selection, shared per-object steps
//! - `streaming.rs`: the low-memory strategy
//! - `buffered.rs`: the high-memory strategy
//!
//! ## Examples
//!
//! ```bash
//! # Archive ./sample-bucket into ./sample-bucket/all.zip
//! bucketzip
//!
//! # Same bucket, buffered strategy, with info logging
//! bucketzip -v --waste
//!
//! # Another store root and bucket
//! bucketzip --root ~/buckets --bucket photos
//! ```
//!
use crate::common::store::local::LocalStore;
use crate::common::system::memory::MemoryReport;
use crate::core::config::{self, ConfigOverrides};
use crate::core::error::Result;
use anyhow::Context;
use clap::Args;
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::info;

pub mod buffered;
pub mod pipeline;
pub mod streaming;

pub use pipeline::{ArchiveSummary, Mode};

/// # Bundle Arguments (`BundleArgs`)
///
/// Command-line switches of the archive run. Only `--waste` changes what is
/// built; the others locate the bucket and override configuration files.
#[derive(Args, Debug)]
pub struct BundleArgs {
    /// Run by waste memory: buffer every object and the whole archive in memory.
    #[arg(short = 'w', long)]
    pub waste: bool,

    /// Store root directory; each sub-directory is a bucket.
    #[arg(long, env = "BUCKETZIP_ROOT", value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Bucket to archive (default: sample-bucket).
    #[arg(short, long, env = "BUCKETZIP_BUCKET", value_name = "NAME")]
    pub bucket: Option<String>,
}

/// # Handle Bundle Command (`handle_bundle`)
///
/// Loads configuration, selects the pipeline for the requested mode, prints
/// the mode banner, and runs the pipeline against the local object store with
/// the resource report on stdout.
///
/// ## Errors
///
/// Configuration errors, and whatever `BucketzipError` aborted the pipeline,
/// with the archive and bucket names attached as context.
pub fn handle_bundle(args: BundleArgs) -> Result<ArchiveSummary> {
    info!("Handling bundle with args: {:?}", args);
    let config = config::load_config(ConfigOverrides {
        root: args.root.map(|p| p.to_string_lossy().into_owned()),
        bucket: args.bucket,
    })?;

    let mode = Mode::from_waste_flag(args.waste);
    let pipeline = pipeline::select(mode, &config);
    let store = LocalStore::new(config.store_root());
    let bucket = &config.store.bucket;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    writeln!(out, "{}", mode.banner()).context("Failed to write to stdout")?;
    let mut report = MemoryReport::new(&mut out);

    let summary = pipeline
        .run(&store, bucket, &mut report)
        .with_context(|| {
            format!(
                "Failed to build {} from bucket '{}' under {}",
                pipeline.archive_name(),
                bucket,
                config.store_root().display()
            )
        })?;
    info!(
        "{} entries ({} bytes) archived into {} ({} bytes), {} resource samples",
        summary.entries,
        summary.uncompressed_bytes,
        summary.archive_name,
        summary.archive_bytes,
        report.samples()
    );
    Ok(summary)
}
