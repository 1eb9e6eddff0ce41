//! # bucketzip Main Entry Point
//!
//! File: cli/src/main.rs
//!
//! ## Overview
//!
//! This file serves as the main entry point for the bucketzip CLI.
//! It handles:
//! - Installing the counting global allocator the resource report reads
//! - Command-line argument parsing using Clap
//! - Setting up the logging system based on verbosity flags
//! - Running the bundle command and reporting its errors
//!
//! ## Output
//!
//! stdout carries the mode banner and the CSV resource report; all logging
//! goes to stderr so the report stays machine-readable.
//!
//! ## Examples
//!
//! ```bash
//! # Streaming run over ./sample-bucket
//! bucketzip
//!
//! # Buffered run with debug logging
//! bucketzip -vv -w
//! ```
//!
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

// Declare the top-level modules of the CLI crate.
mod commands; // Command logic (bundle)
mod common; // Archive container, object store, resource accounting
mod core; // Errors and configuration

#[global_allocator]
static ALLOCATOR: common::system::alloc::CountingAllocator =
    common::system::alloc::CountingAllocator;

/// Defines the command-line arguments structure using Clap's derive macros.
#[derive(Parser, Debug)]
#[command(
    name = "bucketzip",
    about = "Aggregate every object of a bucket into a single ZIP archive",
    long_about = "Aggregate every object of a bucket into a single deflate-compressed ZIP archive.\n\
                  Streams each object by default (all.zip); --waste buffers everything in memory \
                  instead (all-waste.zip). A CSV memory report is printed on stdout.",
    version
)]
struct Cli {
    #[command(flatten)]
    bundle: commands::bundle::BundleArgs,
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    tracing::debug!("Parsed CLI arguments: {:?}", cli);

    if let Err(e) = commands::bundle::handle_bundle(cli.bundle) {
        tracing::error!("Command execution failed: {:?}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use assert_cmd::Command;
    use predicates::prelude::*;
    fn bucketzip_cmd() -> Command {
        Command::cargo_bin("bucketzip").expect("Failed to find bucketzip binary for testing")
    }
    #[test]
    fn test_main_help_flag() {
        bucketzip_cmd()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("--waste"));
    }
    #[test]
    fn test_main_version_flag() {
        bucketzip_cmd()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
    }
}
