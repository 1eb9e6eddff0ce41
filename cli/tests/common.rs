//! # bucketzip CLI Integration Test Common Helpers
//!
//! File: cli/tests/common.rs
//!
//! ## Overview
//!
//! Shared helpers for the integration test files (`bundle.rs`, `main_tests.rs`).
//! Each `.rs` file in `cli/tests/` is compiled as its own test crate and runs
//! the real `bucketzip` binary.
//!

// Allow potentially unused code in this common module, as different test files might use different helpers.
#![allow(dead_code)]

pub use assert_cmd::Command;
use std::fs;
use std::io::{Cursor, Read};
use std::path::Path;

/// # Get bucketzip Command (`bucketzip_cmd`)
///
/// Creates an `assert_cmd::Command` for the compiled `bucketzip` binary, with
/// the configuration environment variables cleared so the host cannot leak
/// into a test.
///
/// ## Panics
/// Panics if the `bucketzip` binary cannot be found via `Command::cargo_bin`.
pub fn bucketzip_cmd() -> Command {
    let mut cmd = Command::cargo_bin("bucketzip").expect("Failed to find bucketzip binary for testing");
    cmd.env_remove("BUCKETZIP_ROOT")
        .env_remove("BUCKETZIP_BUCKET")
        .env_remove("RUST_LOG");
    cmd
}

/// Creates `<root>/<bucket>/<name>` for every `(name, content)` pair.
pub fn make_bucket(root: &Path, bucket: &str, objects: &[(&str, &[u8])]) {
    for (name, content) in objects {
        let path = root.join(bucket).join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }
}

/// Reads a ZIP archive from disk as `(name, content)` pairs in archive order.
pub fn read_archive(path: &Path) -> Vec<(String, Vec<u8>)> {
    let bytes = fs::read(path).expect("archive exists");
    let mut zip = zip::ZipArchive::new(Cursor::new(bytes)).expect("valid zip archive");
    (0..zip.len())
        .map(|i| {
            let mut file = zip.by_index(i).unwrap();
            let mut content = Vec::new();
            file.read_to_end(&mut content).unwrap();
            (file.name().to_string(), content)
        })
        .collect()
}
