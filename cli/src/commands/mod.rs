//! # bucketzip Command Modules
//!
//! File: cli/src/commands/mod.rs
//!
//! ## Overview
//!
//! This module aggregates the command logic reachable from `main.rs`. The
//! binary has a single command, `bundle`, whose arguments are flattened into
//! the top-level CLI.
//!

/// Builds the bucket archive with the streaming or the buffered strategy.
pub mod bundle;
