//! # bucketzip Core Infrastructure
//!
//! File: cli/src/core/mod.rs
//!
//! ## Overview
//!
//! This module aggregates the core infrastructure shared by the command
//! handler and the pipelines:
//! - `config`: Configuration loading, merging, and validation
//! - `error`: Error kinds and the crate-wide `Result` alias
//!
//! ```rust
//! use crate::core::config; // For loading configuration
//! use crate::core::error::{BucketzipError, Result}; // For error handling
//! ```
//!
pub mod config;
pub mod error;
