//! IdAlloc Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared error handling and logging bootstrap for the stable-identifier
//! allocation pipeline.
//!
//! # Overview
//!
//! This crate provides functionality used across all workspace members:
//!
//! - **Error Handling**: the pipeline-wide [`AllocError`] and [`Result`]
//! - **Logging**: `tracing` subscriber configuration and initialization

pub mod error;
pub mod logging;

// Re-export commonly used types
pub use error::{AllocError, Result};
