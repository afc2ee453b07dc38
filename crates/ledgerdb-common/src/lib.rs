//! LedgerDB Common - Shared utilities and types
//!
//! This crate provides common functionality used across all LedgerDB components:
//! - Error types and handling
//! - Configuration management
//! - Metrics helpers
//! - Value, row and column type definitions

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod metrics;
pub mod types;

pub use config::Config;
pub use error::{Error, ErrorKind, Result};
pub use types::*;
