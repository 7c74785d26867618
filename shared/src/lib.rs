//! Shared types and utilities for timestrata
//!
//! This crate contains the value, variable and series types used by the
//! retention engine, the daemon and the command-line tools.

pub mod types;
pub mod utils;

// Re-export commonly used types
pub use types::{series::*, value::*, variable::*};
