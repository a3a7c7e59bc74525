//! Core types and utilities for the lineage component runtime.
//!
//! This crate provides the foundational types used across the other lineage crates:
//! - Option keys, values and identity-carrying option maps
//! - Definition and instance identifiers
//! - Lifecycle hook tags and callback lists
//! - The merge service interface and the default strategy table
//! - Runtime configuration
//! - Error types

pub mod config;
pub mod errors;
pub mod hooks;
pub mod merge;
pub mod types;

pub use config::*;
pub use errors::*;
pub use hooks::*;
pub use merge::*;
pub use types::*;
