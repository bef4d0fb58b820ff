//! # Stacks Common Library
//!
//! Shared code for the Stacks catalog services including:
//! - Catalog schema and database initialization
//! - Precomputed summary maintenance
//! - Shared data models (WorkRecord)
//! - Site browse policy and configuration loading
//! - Error types

pub mod config;
pub mod db;
pub mod error;

pub use config::{BrowsePolicy, HoldPolicy};
pub use db::WorkRecord;
pub use error::{Error, Result};
