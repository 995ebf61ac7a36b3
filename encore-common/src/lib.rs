//! Shared library for Encore: error types, configuration, the disk snapshot
//! cache, and SQLite persistence for local accounts and comments.

pub mod cache;
pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};
