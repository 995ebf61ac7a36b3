//! HTTP API handlers for encore-web

pub mod artists;
pub mod auth;
pub mod comments;
pub mod error;
pub mod health;
pub mod oauth;
pub mod ui;

pub use error::ApiError;
