//! CareLog library
//!
//! Role-gated case management: client records, logs with an append-only
//! revision history, word diffs between revisions, and client goals.

pub mod app;
pub mod auth;
pub mod config;
pub mod database;
pub mod diff;
pub mod error;
pub mod services;
