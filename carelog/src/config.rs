//! Application configuration constants
//!
//! Central location for all configuration constants, resource limits,
//! and validation boundaries used throughout the application.

// ===== Database =====

/// File name of the SQLite database inside the data directory
pub const DATABASE_FILE_NAME: &str = "carelog.db";

/// Connections held by the application pool
pub const DATABASE_MAX_CONNECTIONS: u32 = 5;

/// How long a connection waits on a locked database before giving up
pub const DATABASE_BUSY_TIMEOUT_SECS: u64 = 5;

// ===== Write Conflicts =====

/// Attempts made to append a revision or subgoal before surfacing a conflict.
/// Each attempt re-reads the current maximum inside a fresh transaction.
pub const MAX_WRITE_RETRIES: u32 = 5;

/// Base backoff between conflicting attempts; multiplied by the attempt number
pub const WRITE_RETRY_BACKOFF_MS: u64 = 10;

// ===== Geolocation Limits =====

pub const MIN_LATITUDE: f64 = -90.0;
pub const MAX_LATITUDE: f64 = 90.0;
pub const MIN_LONGITUDE: f64 = -180.0;
pub const MAX_LONGITUDE: f64 = 180.0;

// ===== Goals =====

/// Maximum number of subgoal titles accepted when a goal is created
pub const MAX_INITIAL_SUBGOALS: usize = 20;
