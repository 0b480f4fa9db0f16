//! Service-wide error types.
//!
//! Every failure mode has exactly one terminal handling path:
//! - `ConfigRead`/`ConfigParse`/`Config` abort before the runtime starts.
//! - `Construction` aborts startup synchronously; no listener is left bound.
//! - Domain errors never reach this type; the router maps them to HTTP
//!   responses (see `router`).
//! - Connection-level transport errors are handled inside the serve loop and
//!   logged per connection; they never tear down the service.
//! - `ShutdownTimeout` is non-fatal: the service still reaches `Stopped`,
//!   with the abandoned in-flight requests reported.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias used across the service.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced to callers of the service entry point.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file could not be read.
    #[error("failed to read config file '{path}': {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Configuration file could not be parsed.
    #[error("failed to parse config file '{path}': {source}")]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// Configuration values are invalid (bad address, bad level, ...).
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A dependency failed to construct during wiring; startup is aborted.
    #[error("construction failed: {0}")]
    Construction(String),

    /// The serve loop failed after startup.
    #[error("serve error: {0}")]
    Serve(#[from] std::io::Error),

    /// The drain deadline elapsed during shutdown with requests in flight.
    #[error("drain deadline elapsed with {abandoned} request(s) still in flight")]
    ShutdownTimeout { abandoned: usize },
}
