//! Configuration for the echo service.
//!
//! Supports both command-line arguments and a TOML configuration file.
//! CLI arguments take precedence over config file values. The merged result
//! is an immutable [`ServiceConfig`] value object, consumed once by the
//! lifecycle manager and never mutated afterwards.

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::store::Store;

/// Command-line arguments for the echo service
#[derive(Parser, Debug)]
#[command(name = "echoserv")]
#[command(author = "echoserv authors")]
#[command(version = "0.1.0")]
#[command(about = "A layered HTTP echo service", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to bind to (e.g., 127.0.0.1:8080)
    #[arg(short = 'l', long)]
    pub listen: Option<String>,

    /// Data-access implementation to wire in
    #[arg(short = 's', long, value_enum)]
    pub store: Option<StoreKind>,

    /// Maximum number of entries the in-memory store holds
    #[arg(long)]
    pub store_capacity: Option<usize>,

    /// Seconds to let in-flight requests drain during shutdown
    #[arg(long)]
    pub drain_deadline_secs: Option<u64>,

    /// Number of worker threads (defaults to number of CPU cores)
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// Selectable data-access implementations.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// Bounded in-memory store
    Memory,
    /// No-op store
    Null,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub store: StoreSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

/// Server-related configuration
#[derive(Debug, Deserialize)]
pub struct ServerSection {
    /// Address to bind to
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Number of worker threads
    pub workers: Option<usize>,
    /// Shutdown drain deadline in seconds
    #[serde(default = "default_drain_deadline_secs")]
    pub drain_deadline_secs: u64,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            workers: None,
            drain_deadline_secs: default_drain_deadline_secs(),
        }
    }
}

/// Store-related configuration
#[derive(Debug, Deserialize)]
pub struct StoreSection {
    /// Which implementation to use
    #[serde(default = "default_store_kind")]
    pub kind: StoreKind,
    /// Maximum number of entries for the in-memory store
    #[serde(default = "default_store_capacity")]
    pub capacity: usize,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            kind: default_store_kind(),
            capacity: default_store_capacity(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingSection {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_listen() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_drain_deadline_secs() -> u64 {
    5
}

fn default_store_kind() -> StoreKind {
    StoreKind::Memory
}

fn default_store_capacity() -> usize {
    1024
}

fn default_log_level() -> String {
    "info".to_string()
}

/// How the service is hosted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostMode {
    /// Bind a listener and let the caller block on the serve loop.
    Standalone,
    /// Start inside the caller's process and return control immediately;
    /// the service then runs concurrently with the caller's own code.
    Embedded,
}

/// Which data-access implementation the lifecycle manager wires in.
#[derive(Clone)]
pub enum StoreProvider {
    /// Bounded in-memory store
    Memory { capacity: usize },
    /// No-op store
    Null,
    /// Externally supplied implementation, used by test harnesses.
    External(Arc<dyn Store>),
}

impl fmt::Debug for StoreProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreProvider::Memory { capacity } => f
                .debug_struct("Memory")
                .field("capacity", capacity)
                .finish(),
            StoreProvider::Null => write!(f, "Null"),
            StoreProvider::External(_) => write!(f, "External"),
        }
    }
}

/// Final resolved configuration, owned by the lifecycle manager for the
/// duration of one run.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub listen: SocketAddr,
    pub mode: HostMode,
    pub store: StoreProvider,
    pub drain_deadline: Duration,
    pub workers: Option<usize>,
    pub log_level: String,
}

impl ServiceConfig {
    /// Load configuration from CLI args and optional TOML file.
    /// CLI arguments take precedence over TOML file values.
    /// The CLI always produces standalone hosting; embedded hosting is
    /// constructed programmatically via [`ServiceConfig::embedded`].
    pub fn load() -> Result<Self> {
        let cli = CliArgs::parse();
        Self::from_cli(cli)
    }

    fn from_cli(cli: CliArgs) -> Result<Self> {
        // Load TOML config if specified
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents =
                std::fs::read_to_string(config_path).map_err(|e| Error::ConfigRead {
                    path: config_path.clone(),
                    source: e,
                })?;
            toml::from_str(&contents).map_err(|e| Error::ConfigParse {
                path: config_path.clone(),
                source: e,
            })?
        } else {
            TomlConfig::default()
        };

        // Merge CLI args with TOML config (CLI takes precedence)
        let listen = cli.listen.unwrap_or(toml_config.server.listen);
        let listen: SocketAddr = listen
            .parse()
            .map_err(|e| Error::Config(format!("invalid listen address '{listen}': {e}")))?;

        let kind = cli.store.unwrap_or(toml_config.store.kind);
        let capacity = cli.store_capacity.unwrap_or(toml_config.store.capacity);
        let store = match kind {
            StoreKind::Memory => StoreProvider::Memory { capacity },
            StoreKind::Null => StoreProvider::Null,
        };

        let drain_deadline_secs = cli
            .drain_deadline_secs
            .unwrap_or(toml_config.server.drain_deadline_secs);

        Ok(ServiceConfig {
            listen,
            mode: HostMode::Standalone,
            store,
            drain_deadline: Duration::from_secs(drain_deadline_secs),
            workers: cli.workers.or(toml_config.server.workers),
            log_level: if cli.log_level != "info" {
                cli.log_level
            } else {
                toml_config.logging.level
            },
        })
    }

    /// Baseline configuration for embedded hosting: ephemeral port on
    /// loopback, in-memory store, short drain deadline. Intended for test
    /// harnesses; adjust with the `with_*` builders.
    pub fn embedded() -> Self {
        ServiceConfig {
            listen: "127.0.0.1:0".parse().unwrap(),
            mode: HostMode::Embedded,
            store: StoreProvider::Memory {
                capacity: default_store_capacity(),
            },
            drain_deadline: Duration::from_secs(default_drain_deadline_secs()),
            workers: None,
            log_level: default_log_level(),
        }
    }

    /// Set the bind address.
    pub fn with_listen(mut self, listen: SocketAddr) -> Self {
        self.listen = listen;
        self
    }

    /// Set the store provider.
    pub fn with_store_provider(mut self, store: StoreProvider) -> Self {
        self.store = store;
        self
    }

    /// Inject an externally constructed store implementation.
    pub fn with_store(mut self, store: Arc<dyn Store>) -> Self {
        self.store = StoreProvider::External(store);
        self
    }

    /// Set the shutdown drain deadline.
    pub fn with_drain_deadline(mut self, deadline: Duration) -> Self {
        self.drain_deadline = deadline;
        self
    }
}
