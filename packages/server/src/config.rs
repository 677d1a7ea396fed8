//! Server configuration.

use std::time::Duration;

use clap::Parser;
use thiserror::Error;

#[derive(Parser, Debug, Clone)]
#[command(name = "roomchat-server")]
#[command(about = "Room-based WebSocket chat server", long_about = None)]
pub struct ServerArgs {
    /// Host address to bind the server to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    pub host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, default_value = "8081")]
    pub port: u16,

    /// SQLite database URL
    #[arg(long, default_value = "sqlite://chat_server.db")]
    pub database_url: String,

    /// Keep everything in memory instead of SQLite
    #[arg(long)]
    pub in_memory: bool,

    /// Number of payloads processed concurrently across all connections
    #[arg(short = 'w', long, default_value = "10")]
    pub workers: usize,

    /// Upper bound for a single storage call, in milliseconds
    #[arg(long, default_value = "5000")]
    pub storage_timeout_ms: u64,
}

/// Where connected users and messages are stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    InMemory,
    Sqlite { url: String },
}

/// Validated server configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub storage: StorageBackend,
    pub workers: usize,
    pub storage_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("--workers must be at least 1")]
    NoWorkers,

    #[error("--storage-timeout-ms must be at least 1")]
    ZeroStorageTimeout,

    #[error("--database-url must not be empty")]
    EmptyDatabaseUrl,
}

impl TryFrom<ServerArgs> for ServerConfig {
    type Error = ConfigError;

    fn try_from(args: ServerArgs) -> Result<Self, Self::Error> {
        if args.workers == 0 {
            return Err(ConfigError::NoWorkers);
        }
        if args.storage_timeout_ms == 0 {
            return Err(ConfigError::ZeroStorageTimeout);
        }

        let storage = if args.in_memory {
            StorageBackend::InMemory
        } else {
            let url = args.database_url.trim();
            if url.is_empty() {
                return Err(ConfigError::EmptyDatabaseUrl);
            }
            StorageBackend::Sqlite {
                url: url.to_string(),
            }
        };

        Ok(Self {
            host: args.host,
            port: args.port,
            storage,
            workers: args.workers,
            storage_timeout: Duration::from_millis(args.storage_timeout_ms),
        })
    }
}
