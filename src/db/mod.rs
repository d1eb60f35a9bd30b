pub mod postgres;
pub mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;
use log::info;

use crate::config::Config;
use crate::error::{CastError, ConfigError, StorageError};
use crate::models::Vote;

pub use postgres::PostgresStore;
pub use sqlite::SqliteStore;

/// Persistence for the vote ledger. Implementations own their SQL; callers
/// never look at which backend they are talking to.
#[async_trait]
pub trait VoteStore: Send + Sync {
    fn backend(&self) -> Backend;

    /// Creates the `votes` and `voters` tables if they are missing.
    async fn migrate(&self) -> Result<(), StorageError>;

    async fn has_voted(&self, voter_key: &str) -> Result<bool, StorageError>;

    /// Writes the vote row and then the voter row in one transaction. A
    /// uniqueness violation on the voter row rolls the transaction back and
    /// comes out as [`CastError::AlreadyVoted`].
    async fn record_vote(&self, vote: &Vote) -> Result<(), CastError>;

    /// Per-option vote counts from a single grouped query.
    async fn vote_counts(&self) -> Result<Vec<(String, i64)>, StorageError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Sqlite,
    Postgres,
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::Sqlite => write!(f, "sqlite"),
            Backend::Postgres => write!(f, "postgres"),
        }
    }
}

/// A connection URL with its backend decided up front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseTarget {
    pub backend: Backend,
    pub url: String,
}

impl DatabaseTarget {
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ConfigError::Invalid {
                key: "DATABASE_URL",
                message: "must not be empty".to_string(),
            });
        }

        if let Some(rest) = raw.strip_prefix("postgres://") {
            return Ok(Self {
                backend: Backend::Postgres,
                url: format!("postgresql://{}", rest),
            });
        }
        if raw.starts_with("postgresql://") {
            return Ok(Self {
                backend: Backend::Postgres,
                url: raw.to_string(),
            });
        }
        if raw.starts_with("sqlite:") {
            return Self::sqlite(raw.to_string());
        }
        if raw.contains("://") {
            return Err(ConfigError::Invalid {
                key: "DATABASE_URL",
                message: format!("unsupported database scheme in {}", raw),
            });
        }

        // A bare path names a SQLite file.
        Self::sqlite(format!("sqlite:{}", raw))
    }

    // Every pooled connection to an in-memory database opens its own empty
    // copy, so the ledger would not survive past one connection.
    fn sqlite(url: String) -> Result<Self, ConfigError> {
        if url.contains(":memory:") || url.contains("mode=memory") {
            return Err(ConfigError::Invalid {
                key: "DATABASE_URL",
                message: format!("in-memory SQLite cannot hold the ledger: {}", url),
            });
        }
        Ok(Self {
            backend: Backend::Sqlite,
            url,
        })
    }
}

/// Opens the configured backend and makes sure the schema exists.
pub async fn connect(
    config: &Config,
) -> Result<Arc<dyn VoteStore>, Box<dyn std::error::Error + Send + Sync>> {
    let target = DatabaseTarget::parse(&config.database_url)?;

    let store: Arc<dyn VoteStore> = match target.backend {
        Backend::Sqlite => Arc::new(
            SqliteStore::connect(&target.url, config.max_connections, config.storage_timeout)
                .await?,
        ),
        Backend::Postgres => Arc::new(
            PostgresStore::connect(&target.url, config.max_connections, config.storage_timeout)
                .await?,
        ),
    };

    info!("Connected to {} ledger store", store.backend());

    store.migrate().await?;
    info!("Ledger schema ready");

    Ok(store)
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}
