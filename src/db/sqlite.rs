use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use sqlx::{
    migrate::MigrateDatabase,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions},
    Row, Sqlite,
};

use super::{is_unique_violation, Backend, VoteStore};
use crate::error::{CastError, StorageError};
use crate::models::{Vote, VoterRecord};

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(
        url: &str,
        max_connections: u32,
        timeout: Duration,
    ) -> Result<Self, StorageError> {
        // Create database if it doesn't exist
        if !Sqlite::database_exists(url).await.unwrap_or(false) {
            Sqlite::create_database(url).await?;
        }

        // WAL plus a busy timeout lets concurrent casts queue on the write
        // lock instead of failing with SQLITE_BUSY.
        let options = SqliteConnectOptions::from_str(url)?
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(timeout);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(timeout)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    pub async fn voter_record(&self, voter_key: &str) -> Result<Option<VoterRecord>, StorageError> {
        let row = sqlx::query("SELECT voter_key, first_voted_at FROM voters WHERE voter_key = ?")
            .bind(voter_key)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| {
            let first_voted_at = parse_timestamp(&row.get::<String, _>("first_voted_at"))?;
            Ok(VoterRecord {
                voter_key: row.get("voter_key"),
                first_voted_at,
            })
        })
        .transpose()
    }
}

#[async_trait]
impl VoteStore for SqliteStore {
    fn backend(&self) -> Backend {
        Backend::Sqlite
    }

    async fn migrate(&self) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS votes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                option_name TEXT NOT NULL,
                voter_key TEXT NOT NULL,
                cast_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS voters (
                voter_key TEXT NOT NULL PRIMARY KEY,
                first_voted_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn has_voted(&self, voter_key: &str) -> Result<bool, StorageError> {
        let found = sqlx::query("SELECT 1 FROM voters WHERE voter_key = ?")
            .bind(voter_key)
            .fetch_optional(&self.pool)
            .await?
            .is_some();
        Ok(found)
    }

    async fn record_vote(&self, vote: &Vote) -> Result<(), CastError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO votes (option_name, voter_key, cast_at) VALUES (?, ?, ?)")
            .bind(&vote.option)
            .bind(&vote.voter_key)
            .bind(vote.cast_at.to_rfc3339())
            .execute(&mut *tx)
            .await?;

        let record = vote.voter_record();
        let inserted = sqlx::query("INSERT INTO voters (voter_key, first_voted_at) VALUES (?, ?)")
            .bind(&record.voter_key)
            .bind(record.first_voted_at.to_rfc3339())
            .execute(&mut *tx)
            .await;

        match inserted {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => {
                debug!("Voter {} lost the insert race, rolling back", vote.voter_key);
                if let Err(e) = tx.rollback().await {
                    warn!("Rollback after duplicate vote failed: {}", e);
                }
                return Err(CastError::AlreadyVoted);
            }
            Err(e) => return Err(e.into()),
        }

        tx.commit().await?;
        Ok(())
    }

    async fn vote_counts(&self) -> Result<Vec<(String, i64)>, StorageError> {
        let counts = sqlx::query(
            r#"
            SELECT option_name, COUNT(*) AS votes
            FROM votes
            GROUP BY option_name
            "#,
        )
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|row| (row.get::<String, _>("option_name"), row.get::<i64, _>("votes")))
        .collect();

        Ok(counts)
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::Corrupt(format!("bad timestamp {:?}: {}", raw, e)))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::db::test_support::temp_sqlite;

    fn count_for(counts: &[(String, i64)], option: &str) -> i64 {
        counts
            .iter()
            .find(|(name, _)| name == option)
            .map(|(_, n)| *n)
            .unwrap_or(0)
    }

    #[tokio::test]
    async fn migrate_is_idempotent() {
        let (_dir, store) = temp_sqlite().await;
        store.migrate().await.unwrap();
        store.migrate().await.unwrap();
        assert!(store.vote_counts().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn recorded_vote_marks_voter() {
        let (_dir, store) = temp_sqlite().await;
        assert!(!store.has_voted("10.0.0.1").await.unwrap());

        let vote = Vote::new("A", "10.0.0.1");
        store.record_vote(&vote).await.unwrap();

        assert!(store.has_voted("10.0.0.1").await.unwrap());
        assert!(!store.has_voted("10.0.0.2").await.unwrap());

        let record = store.voter_record("10.0.0.1").await.unwrap().unwrap();
        assert_eq!(record.first_voted_at.timestamp(), vote.cast_at.timestamp());
    }

    #[tokio::test]
    async fn duplicate_voter_rolls_back_vote_row() {
        let (_dir, store) = temp_sqlite().await;
        store.record_vote(&Vote::new("A", "10.0.0.1")).await.unwrap();

        let err = store.record_vote(&Vote::new("B", "10.0.0.1")).await.unwrap_err();
        assert!(matches!(err, CastError::AlreadyVoted));

        let counts = store.vote_counts().await.unwrap();
        assert_eq!(count_for(&counts, "A"), 1);
        assert_eq!(count_for(&counts, "B"), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_casts_for_one_voter_accept_exactly_one() {
        let (_dir, store) = temp_sqlite().await;
        let store = Arc::new(store);

        let mut handles = Vec::new();
        for i in 0..16 {
            let store = Arc::clone(&store);
            let option = if i % 2 == 0 { "A" } else { "B" };
            handles.push(tokio::spawn(async move {
                store.record_vote(&Vote::new(option, "203.0.113.9")).await
            }));
        }

        let mut accepted = 0;
        let mut duplicates = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(()) => accepted += 1,
                Err(CastError::AlreadyVoted) => duplicates += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(accepted, 1);
        assert_eq!(duplicates, 15);

        let counts = store.vote_counts().await.unwrap();
        assert_eq!(count_for(&counts, "A") + count_for(&counts, "B"), 1);
    }

    #[tokio::test]
    async fn counts_group_by_option() {
        let (_dir, store) = temp_sqlite().await;
        for (option, key) in [("A", "k1"), ("A", "k2"), ("B", "k3")] {
            store.record_vote(&Vote::new(option, key)).await.unwrap();
        }

        let counts = store.vote_counts().await.unwrap();
        assert_eq!(count_for(&counts, "A"), 2);
        assert_eq!(count_for(&counts, "B"), 1);
        assert_eq!(counts.len(), 2);
    }
}
