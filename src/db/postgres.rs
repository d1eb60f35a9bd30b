use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use sqlx::{
    postgres::{PgPool, PgPoolOptions},
    Row,
};

use super::{is_unique_violation, Backend, VoteStore};
use crate::error::{CastError, StorageError};
use crate::models::{Vote, VoterRecord};

pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn connect(
        url: &str,
        max_connections: u32,
        timeout: Duration,
    ) -> Result<Self, StorageError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(timeout)
            .connect(url)
            .await?;

        Ok(Self { pool })
    }

    pub async fn voter_record(&self, voter_key: &str) -> Result<Option<VoterRecord>, StorageError> {
        let record = sqlx::query("SELECT voter_key, first_voted_at FROM voters WHERE voter_key = $1")
            .bind(voter_key)
            .fetch_optional(&self.pool)
            .await?
            .map(|row| VoterRecord {
                voter_key: row.get("voter_key"),
                first_voted_at: row.get("first_voted_at"),
            });
        Ok(record)
    }
}

#[async_trait]
impl VoteStore for PostgresStore {
    fn backend(&self) -> Backend {
        Backend::Postgres
    }

    async fn migrate(&self) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS votes (
                id BIGSERIAL PRIMARY KEY,
                option_name TEXT NOT NULL,
                voter_key TEXT NOT NULL,
                cast_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS voters (
                voter_key TEXT PRIMARY KEY,
                first_voted_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn has_voted(&self, voter_key: &str) -> Result<bool, StorageError> {
        let found = sqlx::query("SELECT 1 FROM voters WHERE voter_key = $1")
            .bind(voter_key)
            .fetch_optional(&self.pool)
            .await?
            .is_some();
        Ok(found)
    }

    async fn record_vote(&self, vote: &Vote) -> Result<(), CastError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO votes (option_name, voter_key, cast_at) VALUES ($1, $2, $3)")
            .bind(&vote.option)
            .bind(&vote.voter_key)
            .bind(vote.cast_at)
            .execute(&mut *tx)
            .await?;

        // A concurrent insert of the same key blocks here until the other
        // transaction finishes, then fails with 23505 if it committed.
        let record = vote.voter_record();
        let inserted = sqlx::query("INSERT INTO voters (voter_key, first_voted_at) VALUES ($1, $2)")
            .bind(&record.voter_key)
            .bind(record.first_voted_at)
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

// These run only against a live server named by TEST_DATABASE_URL.
#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    async fn live_store() -> Option<PostgresStore> {
        let url = std::env::var("TEST_DATABASE_URL").ok()?;
        if !url.starts_with("postgres") {
            return None;
        }
        let store = PostgresStore::connect(&url, 8, Duration::from_secs(5))
            .await
            .expect("connect to TEST_DATABASE_URL");
        store.migrate().await.expect("migrate");
        Some(store)
    }

    fn unique_key(tag: &str) -> String {
        format!("{}-{}", tag, chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default())
    }

    #[tokio::test]
    async fn duplicate_voter_is_rejected() {
        let Some(store) = live_store().await else {
            return;
        };
        let key = unique_key("dup");

        store.record_vote(&Vote::new("A", &key)).await.unwrap();
        let err = store.record_vote(&Vote::new("B", &key)).await.unwrap_err();
        assert!(matches!(err, CastError::AlreadyVoted));
        assert!(store.has_voted(&key).await.unwrap());
        assert!(store.voter_record(&key).await.unwrap().is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_casts_accept_exactly_one() {
        let Some(store) = live_store().await else {
            return;
        };
        let store = Arc::new(store);
        let key = unique_key("race");

        let mut handles = Vec::new();
        for _ in 0..12 {
            let store = Arc::clone(&store);
            let key = key.clone();
            handles.push(tokio::spawn(async move {
                store.record_vote(&Vote::new("A", &key)).await
            }));
        }

        let mut accepted = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(()) => accepted += 1,
                Err(CastError::AlreadyVoted) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(accepted, 1);
    }
}
