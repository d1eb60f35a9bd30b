use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use log::error;
use serde::Serialize;
use tokio::time::timeout;

use crate::db::VoteStore;
use crate::error::{CastError, RejectReason, StorageError};
use crate::models::{OptionSet, Vote};

/// Result of [`Ledger::cast`] as seen by callers outside the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CastOutcome {
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<RejectReason>,
}

impl CastOutcome {
    pub fn accepted() -> Self {
        Self {
            accepted: true,
            reason: None,
        }
    }

    pub fn rejected(reason: RejectReason) -> Self {
        Self {
            accepted: false,
            reason: Some(reason),
        }
    }
}

impl From<&Result<(), CastError>> for CastOutcome {
    fn from(result: &Result<(), CastError>) -> Self {
        match result {
            Ok(()) => Self::accepted(),
            Err(e) => Self::rejected(e.reason()),
        }
    }
}

/// The vote ledger: validates casts against the option set and bounds every
/// storage call by the configured timeout.
pub struct Ledger {
    store: Arc<dyn VoteStore>,
    options: OptionSet,
    timeout: Duration,
}

impl Ledger {
    pub fn new(store: Arc<dyn VoteStore>, options: OptionSet, timeout: Duration) -> Self {
        Self {
            store,
            options,
            timeout,
        }
    }

    pub fn options(&self) -> &OptionSet {
        &self.options
    }

    /// A blank key has no voter record, so it answers `false` without asking
    /// the store.
    pub async fn has_voted(&self, voter_key: &str) -> Result<bool, StorageError> {
        match normalize_key(voter_key) {
            Some(voter_key) => self.bounded(self.store.has_voted(voter_key)).await?,
            None => Ok(false),
        }
    }

    pub async fn cast_vote(&self, option: &str, voter_key: &str) -> Result<(), CastError> {
        let voter_key = normalize_key(voter_key).ok_or(CastError::EmptyIdentity)?;
        if !self.options.contains(option) {
            return Err(CastError::InvalidOption(option.to_string()));
        }

        let vote = Vote::new(option, voter_key);
        self.bounded(self.store.record_vote(&vote)).await?
    }

    /// Inbound boundary: casts and reduces the result to accepted/reason.
    pub async fn cast(&self, option: &str, voter_key: &str) -> CastOutcome {
        let result = self.cast_vote(option, voter_key).await;
        if let Err(CastError::StorageUnavailable(e)) = &result {
            error!("Failed to record vote for {}: {}", voter_key, e);
        }
        CastOutcome::from(&result)
    }

    pub async fn vote_counts(&self) -> Result<Vec<(String, i64)>, StorageError> {
        self.bounded(self.store.vote_counts()).await?
    }

    // Dropping a timed-out future drops its transaction, which rolls it back.
    async fn bounded<T, F>(&self, fut: F) -> Result<T, StorageError>
    where
        F: Future<Output = T>,
    {
        timeout(self.timeout, fut)
            .await
            .map_err(|_| StorageError::Timeout(self.timeout.as_secs()))
    }
}

// Keys are stored trimmed; every lookup must go through here too.
fn normalize_key(voter_key: &str) -> Option<&str> {
    let voter_key = voter_key.trim();
    (!voter_key.is_empty()).then_some(voter_key)
}
