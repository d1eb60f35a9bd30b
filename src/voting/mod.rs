pub mod plurality;

use serde::Serialize;

use crate::error::StorageError;
use crate::ledger::Ledger;

// One row of the ranked standings. Never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankingEntry {
    pub rank: usize,
    pub option: String,
    pub votes: u64,
    pub percentage: f64,
}

/// Ranked entries plus the total they were computed from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Standings {
    pub entries: Vec<RankingEntry>,
    pub total_votes: u64,
}

/// Recomputes the standings from the ledger. Nothing is cached between calls.
pub async fn standings(ledger: &Ledger) -> Result<Standings, StorageError> {
    let counts = ledger.vote_counts().await?;
    Ok(plurality::calculate_results(ledger.options(), &counts))
}

pub async fn rank(ledger: &Ledger) -> Result<Vec<RankingEntry>, StorageError> {
    Ok(standings(ledger).await?.entries)
}

pub async fn total_votes(ledger: &Ledger) -> Result<u64, StorageError> {
    Ok(standings(ledger).await?.total_votes)
}
