use axum::{extract::State, Json};
use serde::Serialize;

use super::AppState;
use crate::error::AppError;
use crate::voting::{self, RankingEntry};

#[derive(Debug, Serialize)]
pub struct RankingView {
    pub rank: usize,
    pub option: String,
    pub votes: u64,
    pub percentage: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TotalResponse {
    pub total_votes: u64,
}

pub async fn handle_results(State(state): State<AppState>) -> Result<Json<Vec<RankingView>>, AppError> {
    let ranking = voting::rank(&state.ledger).await?;
    let views = ranking
        .into_iter()
        .map(|entry| to_view(&state, entry))
        .collect();
    Ok(Json(views))
}

pub async fn handle_total(State(state): State<AppState>) -> Result<Json<TotalResponse>, AppError> {
    let total_votes = voting::total_votes(&state.ledger).await?;
    Ok(Json(TotalResponse { total_votes }))
}

fn to_view(state: &AppState, entry: RankingEntry) -> RankingView {
    RankingView {
        image: state.config.rank_image(entry.rank).map(str::to_string),
        rank: entry.rank,
        option: entry.option,
        votes: entry.votes,
        percentage: entry.percentage,
    }
}
