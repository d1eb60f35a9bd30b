pub mod identity;
mod pages;
mod results;
mod vote;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::{header::CONTENT_TYPE, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::ledger::Ledger;

pub use results::{RankingView, TotalResponse};
pub use vote::{VoteRequest, VoteResponse};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub ledger: Arc<Ledger>,
}

impl AppState {
    pub fn new(config: Arc<Config>, ledger: Arc<Ledger>) -> Self {
        Self { config, ledger }
    }
}

pub fn router(state: AppState) -> Router {
    // Only the read endpoints are meant for other origins.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    let api = Router::new()
        .route("/api/results", get(results::handle_results))
        .route("/api/total", get(results::handle_total))
        .layer(cors);

    Router::new()
        .route("/", get(pages::handle_index))
        .route("/vote", post(vote::handle_vote))
        .route("/results", get(pages::handle_results_page))
        .merge(api)
        .with_state(state)
}
