use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::identity::VoterKey;
use super::AppState;
use crate::error::{AppError, RejectReason};
use crate::ledger::CastOutcome;

#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    #[serde(alias = "party")]
    pub option: String,
}

#[derive(Debug, Serialize)]
pub struct VoteResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<RejectReason>,
}

pub async fn handle_vote(
    State(state): State<AppState>,
    VoterKey(voter_key): VoterKey,
    payload: Result<Json<VoteRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(request) = payload.map_err(|e| AppError::MalformedPayload(e.body_text()))?;

    let outcome = match voter_key.as_deref() {
        None => CastOutcome::rejected(RejectReason::EmptyIdentity),
        // Cheap early answer for the common repeat visit. The insert
        // transaction still decides races.
        Some(key) => match state.ledger.has_voted(key).await {
            Ok(true) => CastOutcome::rejected(RejectReason::AlreadyVoted),
            Ok(false) => state.ledger.cast(&request.option, key).await,
            Err(e) => {
                warn!("Could not check voter {}: {}", key, e);
                CastOutcome::rejected(RejectReason::StorageUnavailable)
            }
        },
    };

    let voter = voter_key.as_deref().unwrap_or("<unknown>");
    match outcome.reason {
        None => info!("Accepted vote for {:?} from {}", request.option, voter),
        Some(reason) => debug!("Rejected vote from {}: {:?}", voter, reason),
    }

    Ok(respond(outcome))
}

fn respond(outcome: CastOutcome) -> Response {
    let (status, message) = match outcome.reason {
        None => (StatusCode::OK, "Your vote has been recorded!"),
        Some(RejectReason::AlreadyVoted) => (StatusCode::CONFLICT, "You have already voted!"),
        Some(RejectReason::InvalidOption) => (StatusCode::BAD_REQUEST, "Invalid option selected!"),
        Some(RejectReason::EmptyIdentity) => {
            (StatusCode::BAD_REQUEST, "Could not identify your connection.")
        }
        Some(RejectReason::StorageUnavailable) => (
            StatusCode::SERVICE_UNAVAILABLE,
            "There was a problem recording your vote. Please try again.",
        ),
    };

    (
        status,
        Json(VoteResponse {
            success: outcome.accepted,
            message: message.to_string(),
            reason: outcome.reason,
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_accepts_legacy_party_field() {
        let request: VoteRequest = serde_json::from_str(r#"{"party": "A"}"#).unwrap();
        assert_eq!(request.option, "A");
        let request: VoteRequest = serde_json::from_str(r#"{"option": "B"}"#).unwrap();
        assert_eq!(request.option, "B");
    }

    #[test]
    fn statuses_follow_the_rejection_reason() {
        assert_eq!(respond(CastOutcome::accepted()).status(), StatusCode::OK);
        assert_eq!(
            respond(CastOutcome::rejected(RejectReason::AlreadyVoted)).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            respond(CastOutcome::rejected(RejectReason::InvalidOption)).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            respond(CastOutcome::rejected(RejectReason::StorageUnavailable)).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
