//! Questionnaire votes.

use axum::extract::State;
use axum::http::StatusCode;

use pantry_core::VoteId;

use crate::error::Result;
use crate::extract::{Json, Path};
use crate::middleware::Caller;
use crate::models::Vote;
use crate::response::ApiResponse;
use crate::services::votes::CastVote;
use crate::state::AppState;

/// POST /questionnaires/vote
pub async fn vote(
    State(state): State<AppState>,
    Caller(ctx): Caller,
    Json(req): Json<CastVote>,
) -> Result<ApiResponse<Vote>> {
    Ok(ApiResponse::created(state.votes().cast(&ctx, req).await?))
}

/// DELETE /questionnaires/votes/{id}
pub async fn delete_vote(
    State(state): State<AppState>,
    Caller(ctx): Caller,
    Path(id): Path<VoteId>,
) -> Result<StatusCode> {
    state.votes().delete(&ctx, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
