use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use lambda_http::tracing::error;
use serde::Deserialize;

use gomoku_core::models::player::{LeaderboardEntry, PlayerStats};
use gomoku_core::services::player_service::DEFAULT_LEADERBOARD_LIMIT;

use crate::{error::ApiError, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/leaderboard", get(get_leaderboard))
        .route("/players/{player_id}/stats", get(get_player_stats))
}

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    pub limit: Option<usize>,
}

async fn get_leaderboard(
    State(state): State<AppState>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<Vec<LeaderboardEntry>>, ApiError> {
    state
        .engine
        .players
        .leaderboard(query.limit.unwrap_or(DEFAULT_LEADERBOARD_LIMIT))
        .await
        .map(Json)
        .map_err(|e| {
            error!("Failed to build leaderboard: {}", e);
            ApiError::from(e)
        })
}

async fn get_player_stats(
    State(state): State<AppState>,
    Path(player_id): Path<String>,
) -> Result<Json<PlayerStats>, ApiError> {
    state
        .engine
        .players
        .stats(&player_id)
        .await
        .map(Json)
        .map_err(ApiError::from)
}
