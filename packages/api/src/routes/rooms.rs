use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use lambda_http::tracing::{debug, warn};
use serde::Deserialize;

use gomoku_core::models::room::{RoomSnapshot, RoomSummary};
use gomoku_core::services::room_coordinator::{GameHistory, DEFAULT_ROOM_LIST_LIMIT};

use crate::{error::ApiError, middleware::auth::AuthenticatedParticipant, state::AppState};

const MAX_ROOM_LIST_LIMIT: usize = 100;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/rooms", get(list_rooms))
        .route("/rooms/{room_code}", get(get_room))
        .route("/rooms/{room_code}/history", get(get_history))
}

#[derive(Debug, Deserialize)]
pub struct ListRoomsQuery {
    pub limit: Option<usize>,
}

async fn list_rooms(
    State(state): State<AppState>,
    AuthenticatedParticipant(participant): AuthenticatedParticipant,
    Query(query): Query<ListRoomsQuery>,
) -> Json<Vec<RoomSummary>> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_ROOM_LIST_LIMIT)
        .clamp(1, MAX_ROOM_LIST_LIMIT);
    let rooms = state.engine.coordinator.list_rooms(limit).await;
    debug!("{} listed {} rooms", participant.id(), rooms.len());
    Json(rooms)
}

async fn get_room(
    State(state): State<AppState>,
    _participant: AuthenticatedParticipant,
    Path(room_code): Path<String>,
) -> Result<Json<RoomSnapshot>, ApiError> {
    state
        .engine
        .coordinator
        .snapshot(&room_code.to_uppercase())
        .await
        .map(Json)
        .map_err(|e| {
            warn!("Failed to load room {}: {}", room_code, e);
            ApiError::from(e)
        })
}

async fn get_history(
    State(state): State<AppState>,
    _participant: AuthenticatedParticipant,
    Path(room_code): Path<String>,
) -> Result<Json<GameHistory>, ApiError> {
    state
        .engine
        .coordinator
        .history(&room_code.to_uppercase())
        .await
        .map(Json)
        .map_err(|e| {
            warn!("Failed to load history of room {}: {}", room_code, e);
            ApiError::from(e)
        })
}
