use std::sync::Arc;
use tracing::debug;

use crate::models::player::{LeaderboardEntry, PlayerStats};
use crate::repositories::player_repository::PlayerRepository;
use crate::services::errors::player_service_errors::PlayerServiceError;
use crate::services::rating_service::RatingTier;

pub const DEFAULT_LEADERBOARD_LIMIT: usize = 100;
const MAX_LEADERBOARD_LIMIT: usize = 500;

/// Read side of player statistics. Without a durable store there are no
/// registered statistics and every call reports [`PlayerServiceError::Unavailable`].
#[derive(Clone)]
pub struct PlayerService {
    repository: Option<Arc<dyn PlayerRepository + Send + Sync>>,
}

impl PlayerService {
    pub fn new(repository: Option<Arc<dyn PlayerRepository + Send + Sync>>) -> Self {
        PlayerService { repository }
    }

    fn repository(&self) -> Result<&Arc<dyn PlayerRepository + Send + Sync>, PlayerServiceError> {
        self.repository.as_ref().ok_or(PlayerServiceError::Unavailable)
    }

    pub async fn stats(&self, player_id: &str) -> Result<PlayerStats, PlayerServiceError> {
        if player_id.trim().is_empty() {
            return Err(PlayerServiceError::ValidationError(
                "Player ID cannot be empty".to_string(),
            ));
        }
        Ok(self.repository()?.get_player(player_id).await?)
    }

    pub async fn leaderboard(
        &self,
        limit: usize,
    ) -> Result<Vec<LeaderboardEntry>, PlayerServiceError> {
        let limit = limit.clamp(1, MAX_LEADERBOARD_LIMIT);
        let players = self.repository()?.top_players(limit).await?;
        debug!("Leaderboard with {} players", players.len());

        Ok(players
            .into_iter()
            .take(limit)
            .enumerate()
            .map(|(index, player)| LeaderboardEntry {
                rank: index + 1,
                tier: RatingTier::for_rating(player.rating),
                win_rate: player.win_rate(),
                player_id: player.id,
                display_name: player.display_name,
                rating: player.rating,
                games_played: player.games_played,
                games_won: player.games_won,
                games_lost: player.games_lost,
            })
            .collect())
    }
}
