use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::services::rating_service::{RatingTier, Score, DEFAULT_RATING};

/// Rating and game statistics of a registered account.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct PlayerStats {
    pub id: String,
    pub display_name: String,
    pub rating: i32,
    pub games_played: u32,
    pub games_won: u32,
    pub games_lost: u32,
    pub games_drawn: u32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl PlayerStats {
    pub fn new(id: &str, display_name: &str) -> Self {
        PlayerStats {
            id: id.to_string(),
            display_name: display_name.to_string(),
            rating: DEFAULT_RATING,
            games_played: 0,
            games_won: 0,
            games_lost: 0,
            games_drawn: 0,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    /// Counts one finished game and moves the rating to `new_rating`.
    pub fn apply_result(&mut self, new_rating: i32, score: Score) -> RatingChange {
        self.games_played += 1;
        match score {
            Score::Win => self.games_won += 1,
            Score::Loss => self.games_lost += 1,
            Score::Draw => self.games_drawn += 1,
        }
        let old_rating = self.rating;
        self.rating = new_rating;
        RatingChange {
            player_id: self.id.clone(),
            old_rating,
            new_rating,
            delta: new_rating - old_rating,
        }
    }

    /// Percentage of games won, one decimal place.
    pub fn win_rate(&self) -> f64 {
        if self.games_played == 0 {
            return 0.0;
        }
        let rate = f64::from(self.games_won) / f64::from(self.games_played) * 100.0;
        (rate * 10.0).round() / 10.0
    }
}

/// Rating movement of one registered player after a finished game.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RatingChange {
    pub player_id: String,
    pub old_rating: i32,
    pub new_rating: i32,
    pub delta: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub player_id: String,
    pub display_name: String,
    pub rating: i32,
    pub tier: RatingTier,
    pub games_played: u32,
    pub games_won: u32,
    pub games_lost: u32,
    pub win_rate: f64,
}
