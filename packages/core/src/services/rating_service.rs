use serde::{Deserialize, Serialize};

pub const DEFAULT_RATING: i32 = 1200;
pub const RATING_FLOOR: i32 = 800;
pub const PROVISIONAL_GAMES: u32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RatingTier {
    Bronze,
    Silver,
    Gold,
    Platinum,
    Diamond,
    Master,
    Grandmaster,
}

impl RatingTier {
    pub fn for_rating(rating: i32) -> RatingTier {
        match rating {
            r if r < 1000 => RatingTier::Bronze,
            r if r < 1200 => RatingTier::Silver,
            r if r < 1400 => RatingTier::Gold,
            r if r < 1600 => RatingTier::Platinum,
            r if r < 1800 => RatingTier::Diamond,
            r if r < 2000 => RatingTier::Master,
            _ => RatingTier::Grandmaster,
        }
    }
}

/// Score a player earned in one game.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Score {
    Win,
    Draw,
    Loss,
}

impl Score {
    fn value(self) -> f64 {
        match self {
            Score::Win => 1.0,
            Score::Draw => 0.5,
            Score::Loss => 0.0,
        }
    }

    pub fn opposite(self) -> Score {
        match self {
            Score::Win => Score::Loss,
            Score::Draw => Score::Draw,
            Score::Loss => Score::Win,
        }
    }
}

/// Rating and completed-game count going into a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rated {
    pub rating: i32,
    pub games_played: u32,
}

pub fn expected_score(rating: i32, opponent_rating: i32) -> f64 {
    1.0 / (1.0 + 10f64.powf(f64::from(opponent_rating - rating) / 400.0))
}

pub fn k_factor(rating: i32, games_played: u32) -> f64 {
    if games_played < PROVISIONAL_GAMES {
        40.0
    } else if rating < 1400 {
        32.0
    } else if rating < 2000 {
        24.0
    } else {
        16.0
    }
}

pub fn new_rating(player: Rated, opponent_rating: i32, score: Score) -> i32 {
    let k = k_factor(player.rating, player.games_played);
    let expected = expected_score(player.rating, opponent_rating);
    let updated = (f64::from(player.rating) + k * (score.value() - expected)).round() as i32;
    updated.max(RATING_FLOOR)
}

/// New ratings for both players, each with its own K-factor against the
/// other's pre-game rating. `score` is the first player's.
pub fn rate_match(first: Rated, second: Rated, score: Score) -> (i32, i32) {
    (
        new_rating(first, second.rating, score),
        new_rating(second, first.rating, score.opposite()),
    )
}
