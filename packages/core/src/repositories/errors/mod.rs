pub mod connection_repository_errors;
pub mod game_record_repository_errors;
pub mod player_repository_errors;
pub mod room_repository_errors;
pub mod state_store_errors;
