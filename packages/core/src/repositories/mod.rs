pub mod connection_repository;
pub mod dynamodb_state_backend;
pub mod errors;
pub mod game_record_repository;
pub mod in_memory_state_backend;
pub mod player_repository;
pub mod room_repository;
pub mod state_store;
