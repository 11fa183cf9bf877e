pub mod coordinator_errors;
pub mod identity_errors;
pub mod player_service_errors;
