pub mod board_rules;
pub mod command_dispatcher;
pub mod errors;
pub mod identity_service;
pub mod player_service;
pub mod rating_service;
pub mod room_coordinator;
pub mod room_locks;
pub mod room_registry;
