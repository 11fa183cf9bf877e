pub mod auth;
pub mod backend;
pub mod board;
pub mod events;
pub mod game_record;
pub mod game_state;
pub mod participant;
pub mod player;
pub mod room;
