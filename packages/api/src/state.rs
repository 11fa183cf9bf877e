use gomoku_core::engine::Engine;

#[derive(Clone)]
pub struct AppState {
    pub engine: Engine,
}
