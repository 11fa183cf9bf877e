use std::sync::Arc;

use gomoku_core::engine::Engine;
use gomoku_core::repositories::connection_repository::ConnectionRepository;

use crate::broadcast::Broadcaster;

#[derive(Clone)]
pub struct AppState {
    pub engine: Engine,
    pub connections: Arc<dyn ConnectionRepository + Send + Sync>,
    pub broadcaster: Arc<Broadcaster>,
}

impl AppState {
    pub fn new(engine: Engine, connections: Arc<dyn ConnectionRepository + Send + Sync>) -> Self {
        let broadcaster = Arc::new(Broadcaster::new(
            engine.coordinator.clone(),
            connections.clone(),
        ));
        AppState {
            engine,
            connections,
            broadcaster,
        }
    }
}
