use lambda_runtime::Error;
use serde_json::Value;
use tracing::{info, warn};

use crate::actions::status_response;
use crate::state::AppState;

/// Forgets the connection. Room membership is left alone so a participant
/// can reconnect and carry on.
pub async fn handle_disconnect(connection_id: &str, state: &AppState) -> Result<Value, Error> {
    match state.connections.remove_connection(connection_id).await {
        Ok(()) => info!("Connection {} closed", connection_id),
        Err(e) => warn!("Failed to remove connection {}: {}", connection_id, e),
    }
    Ok(status_response(200, None))
}
