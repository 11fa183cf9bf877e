use aws_lambda_events::apigw::ApiGatewayWebsocketProxyRequest;
use lambda_runtime::Error;
use serde_json::{json, Value};
use tracing::{debug, error, warn};

use crate::actions::status_response;
use crate::state::AppState;

pub async fn handle_default_message(
    event: &ApiGatewayWebsocketProxyRequest,
    connection_id: &str,
    state: &AppState,
) -> Result<Value, Error> {
    let record = match state.connections.get_connection(connection_id).await {
        Ok(Some(record)) => record,
        Ok(None) => {
            warn!("Message on unknown connection {}", connection_id);
            return Ok(status_response(
                401,
                Some(json!({"error": "Unknown connection"})),
            ));
        }
        Err(e) => {
            error!("Failed to load connection {}: {}", connection_id, e);
            return Ok(status_response(
                500,
                Some(json!({"error": "Failed to load connection"})),
            ));
        }
    };

    let body = event.body.as_deref().unwrap_or_default();
    debug!("Command from {} on {}: {}", record.participant_id, connection_id, body);

    let deliveries = state
        .engine
        .dispatcher
        .dispatch_raw(&record.participant, body)
        .await;
    let sent = state.broadcaster.deliver(connection_id, &deliveries).await;
    debug!("Posted {} message(s) for {}", sent, connection_id);

    Ok(status_response(200, None))
}
