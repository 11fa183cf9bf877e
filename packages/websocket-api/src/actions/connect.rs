use aws_lambda_events::apigw::ApiGatewayWebsocketProxyRequest;
use lambda_runtime::Error;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use gomoku_core::repositories::connection_repository::ConnectionRecord;
use gomoku_core::services::errors::identity_errors::IdentityError;

use crate::actions::status_response;
use crate::state::AppState;

/// Resolves the connection's credential and remembers who owns the
/// connection. Unauthenticated connections are refused.
pub async fn handle_connect(
    event: &ApiGatewayWebsocketProxyRequest,
    connection_id: &str,
    state: &AppState,
) -> Result<Value, Error> {
    let credential = event
        .query_string_parameters
        .first("token")
        .map(str::to_string)
        .or_else(|| {
            event
                .headers
                .get("authorization")
                .and_then(|value| value.to_str().ok())
                .and_then(bearer_token)
                .map(str::to_string)
        });

    let participant = match state.engine.identity.resolve(credential.as_deref()).await {
        Ok(participant) => participant,
        Err(IdentityError::Lookup(msg)) => {
            error!("Account lookup failed for connection {}: {}", connection_id, msg);
            return Ok(status_response(
                503,
                Some(json!({"error": "Account lookup unavailable"})),
            ));
        }
        Err(e) => {
            warn!("Refused connection {}: {}", connection_id, e);
            return Ok(status_response(401, Some(json!({"error": e.to_string()}))));
        }
    };

    let record = ConnectionRecord::new(connection_id, &participant);
    if let Err(e) = state.connections.store_connection(&record).await {
        error!("Failed to store connection {}: {}", connection_id, e);
        return Ok(status_response(
            500,
            Some(json!({"error": "Failed to store connection"})),
        ));
    }

    info!(
        "Connection {} opened by {} ({})",
        connection_id,
        participant.id(),
        if participant.is_guest() { "guest" } else { "registered" }
    );
    Ok(status_response(200, None))
}

fn bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}
