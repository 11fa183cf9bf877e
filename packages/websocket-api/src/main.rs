use aws_lambda_events::apigw::ApiGatewayWebsocketProxyRequest;
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use serde_json::{json, Value};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use gomoku_core::config::CoordinatorConfig;
use gomoku_core::engine::Engine;

mod actions;
mod broadcast;
mod state;

use actions::connect::handle_connect;
use actions::default::handle_default_message;
use actions::disconnect::handle_disconnect;
use actions::status_response;
use state::AppState;

#[tokio::main]
async fn main() -> Result<(), Error> {
    // required to enable CloudWatch error logging by the runtime
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .without_time()
        .init();

    let config = CoordinatorConfig::from_env()?;
    let sdk_config = aws_config::load_from_env().await;
    let engine = Engine::build(&config, &sdk_config).await;
    let connections = engine
        .connections
        .clone()
        .ok_or_else(|| Error::from("PLAYER_CONNECTIONS_TABLE must be set for the WebSocket API"))?;
    let app_state = AppState::new(engine, connections);
    info!("WebSocket API ready");

    run(service_fn(
        |event: LambdaEvent<ApiGatewayWebsocketProxyRequest>| {
            websocket_handler(event, app_state.clone())
        },
    ))
    .await
}

async fn websocket_handler(
    event: LambdaEvent<ApiGatewayWebsocketProxyRequest>,
    state: AppState,
) -> Result<Value, Error> {
    let request = event.payload;
    let route_key = request.request_context.route_key.as_deref().unwrap_or_default();
    let Some(connection_id) = request.request_context.connection_id.as_deref() else {
        error!("WebSocket event without a connection id on {}", route_key);
        return Ok(status_response(
            400,
            Some(json!({"error": "Missing connection id"})),
        ));
    };
    debug!("Route {} on connection {}", route_key, connection_id);

    match route_key {
        "$connect" => handle_connect(&request, connection_id, &state).await,
        "$disconnect" => handle_disconnect(connection_id, &state).await,
        "$default" => handle_default_message(&request, connection_id, &state).await,
        _ => {
            error!("Unknown route key: {}", route_key);
            Ok(status_response(400, Some(json!({"error": "Unknown route"}))))
        }
    }
}
