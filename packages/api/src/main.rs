use lambda_http::{run, tracing, Error};
use std::env::set_var;

pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;

use gomoku_core::config::CoordinatorConfig;
use gomoku_core::engine::Engine;

#[tokio::main]
async fn main() -> Result<(), Error> {
    set_var("AWS_LAMBDA_HTTP_IGNORE_STAGE_IN_PATH", "true");

    // required to enable CloudWatch error logging by the runtime
    tracing::init_default_subscriber();

    let config = CoordinatorConfig::from_env()?;
    let sdk_config = aws_config::load_from_env().await;
    let engine = Engine::build(&config, &sdk_config).await;

    let app = routes::app(state::AppState { engine });

    run(app).await
}
