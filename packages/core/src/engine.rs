use aws_config::SdkConfig;
use std::sync::Arc;
use tracing::info;

use crate::config::CoordinatorConfig;
use crate::repositories::connection_repository::{
    ConnectionRepository, DynamoDbConnectionRepository,
};
use crate::repositories::dynamodb_state_backend::DynamoDbStateBackend;
use crate::repositories::game_record_repository::{
    DynamoDbGameRecordRepository, GameRecordRepository,
};
use crate::repositories::in_memory_state_backend::InMemoryStateBackend;
use crate::repositories::player_repository::{DynamoDbPlayerRepository, PlayerRepository};
use crate::repositories::room_repository::{DynamoDbRoomRepository, RoomRepository};
use crate::repositories::state_store::{StateBackend, StateStore};
use crate::services::command_dispatcher::CommandDispatcher;
use crate::services::identity_service::{IdentityService, JwtAuthCollaborator};
use crate::services::player_service::PlayerService;
use crate::services::room_coordinator::RoomCoordinator;
use crate::services::room_registry::RoomRegistry;

/// The wired-up services one process runs with.
#[derive(Clone)]
pub struct Engine {
    pub coordinator: Arc<RoomCoordinator>,
    pub dispatcher: Arc<CommandDispatcher>,
    pub identity: Arc<IdentityService>,
    pub players: Arc<PlayerService>,
    pub connections: Option<Arc<dyn ConnectionRepository + Send + Sync>>,
}

impl Engine {
    /// Builds the engine against DynamoDB, using whichever tables are configured.
    pub async fn build(config: &CoordinatorConfig, sdk_config: &SdkConfig) -> Self {
        let dynamodb = aws_sdk_dynamodb::Client::new(sdk_config);

        let external: Option<Arc<dyn StateBackend>> =
            config.game_state_table.as_deref().map(|table| {
                Arc::new(DynamoDbStateBackend::new(dynamodb.clone(), table)) as Arc<dyn StateBackend>
            });
        let store = Arc::new(
            StateStore::select(
                config.state_backend,
                external,
                Arc::new(InMemoryStateBackend::new()),
                config.store_settings(),
            )
            .await,
        );

        let rooms: Option<Arc<dyn RoomRepository + Send + Sync>> =
            config.rooms_table.as_deref().map(|table| {
                Arc::new(DynamoDbRoomRepository::new(
                    dynamodb.clone(),
                    table,
                    config.durable_probe_interval,
                )) as Arc<dyn RoomRepository + Send + Sync>
            });
        let players: Option<Arc<dyn PlayerRepository + Send + Sync>> =
            config.players_table.as_deref().map(|table| {
                Arc::new(DynamoDbPlayerRepository::new(dynamodb.clone(), table))
                    as Arc<dyn PlayerRepository + Send + Sync>
            });
        let records: Option<Arc<dyn GameRecordRepository + Send + Sync>> =
            config.game_records_table.as_deref().map(|table| {
                Arc::new(DynamoDbGameRecordRepository::new(dynamodb.clone(), table))
                    as Arc<dyn GameRecordRepository + Send + Sync>
            });

        let connections = config.connections_table.as_deref().map(|table| {
            let mut api_gateway_config = aws_sdk_apigatewaymanagement::config::Builder::from(sdk_config);
            if let Some(endpoint) = &config.websocket_endpoint {
                api_gateway_config = api_gateway_config.endpoint_url(endpoint);
            }
            let api_gateway =
                aws_sdk_apigatewaymanagement::Client::from_conf(api_gateway_config.build());
            Arc::new(DynamoDbConnectionRepository::new(
                dynamodb.clone(),
                api_gateway,
                table,
            )) as Arc<dyn ConnectionRepository + Send + Sync>
        });

        info!(
            "Engine tables: rooms={:?} players={:?} records={:?} connections={:?}",
            config.rooms_table,
            config.players_table,
            config.game_records_table,
            config.connections_table
        );
        Self::assemble(config, store, rooms, players, records, connections)
    }

    /// Wires the services over already constructed stores.
    pub fn assemble(
        config: &CoordinatorConfig,
        store: Arc<StateStore>,
        rooms: Option<Arc<dyn RoomRepository + Send + Sync>>,
        players: Option<Arc<dyn PlayerRepository + Send + Sync>>,
        records: Option<Arc<dyn GameRecordRepository + Send + Sync>>,
        connections: Option<Arc<dyn ConnectionRepository + Send + Sync>>,
    ) -> Self {
        let registry = Arc::new(RoomRegistry::new(rooms, store.clone(), config.room_ttl));

        let mut coordinator =
            RoomCoordinator::new(registry, store, config.coordinator_settings());
        if let Some(players) = &players {
            coordinator = coordinator.with_players(players.clone());
        }
        if let Some(records) = records {
            coordinator = coordinator.with_game_records(records);
        }
        let coordinator = Arc::new(coordinator);

        let auth = Arc::new(JwtAuthCollaborator::new(&config.jwt_secret, players.clone()));

        Engine {
            dispatcher: Arc::new(CommandDispatcher::new(coordinator.clone())),
            coordinator,
            identity: Arc::new(IdentityService::new(auth)),
            players: Arc::new(PlayerService::new(players)),
            connections,
        }
    }
}
