use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::models::board::Stone;
use crate::models::events::{Command, Delivery, Event};
use crate::models::game_state::MatchOutcome;
use crate::models::participant::Participant;
use crate::models::room::{RoomOptions, RoomSummary};
use crate::services::errors::coordinator_errors::{CoordinatorError, ErrorCategory};
use crate::services::room_coordinator::{JoinOutcome, RoomCoordinator};

/// Transport-facing seam: turns an inbound [`Command`] into coordinator calls
/// and the addressed [`Event`]s the transport has to deliver.
#[derive(Clone)]
pub struct CommandDispatcher {
    coordinator: Arc<RoomCoordinator>,
}

impl CommandDispatcher {
    pub fn new(coordinator: Arc<RoomCoordinator>) -> Self {
        CommandDispatcher { coordinator }
    }

    pub fn coordinator(&self) -> &Arc<RoomCoordinator> {
        &self.coordinator
    }

    /// Parses a framed message body and dispatches it. A body that is not a
    /// known command is answered with an `InvalidPayload` room error.
    pub async fn dispatch_raw(&self, participant: &Participant, body: &str) -> Vec<Delivery> {
        match serde_json::from_str::<Command>(body) {
            Ok(command) => self.dispatch(participant, command).await,
            Err(e) => {
                let action = serde_json::from_str::<serde_json::Value>(body)
                    .ok()
                    .and_then(|value| value.get("action")?.as_str().map(str::to_string))
                    .unwrap_or_else(|| "unknown".to_string());
                debug!("Rejected payload from {}: {}", participant.id(), e);
                let error = CoordinatorError::InvalidPayload(e.to_string());
                vec![Delivery::caller(Event::RoomError {
                    command: action,
                    kind: error.kind().to_string(),
                    message: error.to_string(),
                })]
            }
        }
    }

    pub async fn dispatch(&self, participant: &Participant, command: Command) -> Vec<Delivery> {
        match self.execute(participant, &command).await {
            Ok(deliveries) => deliveries,
            Err(e) => {
                if e.category() == ErrorCategory::Fatal {
                    warn!("{} from {} failed: {}", command.name(), participant.id(), e);
                } else {
                    debug!("{} from {} rejected: {}", command.name(), participant.id(), e);
                }
                vec![Delivery::caller(error_event(&command, &e))]
            }
        }
    }

    async fn execute(
        &self,
        participant: &Participant,
        command: &Command,
    ) -> Result<Vec<Delivery>, CoordinatorError> {
        match command {
            Command::CreateRoom {
                name,
                is_private,
                time_limit_minutes,
            } => {
                let options = RoomOptions {
                    name: name.clone(),
                    is_private: *is_private,
                    time_limit_minutes: *time_limit_minutes,
                };
                let room = self.coordinator.create_room(participant, &options).await?;
                Ok(vec![Delivery::caller(Event::RoomCreated {
                    room_id: room.room_code.clone(),
                    room: RoomSummary::from(&room),
                    color: Stone::Black,
                })])
            }
            Command::JoinRoom {
                room_id,
                as_spectator,
            } => {
                let joined = self
                    .coordinator
                    .join_room(participant, room_id, *as_spectator)
                    .await?;
                Ok(join_deliveries(participant, room_id, joined))
            }
            Command::LeaveRoom { room_id } => {
                let left = self.coordinator.leave_room(participant, room_id).await?;
                let mut deliveries = vec![Delivery::caller(Event::RoomLeft {
                    room_id: room_id.clone(),
                })];
                if let (true, Some(status)) = (left.changed_anything(), left.status) {
                    deliveries.push(Delivery::room(
                        room_id,
                        Event::PlayerLeft {
                            room_id: room_id.clone(),
                            participant_id: participant.id().to_string(),
                            status,
                        },
                    ));
                }
                Ok(deliveries)
            }
            Command::MakeMove {
                room_id,
                row,
                col,
                player,
            } => {
                let played = self
                    .coordinator
                    .make_move(participant, room_id, *row, *col, *player)
                    .await?;
                let mut deliveries = vec![Delivery::room(
                    room_id,
                    Event::MoveMade {
                        room_id: room_id.clone(),
                        row: played.position.row,
                        col: played.position.col,
                        player: played.player,
                        next_player: played.next_player,
                    },
                )];
                if let Some(outcome) = played.outcome {
                    deliveries.push(self.game_over(room_id, outcome).await);
                }
                Ok(deliveries)
            }
            Command::RestartGame { room_id } => {
                let restarted = self.coordinator.restart_game(participant, room_id).await?;
                Ok(vec![Delivery::room(
                    room_id,
                    Event::GameRestart {
                        room_id: room_id.clone(),
                        restarted_by: participant.id().to_string(),
                        current_player: restarted.current_player,
                    },
                )])
            }
            Command::Surrender { room_id } => {
                let surrendered = self.coordinator.surrender(participant, room_id).await?;
                Ok(vec![self.game_over(room_id, surrendered.outcome).await])
            }
            Command::ChatMessage { room_id, message } => {
                let chat = self.coordinator.chat(participant, room_id, message).await?;
                Ok(vec![Delivery::room(
                    room_id,
                    Event::ChatMessage {
                        room_id: chat.room_code,
                        sender_id: chat.sender.id().to_string(),
                        display_name: chat.sender.display_name,
                        message: chat.message,
                        sent_at: chat.sent_at,
                    },
                )])
            }
        }
    }

    /// Settles the game and builds the `gameOver` broadcast. A failure to
    /// record does not hold back the broadcast.
    async fn game_over(&self, room_id: &str, outcome: MatchOutcome) -> Delivery {
        let rating_changes = match self.coordinator.record_result(room_id).await {
            Ok(Some(recorded)) => recorded.rating_changes,
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!("Recording result of room {} failed: {}", room_id, e);
                Vec::new()
            }
        };
        info!("Game over in room {}: {:?}", room_id, outcome.winner);
        Delivery::room(
            room_id,
            Event::GameOver {
                room_id: room_id.to_string(),
                winner: outcome.winner,
                winning_line: outcome.winning_line,
                reason: outcome.reason,
                rating_changes,
            },
        )
    }
}

fn join_deliveries(participant: &Participant, room_id: &str, joined: JoinOutcome) -> Vec<Delivery> {
    match joined {
        JoinOutcome::Spectating {
            snapshot,
            newly_added,
            ..
        } => {
            let mut deliveries = vec![Delivery::caller(Event::SpectatorJoined {
                room_id: room_id.to_string(),
                snapshot,
            })];
            if newly_added {
                deliveries.push(Delivery::room_except(
                    room_id,
                    &participant.key(),
                    Event::SpectatorEntered {
                        room_id: room_id.to_string(),
                        participant_id: participant.id().to_string(),
                        display_name: participant.display_name.clone(),
                    },
                ));
            }
            deliveries
        }
        JoinOutcome::Seated {
            room,
            color,
            snapshot,
            game_started,
        } => {
            let mut deliveries = vec![
                Delivery::caller(Event::RoomJoined {
                    room_id: room_id.to_string(),
                    color,
                    snapshot,
                }),
                Delivery::room_except(
                    room_id,
                    &participant.key(),
                    Event::PlayerJoined {
                        room_id: room_id.to_string(),
                        participant_id: participant.id().to_string(),
                        display_name: participant.display_name.clone(),
                        color,
                    },
                ),
            ];
            if let (true, Some(black), Some(white)) =
                (game_started, &room.black_player, &room.white_player)
            {
                deliveries.push(Delivery::room(
                    room_id,
                    Event::GameStart {
                        room_id: room_id.to_string(),
                        black_player_id: black.id().to_string(),
                        white_player_id: white.id().to_string(),
                        current_player: Stone::Black,
                    },
                ));
            }
            deliveries
        }
    }
}

fn error_event(command: &Command, error: &CoordinatorError) -> Event {
    let command_name = command.name().to_string();
    let kind = error.kind().to_string();
    let message = error.to_string();
    if command.is_game_command() {
        Event::GameError {
            command: command_name,
            kind,
            message,
        }
    } else {
        Event::RoomError {
            command: command_name,
            kind,
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::events::Audience;
    use crate::models::game_state::EndReason;
    use crate::models::room::RoomStatus;
    use crate::repositories::in_memory_state_backend::InMemoryStateBackend;
    use crate::repositories::state_store::{StateStore, StateStoreSettings};
    use crate::services::room_coordinator::CoordinatorSettings;
    use crate::services::room_registry::RoomRegistry;
    use std::time::Duration;

    fn dispatcher() -> CommandDispatcher {
        let store = Arc::new(StateStore::in_process(
            Arc::new(InMemoryStateBackend::new()),
            StateStoreSettings::default(),
        ));
        let registry = Arc::new(RoomRegistry::new(None, store.clone(), Duration::from_secs(600)));
        CommandDispatcher::new(Arc::new(RoomCoordinator::new(
            registry,
            store,
            CoordinatorSettings::default(),
        )))
    }

    fn alice() -> Participant {
        Participant::guest("g-alice", "Alice")
    }

    fn bob() -> Participant {
        Participant::guest("g-bob", "Bob")
    }

    async fn create(dispatcher: &CommandDispatcher) -> String {
        let deliveries = dispatcher
            .dispatch_raw(&alice(), r#"{"action":"createRoom","name":"Lobby"}"#)
            .await;
        match &deliveries[0].event {
            Event::RoomCreated { room_id, room, color } => {
                assert_eq!(room.name, "Lobby");
                assert_eq!(*color, Stone::Black);
                room_id.clone()
            }
            other => panic!("expected roomCreated, got {:?}", other),
        }
    }

    fn count(deliveries: &[Delivery], name: &str) -> usize {
        deliveries
            .iter()
            .filter(|delivery| {
                serde_json::to_value(&delivery.event).unwrap()["event"] == name
            })
            .count()
    }

    #[tokio::test]
    async fn test_join_emits_room_joined_and_game_start_once() {
        let dispatcher = dispatcher();
        let room_id = create(&dispatcher).await;

        let deliveries = dispatcher
            .dispatch(
                &bob(),
                Command::JoinRoom {
                    room_id: room_id.clone(),
                    as_spectator: false,
                },
            )
            .await;

        assert_eq!(count(&deliveries, "roomJoined"), 1);
        assert_eq!(count(&deliveries, "playerJoined"), 1);
        assert_eq!(count(&deliveries, "gameStart"), 1);
        assert_eq!(deliveries[0].audience, Audience::Caller);
        assert_eq!(
            deliveries[1].audience,
            Audience::RoomExcept {
                room_id: room_id.clone(),
                participant_id: "guest:g-bob".to_string(),
            }
        );
        assert_eq!(deliveries[2].audience, Audience::Room(room_id));
    }

    #[tokio::test]
    async fn test_create_room_options_reach_the_room() {
        let dispatcher = dispatcher();

        dispatcher
            .dispatch_raw(
                &alice(),
                r#"{"action":"createRoom","name":"Hidden","isPrivate":true,"timeLimit":10}"#,
            )
            .await;
        dispatcher
            .dispatch_raw(&bob(), r#"{"action":"createRoom","name":"Open"}"#)
            .await;

        let listed: Vec<String> = dispatcher
            .coordinator()
            .list_rooms(20)
            .await
            .into_iter()
            .map(|summary| summary.name)
            .collect();
        assert_eq!(listed, vec!["Open".to_string()]);
    }

    #[tokio::test]
    async fn test_rejected_move_is_a_game_error_for_the_caller() {
        let dispatcher = dispatcher();
        let room_id = create(&dispatcher).await;

        let deliveries = dispatcher
            .dispatch(
                &alice(),
                Command::MakeMove {
                    room_id,
                    row: 7,
                    col: 7,
                    player: Stone::Black,
                },
            )
            .await;

        assert_eq!(
            deliveries,
            vec![Delivery::caller(Event::GameError {
                command: "makeMove".to_string(),
                kind: "GameInactive".to_string(),
                message: CoordinatorError::GameInactive.to_string(),
            })]
        );
    }

    #[tokio::test]
    async fn test_malformed_payload() {
        let dispatcher = dispatcher();

        let deliveries = dispatcher
            .dispatch_raw(&alice(), r#"{"action":"makeMove","roomId":"X"}"#)
            .await;

        match &deliveries[..] {
            [Delivery {
                audience: Audience::Caller,
                event: Event::RoomError { command, kind, .. },
            }] => {
                assert_eq!(command, "makeMove");
                assert_eq!(kind, "InvalidPayload");
            }
            other => panic!("unexpected deliveries {:?}", other),
        }

        let garbage = dispatcher.dispatch_raw(&alice(), "not json").await;
        assert!(matches!(
            &garbage[0].event,
            Event::RoomError { command, .. } if command == "unknown"
        ));
    }

    #[tokio::test]
    async fn test_surrender_broadcasts_game_over() {
        let dispatcher = dispatcher();
        let room_id = create(&dispatcher).await;
        dispatcher
            .dispatch(
                &bob(),
                Command::JoinRoom {
                    room_id: room_id.clone(),
                    as_spectator: false,
                },
            )
            .await;

        let deliveries = dispatcher
            .dispatch(&alice(), Command::Surrender { room_id: room_id.clone() })
            .await;

        assert_eq!(
            deliveries,
            vec![Delivery::room(
                &room_id,
                Event::GameOver {
                    room_id: room_id.clone(),
                    winner: Some(Stone::White),
                    winning_line: None,
                    reason: EndReason::Surrender,
                    rating_changes: Vec::new(),
                },
            )]
        );
    }

    #[tokio::test]
    async fn test_leave_notifies_room() {
        let dispatcher = dispatcher();
        let room_id = create(&dispatcher).await;
        dispatcher
            .dispatch(
                &bob(),
                Command::JoinRoom {
                    room_id: room_id.clone(),
                    as_spectator: false,
                },
            )
            .await;

        let deliveries = dispatcher
            .dispatch(&bob(), Command::LeaveRoom { room_id: room_id.clone() })
            .await;

        assert_eq!(count(&deliveries, "roomLeft"), 1);
        assert!(deliveries.contains(&Delivery::room(
            &room_id,
            Event::PlayerLeft {
                room_id: room_id.clone(),
                participant_id: "g-bob".to_string(),
                status: RoomStatus::Abandoned,
            },
        )));
    }

    #[tokio::test]
    async fn test_chat_is_broadcast() {
        let dispatcher = dispatcher();
        let room_id = create(&dispatcher).await;

        let deliveries = dispatcher
            .dispatch_raw(
                &alice(),
                &format!(r#"{{"action":"chatMessage","roomId":"{}","message":" hi "}}"#, room_id),
            )
            .await;

        match &deliveries[..] {
            [Delivery {
                audience: Audience::Room(target),
                event: Event::ChatMessage {
                    message,
                    display_name,
                    ..
                },
            }] => {
                assert_eq!(target, &room_id);
                assert_eq!(message, "hi");
                assert_eq!(display_name, "Alice");
            }
            other => panic!("unexpected deliveries {:?}", other),
        }
    }
}
