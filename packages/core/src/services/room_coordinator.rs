use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::models::backend::Persistence;
use crate::models::board::{Position, Stone};
use crate::models::game_record::GameRecord;
use crate::models::game_state::{GameState, MatchOutcome, MoveRecord};
use crate::models::participant::{Identity, Participant};
use crate::models::player::{PlayerStats, RatingChange};
use crate::models::room::{Room, RoomOptions, RoomSnapshot, RoomStatus, RoomSummary};
use crate::repositories::errors::player_repository_errors::PlayerRepositoryError;
use crate::repositories::errors::state_store_errors::StateStoreError;
use crate::repositories::game_record_repository::GameRecordRepository;
use crate::repositories::player_repository::PlayerRepository;
use crate::repositories::state_store::{game_key, StateStore};
use crate::services::board_rules::{self, Evaluation};
use crate::services::errors::coordinator_errors::CoordinatorError;
use crate::services::rating_service::{self, Rated, Score};
use crate::services::room_locks::RoomLocks;
use crate::services::room_registry::RoomRegistry;

pub const ROOM_CODE_LENGTH: usize = 8;
pub const MAX_CHAT_LENGTH: usize = 500;
pub const DEFAULT_ROOM_LIST_LIMIT: usize = 20;

const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Source of candidate room codes. Collisions are handled by the caller.
pub trait CodeGenerator: Send + Sync {
    fn next_code(&self) -> String;
}

pub struct RandomCodeGenerator;

impl CodeGenerator for RandomCodeGenerator {
    fn next_code(&self) -> String {
        let mut rng = rand::thread_rng();
        (0..ROOM_CODE_LENGTH)
            .map(|_| ROOM_CODE_ALPHABET[rng.gen_range(0..ROOM_CODE_ALPHABET.len())] as char)
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    pub game_state_ttl: Duration,
    pub room_code_attempts: u32,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        CoordinatorSettings {
            game_state_ttl: Duration::from_secs(3600),
            room_code_attempts: 16,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum JoinOutcome {
    Seated {
        room: Room,
        color: Stone,
        snapshot: RoomSnapshot,
        game_started: bool,
    },
    Spectating {
        room: Room,
        snapshot: RoomSnapshot,
        newly_added: bool,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct LeaveOutcome {
    pub room_code: String,
    pub left_seat: Option<Stone>,
    pub was_spectator: bool,
    /// `None` once the room has been deleted.
    pub status: Option<RoomStatus>,
}

impl LeaveOutcome {
    pub fn changed_anything(&self) -> bool {
        self.left_seat.is_some() || self.was_spectator
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MoveOutcome {
    pub room_code: String,
    pub position: Position,
    pub player: Stone,
    pub game_over: bool,
    pub outcome: Option<MatchOutcome>,
    pub next_player: Option<Stone>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RestartOutcome {
    pub room: Room,
    pub current_player: Stone,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SurrenderOutcome {
    pub room_code: String,
    pub loser: Stone,
    pub outcome: MatchOutcome,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultRecord {
    pub room_code: String,
    pub outcome: MatchOutcome,
    pub rating_changes: Vec<RatingChange>,
    pub game_record: Option<GameRecord>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatOutcome {
    pub room_code: String,
    pub sender: Participant,
    pub message: String,
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameHistory {
    pub room_code: String,
    pub status: RoomStatus,
    pub moves: Vec<MoveRecord>,
    pub started_at: Option<DateTime<Utc>>,
    pub outcome: Option<MatchOutcome>,
}

/// The single authority over room and game state.
///
/// Every mutating operation runs inside the room's critical section (see
/// [`RoomLocks`]); operations on different rooms never wait on each other.
/// Creation and player joins additionally hold the participant's lock so the
/// one-active-room check and the claim are not interleaved for one participant.
///
/// Locks only cover this process. Across processes sharing a state backend,
/// game state writes are versioned: a write computed from a state someone
/// else has since replaced fails with [`CoordinatorError::StateConflict`] and
/// changes nothing.
pub struct RoomCoordinator {
    registry: Arc<RoomRegistry>,
    store: Arc<StateStore>,
    players: Option<Arc<dyn PlayerRepository + Send + Sync>>,
    records: Option<Arc<dyn GameRecordRepository + Send + Sync>>,
    codes: Arc<dyn CodeGenerator>,
    locks: RoomLocks,
    settings: CoordinatorSettings,
}

impl RoomCoordinator {
    pub fn new(
        registry: Arc<RoomRegistry>,
        store: Arc<StateStore>,
        settings: CoordinatorSettings,
    ) -> Self {
        RoomCoordinator {
            registry,
            store,
            players: None,
            records: None,
            codes: Arc::new(RandomCodeGenerator),
            locks: RoomLocks::new(),
            settings,
        }
    }

    pub fn with_players(mut self, players: Arc<dyn PlayerRepository + Send + Sync>) -> Self {
        self.players = Some(players);
        self
    }

    pub fn with_game_records(
        mut self,
        records: Arc<dyn GameRecordRepository + Send + Sync>,
    ) -> Self {
        self.records = Some(records);
        self
    }

    pub fn with_code_generator(mut self, codes: Arc<dyn CodeGenerator>) -> Self {
        self.codes = codes;
        self
    }

    pub async fn create_room(
        &self,
        creator: &Participant,
        options: &RoomOptions,
    ) -> Result<Room, CoordinatorError> {
        let _participant_guard = self.locks.participant(&creator.identity).await;

        if let Some(code) = self.registry.active_room_for(creator).await? {
            return Err(CoordinatorError::AlreadyInActiveRoom(code));
        }

        let mode = self.store.current_mode().await;
        for attempt in 1..=self.settings.room_code_attempts {
            let code = self.codes.next_code();
            let mut room = Room::new(&code, creator, options, Persistence::MemoryOnly, mode);
            if !self.registry.insert_new(&mut room).await? {
                debug!("Room code collision on attempt {}", attempt);
                continue;
            }

            if let Err(e) = self.registry.claim_active(&creator.identity, &room).await {
                self.discard(&room).await;
                return Err(e);
            }

            let mut state = GameState::new(Some(creator.identity.clone()));
            if let Err(e) = self.persist_state(&room, &mut state).await {
                self.registry.release_active(&creator.identity, &room).await;
                self.discard(&room).await;
                return Err(e);
            }

            info!(
                "Created room {} for {} ({:?}, {} backend)",
                room.room_code,
                creator.id(),
                room.persistence,
                room.state_backend
            );
            return Ok(room);
        }

        error!(
            "No free room code after {} attempts",
            self.settings.room_code_attempts
        );
        Err(CoordinatorError::RoomCodeSpaceExhausted)
    }

    pub async fn join_room(
        &self,
        participant: &Participant,
        room_code: &str,
        as_spectator: bool,
    ) -> Result<JoinOutcome, CoordinatorError> {
        let _participant_guard = if as_spectator {
            None
        } else {
            Some(self.locks.participant(&participant.identity).await)
        };
        let _room_guard = self.locks.room(room_code).await;

        let mut room = self.registry.get(room_code).await?;
        if room.status.is_terminal() {
            return Err(CoordinatorError::RoomFinished);
        }
        let mut state = self.load_state(&room).await?;
        let identity = &participant.identity;

        if as_spectator {
            if room.seat_of(identity).is_some() {
                return Err(CoordinatorError::AlreadyInRoom);
            }
            let newly_added = state.spectators.insert(identity.clone());
            if newly_added {
                self.persist_state(&room, &mut state).await?;
                info!("{} is spectating room {}", identity.key(), room.room_code);
            }
            let snapshot = snapshot_of(&room, &state);
            return Ok(JoinOutcome::Spectating {
                room,
                snapshot,
                newly_added,
            });
        }

        let Some(color) = [Stone::Black, Stone::White]
            .into_iter()
            .find(|stone| room.seat(*stone).is_none())
        else {
            return Err(CoordinatorError::RoomFull);
        };
        if room.seat_of(identity).is_some() {
            return Err(CoordinatorError::AlreadyInRoom);
        }
        if let Some(other) = self.registry.active_room_for(participant).await? {
            if other != room.room_code {
                return Err(CoordinatorError::AlreadyInActiveRoom(other));
            }
        }

        let previous = room.clone();
        room.set_seat(color, Some(identity.clone()));
        state.seats.set(color, Some(identity.clone()));
        state.spectators.remove(identity);
        let game_started = state.seats.both_filled();
        if game_started {
            room.set_status(RoomStatus::Playing);
            state.start();
        }

        self.registry.claim_active(identity, &room).await?;
        if let Err(e) = self.commit(&previous, &mut room, &mut state).await {
            self.registry.release_active(identity, &room).await;
            return Err(e);
        }

        info!(
            "{} took the {} seat in room {}",
            identity.key(),
            color,
            room.room_code
        );
        let snapshot = snapshot_of(&room, &state);
        Ok(JoinOutcome::Seated {
            room,
            color,
            snapshot,
            game_started,
        })
    }

    /// Leaving is idempotent: a participant who holds nothing in the room
    /// gets an outcome with nothing changed.
    pub async fn leave_room(
        &self,
        participant: &Participant,
        room_code: &str,
    ) -> Result<LeaveOutcome, CoordinatorError> {
        let room_guard = self.locks.room(room_code).await;

        let mut room = self.registry.get(room_code).await?;
        let mut state = match self.load_state(&room).await {
            Ok(state) => state,
            Err(CoordinatorError::CorruptState(reason)) => {
                warn!("Leaving room {} with unusable state: {}", room_code, reason);
                room = self.registry.get(room_code).await?;
                rebuild_state(&room)
            }
            Err(e) => return Err(e),
        };

        let identity = &participant.identity;
        let left_seat = room.seat_of(identity);
        let was_spectator = state.spectators.remove(identity);
        if left_seat.is_none() && !was_spectator {
            debug!("{} holds nothing in room {}", identity.key(), room_code);
            return Ok(LeaveOutcome {
                room_code: room.room_code,
                left_seat: None,
                was_spectator: false,
                status: Some(room.status),
            });
        }

        let previous = room.clone();
        if let Some(color) = left_seat {
            room.set_seat(color, None);
            state.seats.set(color, None);
            if room.status == RoomStatus::Playing {
                info!(
                    "{} left running game in room {}, abandoning it",
                    identity.key(),
                    room.room_code
                );
                room.set_status(RoomStatus::Abandoned);
                state.active = false;
            }
        }

        if room.is_unseated() && room.status != RoomStatus::Playing {
            self.registry.delete(&room).await?;
            if let Err(e) = self
                .store
                .delete(room.state_backend, &game_key(&room.room_code))
                .await
            {
                warn!("Failed to drop game state of {}: {}", room.room_code, e);
            }
            if left_seat.is_some() {
                self.registry.release_active(identity, &room).await;
            }
            drop(room_guard);
            self.locks.prune();
            return Ok(LeaveOutcome {
                room_code: room.room_code,
                left_seat,
                was_spectator,
                status: None,
            });
        }

        self.commit(&previous, &mut room, &mut state).await?;
        if left_seat.is_some() {
            self.registry.release_active(identity, &room).await;
        }
        Ok(LeaveOutcome {
            room_code: room.room_code,
            left_seat,
            was_spectator,
            status: Some(room.status),
        })
    }

    pub async fn make_move(
        &self,
        participant: &Participant,
        room_code: &str,
        row: i64,
        col: i64,
        claimed: Stone,
    ) -> Result<MoveOutcome, CoordinatorError> {
        let _room_guard = self.locks.room(room_code).await;

        let room = self.registry.get(room_code).await?;
        let state = self.load_state(&room).await?;

        if state.seats.get(claimed) != Some(&participant.identity) {
            return Err(CoordinatorError::NotYourSeat);
        }
        if !state.active {
            return Err(CoordinatorError::GameInactive);
        }
        if claimed != state.current_player {
            return Err(CoordinatorError::NotYourTurn);
        }
        let position =
            Position::checked(row, col).ok_or(CoordinatorError::OutOfBounds { row, col })?;

        // The move is worked out on a copy and only becomes visible once persisted.
        let mut next = state.clone();
        if !board_rules::apply_move(&mut next.board, position, claimed) {
            return Err(CoordinatorError::CellOccupied {
                row: position.row,
                col: position.col,
            });
        }
        next.moves.push(MoveRecord {
            row: position.row,
            col: position.col,
            player: claimed,
            played_at: Utc::now(),
        });

        let outcome = match board_rules::evaluate(&next.board, position, claimed) {
            Evaluation::Win { winning_line } => {
                Some(MatchOutcome::five_in_row(claimed, winning_line))
            }
            Evaluation::Draw => Some(MatchOutcome::draw()),
            Evaluation::Continue => None,
        };
        match &outcome {
            Some(finished) => next.finish(finished.clone()),
            None => next.current_player = claimed.opponent(),
        }

        self.persist_state(&room, &mut next).await?;
        if outcome.is_some() {
            info!("Game in room {} is over", room.room_code);
            self.finish_room(&room).await;
        }

        Ok(MoveOutcome {
            room_code: room.room_code,
            position,
            player: claimed,
            game_over: outcome.is_some(),
            next_player: outcome.is_none().then_some(next.current_player),
            outcome,
        })
    }

    /// Starts a fresh game with the same seats. Both seats must be taken.
    pub async fn restart_game(
        &self,
        participant: &Participant,
        room_code: &str,
    ) -> Result<RestartOutcome, CoordinatorError> {
        let _room_guard = self.locks.room(room_code).await;

        let mut room = self.registry.get(room_code).await?;
        if room.seat_of(&participant.identity).is_none() {
            return Err(CoordinatorError::PermissionDenied);
        }
        let (Some(black), Some(white)) = (room.black_player.clone(), room.white_player.clone())
        else {
            return Err(CoordinatorError::WaitingForOpponent);
        };
        let mut state = self.load_state(&room).await?;

        let previous = room.clone();
        room.set_status(RoomStatus::Playing);
        self.registry.claim_active(&black, &room).await?;
        self.registry.claim_active(&white, &room).await?;

        state.seats.set(Stone::Black, Some(black));
        state.seats.set(Stone::White, Some(white));
        state.reset();
        self.commit(&previous, &mut room, &mut state).await?;

        info!("{} restarted room {}", participant.key(), room.room_code);
        Ok(RestartOutcome {
            room,
            current_player: state.current_player,
        })
    }

    pub async fn surrender(
        &self,
        participant: &Participant,
        room_code: &str,
    ) -> Result<SurrenderOutcome, CoordinatorError> {
        let _room_guard = self.locks.room(room_code).await;

        let room = self.registry.get(room_code).await?;
        let loser = room
            .seat_of(&participant.identity)
            .ok_or(CoordinatorError::PermissionDenied)?;
        let state = self.load_state(&room).await?;
        if !state.active {
            return Err(CoordinatorError::GameInactive);
        }

        let outcome = MatchOutcome::surrender(loser.opponent());
        let mut next = state;
        next.finish(outcome.clone());
        self.persist_state(&room, &mut next).await?;
        self.finish_room(&room).await;

        info!("{} surrendered in room {}", participant.key(), room.room_code);
        Ok(SurrenderOutcome {
            room_code: room.room_code,
            loser,
            outcome,
        })
    }

    /// Settles a finished game at most once: marks the room finished, moves
    /// ratings and stats when both seats are registered and stores the game
    /// record for durable rooms. Returns `None` when there is nothing left to
    /// record.
    ///
    /// The recorded marker is written before any stats, so a retry after a
    /// partial failure never applies a result twice.
    pub async fn record_result(
        &self,
        room_code: &str,
    ) -> Result<Option<ResultRecord>, CoordinatorError> {
        let room_guard = self.locks.room(room_code).await;

        let room = self.registry.get(room_code).await?;
        let mut state = self.load_state(&room).await?;
        if state.result_recorded {
            debug!("Result of room {} already recorded", room_code);
            return Ok(None);
        }
        let Some(outcome) = state.outcome.clone() else {
            debug!("Room {} has no finished game to record", room_code);
            return Ok(None);
        };

        state.result_recorded = true;
        self.persist_state(&room, &mut state).await?;
        self.finish_room(&room).await;

        let registered_seats = match (&room.black_player, &room.white_player) {
            (Some(Identity::Registered(black)), Some(Identity::Registered(white))) => {
                Some((black.as_str(), white.as_str()))
            }
            _ => None,
        };

        let rating_changes = match (registered_seats, &self.players) {
            (Some((black, white)), Some(players)) => {
                match self
                    .update_ratings(players.as_ref(), black, white, outcome.winner)
                    .await
                {
                    Ok(changes) => changes,
                    Err(e) => {
                        error!(
                            "Rating update for room {} failed and will not be retried: {}",
                            room.room_code, e
                        );
                        return Err(e);
                    }
                }
            }
            _ => Vec::new(),
        };

        let game_record = match (registered_seats, &self.records) {
            (Some((black, white)), Some(records)) if room.persistence == Persistence::Durable => {
                let record = GameRecord::new(
                    &room.room_code,
                    black,
                    white,
                    outcome.winner,
                    state.moves.clone(),
                    state.started_at.unwrap_or(room.created_at),
                );
                match records.save_record(&record).await {
                    Ok(()) => Some(record),
                    Err(e) => {
                        warn!("Failed to store game record for {}: {}", room.room_code, e);
                        None
                    }
                }
            }
            _ => None,
        };

        drop(room_guard);
        self.locks.prune();

        info!(
            "Recorded result of room {} ({} rating changes)",
            room.room_code,
            rating_changes.len()
        );
        Ok(Some(ResultRecord {
            room_code: room.room_code,
            outcome,
            rating_changes,
            game_record,
        }))
    }

    pub async fn chat(
        &self,
        participant: &Participant,
        room_code: &str,
        message: &str,
    ) -> Result<ChatOutcome, CoordinatorError> {
        let message = message.trim();
        let length = message.chars().count();
        if length == 0 || length > MAX_CHAT_LENGTH {
            return Err(CoordinatorError::InvalidPayload(format!(
                "chat message must be 1 to {} characters",
                MAX_CHAT_LENGTH
            )));
        }

        let room = self.registry.get(room_code).await?;
        let state = self.read_state(&room).await?;
        let identity = &participant.identity;
        if room.seat_of(identity).is_none() && !state.spectators.contains(identity) {
            return Err(CoordinatorError::PermissionDenied);
        }

        Ok(ChatOutcome {
            room_code: room.room_code,
            sender: participant.clone(),
            message: message.to_string(),
            sent_at: Utc::now(),
        })
    }

    pub async fn list_rooms(&self, limit: usize) -> Vec<RoomSummary> {
        self.registry
            .list_public(limit)
            .await
            .iter()
            .map(RoomSummary::from)
            .collect()
    }

    pub async fn snapshot(&self, room_code: &str) -> Result<RoomSnapshot, CoordinatorError> {
        let room = self.registry.get(room_code).await?;
        let state = self.read_state(&room).await?;
        Ok(snapshot_of(&room, &state))
    }

    pub async fn history(&self, room_code: &str) -> Result<GameHistory, CoordinatorError> {
        let room = self.registry.get(room_code).await?;
        let state = self.read_state(&room).await?;
        Ok(GameHistory {
            room_code: room.room_code,
            status: room.status,
            moves: state.moves,
            started_at: state.started_at,
            outcome: state.outcome,
        })
    }

    /// Keys ([`Identity::key`]) of seated players and spectators, the
    /// audience of room broadcasts.
    pub async fn room_members(&self, room_code: &str) -> Result<Vec<String>, CoordinatorError> {
        let room = self.registry.get(room_code).await?;
        let state = self.read_state(&room).await?;
        let seated: Vec<&Identity> = [&room.black_player, &room.white_player]
            .into_iter()
            .flatten()
            .collect();
        let watching: Vec<&Identity> = state
            .spectators
            .iter()
            .filter(|identity| !seated.contains(identity))
            .collect();
        Ok(seated
            .into_iter()
            .chain(watching)
            .map(Identity::key)
            .collect())
    }

    async fn update_ratings(
        &self,
        players: &(dyn PlayerRepository + Send + Sync),
        black_id: &str,
        white_id: &str,
        winner: Option<Stone>,
    ) -> Result<Vec<RatingChange>, CoordinatorError> {
        let mut black = load_player(players, black_id).await?;
        let mut white = load_player(players, white_id).await?;

        let black_score = match winner {
            Some(Stone::Black) => Score::Win,
            Some(Stone::White) => Score::Loss,
            None => Score::Draw,
        };
        let (black_rating, white_rating) = rating_service::rate_match(
            Rated {
                rating: black.rating,
                games_played: black.games_played,
            },
            Rated {
                rating: white.rating,
                games_played: white.games_played,
            },
            black_score,
        );

        let changes = vec![
            black.apply_result(black_rating, black_score),
            white.apply_result(white_rating, black_score.opposite()),
        ];
        players.save_player(&black).await?;
        players.save_player(&white).await?;
        Ok(changes)
    }

    /// Reads the room's game state for a mutating operation.
    ///
    /// A waiting or finished room whose state has expired gets a fresh one
    /// built from its seats. A running room without usable state is marked
    /// abandoned and the operation fails.
    async fn load_state(&self, room: &Room) -> Result<GameState, CoordinatorError> {
        let key = game_key(&room.room_code);
        match self.store.get_json::<GameState>(room.state_backend, &key).await {
            Ok(Some(state)) => Ok(state),
            Ok(None) if room.status != RoomStatus::Playing => Ok(rebuild_state(room)),
            Ok(None) => {
                self.mark_unusable(room).await;
                Err(CoordinatorError::CorruptState(format!(
                    "game state of room {} is missing",
                    room.room_code
                )))
            }
            Err(StateStoreError::Serialization(reason)) => {
                self.mark_unusable(room).await;
                Err(CoordinatorError::CorruptState(reason))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Unsynchronised read for snapshots and chat; never mutates.
    async fn read_state(&self, room: &Room) -> Result<GameState, CoordinatorError> {
        let key = game_key(&room.room_code);
        Ok(self
            .store
            .get_json::<GameState>(room.state_backend, &key)
            .await?
            .unwrap_or_else(|| rebuild_state(room)))
    }

    /// Writes `state` as the successor of the version it was read at and
    /// bumps `state.version` on success.
    async fn persist_state(
        &self,
        room: &Room,
        state: &mut GameState,
    ) -> Result<(), CoordinatorError> {
        let expected = state.version;
        state.version = expected + 1;
        let written = self
            .store
            .set_json_if_version(
                room.state_backend,
                &game_key(&room.room_code),
                &*state,
                expected,
                self.settings.game_state_ttl,
            )
            .await;
        match written {
            Ok(true) => Ok(()),
            Ok(false) => {
                state.version = expected;
                warn!(
                    "Game state of room {} changed since version {}",
                    room.room_code, expected
                );
                Err(CoordinatorError::StateConflict)
            }
            Err(e) => {
                state.version = expected;
                Err(e.into())
            }
        }
    }

    /// Writes the game state, then the room. If the room cannot be saved the
    /// game state goes back to how it was read.
    async fn commit(
        &self,
        previous: &Room,
        room: &mut Room,
        state: &mut GameState,
    ) -> Result<(), CoordinatorError> {
        let mut restored = state.clone();
        self.persist_state(room, state).await?;
        if let Err(e) = self.registry.save(previous, room).await {
            restored.version = state.version;
            if let Err(revert) = self.persist_state(room, &mut restored).await {
                error!("Could not revert game state of {}: {}", room.room_code, revert);
            }
            return Err(e);
        }
        Ok(())
    }

    async fn finish_room(&self, room: &Room) {
        if room.status == RoomStatus::Finished {
            return;
        }
        let mut finished = room.clone();
        finished.set_status(RoomStatus::Finished);
        if let Err(e) = self.registry.save(room, &mut finished).await {
            warn!("Failed to mark room {} finished: {}", room.room_code, e);
            return;
        }
        for identity in [&room.black_player, &room.white_player].into_iter().flatten() {
            self.registry.release_active(identity, room).await;
        }
    }

    async fn mark_unusable(&self, room: &Room) {
        error!("Room {} has unusable game state, abandoning it", room.room_code);
        if room.status.is_terminal() {
            return;
        }
        let mut abandoned = room.clone();
        abandoned.set_status(RoomStatus::Abandoned);
        if let Err(e) = self.registry.save(room, &mut abandoned).await {
            warn!("Failed to abandon room {}: {}", room.room_code, e);
        }
    }

    async fn discard(&self, room: &Room) {
        if let Err(e) = self.registry.delete(room).await {
            warn!("Failed to discard room {}: {}", room.room_code, e);
        }
    }
}

async fn load_player(
    players: &(dyn PlayerRepository + Send + Sync),
    player_id: &str,
) -> Result<PlayerStats, CoordinatorError> {
    match players.get_player(player_id).await {
        Ok(player) => Ok(player),
        Err(PlayerRepositoryError::NotFound) => {
            debug!("No stats for {} yet, starting fresh", player_id);
            Ok(PlayerStats::new(player_id, player_id))
        }
        Err(e) => Err(e.into()),
    }
}

fn rebuild_state(room: &Room) -> GameState {
    let mut state = GameState::new(room.black_player.clone());
    state.seats.set(Stone::White, room.white_player.clone());
    state
}

fn snapshot_of(room: &Room, state: &GameState) -> RoomSnapshot {
    RoomSnapshot {
        room_code: room.room_code.clone(),
        name: room.name.clone(),
        status: room.status,
        board: state.board.clone(),
        current_player: state.current_player,
        game_active: state.active,
        black_player_id: room.black_player.as_ref().map(|id| id.id().to_string()),
        white_player_id: room.white_player.as_ref().map(|id| id.id().to_string()),
        spectator_count: state.spectators.len(),
        created_at: room.created_at,
    }
}
