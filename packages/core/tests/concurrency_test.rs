mod common;

use std::sync::Arc;

use gomoku_core::engine::Engine;
use gomoku_core::models::backend::BackendSelection;
use gomoku_core::models::board::Stone;
use gomoku_core::models::participant::Participant;
use gomoku_core::models::room::RoomOptions;
use gomoku_core::repositories::in_memory_state_backend::InMemoryStateBackend;
use gomoku_core::repositories::state_store::{StateBackend, StateStore};
use gomoku_core::services::errors::coordinator_errors::CoordinatorError;
use gomoku_core::services::room_coordinator::{JoinOutcome, RoomCoordinator};

use common::{fast_store_settings, guest_engine, test_config, SwitchableBackend};

/// An engine as a separate process would build it, on a shared external backend.
async fn engine_on(shared: &SwitchableBackend) -> Engine {
    let store = StateStore::select(
        BackendSelection::External,
        Some(Arc::new(shared.clone()) as Arc<dyn StateBackend>),
        Arc::new(InMemoryStateBackend::new()),
        fast_store_settings(),
    )
    .await;
    Engine::assemble(&test_config(), Arc::new(store), None, None, None, None)
}

async fn playing_room(coordinator: &RoomCoordinator, black: &Participant, white: &Participant) -> String {
    let room = coordinator
        .create_room(black, &RoomOptions::default())
        .await
        .unwrap();
    coordinator
        .join_room(white, &room.room_code, false)
        .await
        .unwrap();
    room.room_code
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_identical_moves_only_one_wins() {
    let engine = guest_engine();

    for round in 0..25 {
        let black = Participant::guest(&format!("g-black-{}", round), "Black");
        let white = Participant::guest(&format!("g-white-{}", round), "White");
        let code = playing_room(&engine.coordinator, &black, &white).await;

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let coordinator = Arc::clone(&engine.coordinator);
                let black = black.clone();
                let code = code.clone();
                tokio::spawn(async move {
                    coordinator.make_move(&black, &code, 7, 7, Stone::Black).await
                })
            })
            .collect();

        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap());
        }

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        for result in results.iter().filter_map(|r| r.as_ref().err()) {
            assert!(matches!(
                result,
                CoordinatorError::NotYourTurn | CoordinatorError::CellOccupied { .. }
            ));
        }
        let snapshot = engine.coordinator.snapshot(&code).await.unwrap();
        assert_eq!(snapshot.board.occupied_count(), 1);
        assert_eq!(snapshot.current_player, Stone::White);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_moves_through_two_engines_on_one_backend_apply_once() {
    let shared = SwitchableBackend::new();
    let first = engine_on(&shared).await;
    let second = engine_on(&shared).await;

    for round in 0..25 {
        let black = Participant::guest(&format!("g-black-{}", round), "Black");
        let white = Participant::guest(&format!("g-white-{}", round), "White");
        let room = first
            .coordinator
            .create_room(&black, &RoomOptions::default())
            .await
            .unwrap();
        let code = room.room_code;
        second
            .coordinator
            .join_room(&white, &code, false)
            .await
            .unwrap();

        let handles: Vec<_> = [(&first, 7), (&second, 8)]
            .into_iter()
            .map(|(engine, col)| {
                let coordinator = Arc::clone(&engine.coordinator);
                let black = black.clone();
                let code = code.clone();
                tokio::spawn(async move {
                    coordinator.make_move(&black, &code, 7, col, Stone::Black).await
                })
            })
            .collect();

        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap());
        }

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        for result in results.iter().filter_map(|r| r.as_ref().err()) {
            assert!(matches!(
                result,
                CoordinatorError::StateConflict | CoordinatorError::NotYourTurn
            ));
        }
        for engine in [&first, &second] {
            let snapshot = engine.coordinator.snapshot(&code).await.unwrap();
            assert_eq!(snapshot.board.occupied_count(), 1);
            assert_eq!(snapshot.current_player, Stone::White);
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_both_colours_for_one_cell() {
    let engine = guest_engine();
    let black = Participant::guest("g-black", "Black");
    let white = Participant::guest("g-white", "White");
    let code = playing_room(&engine.coordinator, &black, &white).await;

    let black_move = {
        let coordinator = Arc::clone(&engine.coordinator);
        let code = code.clone();
        tokio::spawn(async move { coordinator.make_move(&black, &code, 4, 4, Stone::Black).await })
    };
    let white_move = {
        let coordinator = Arc::clone(&engine.coordinator);
        let code = code.clone();
        tokio::spawn(async move { coordinator.make_move(&white, &code, 4, 4, Stone::White).await })
    };

    assert!(black_move.await.unwrap().is_ok());
    assert!(matches!(
        white_move.await.unwrap(),
        Err(CoordinatorError::NotYourTurn) | Err(CoordinatorError::CellOccupied { .. })
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creates_by_one_participant() {
    let engine = guest_engine();
    let alice = Participant::guest("g-alice", "Alice");

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let coordinator = Arc::clone(&engine.coordinator);
            let alice = alice.clone();
            tokio::spawn(async move {
                coordinator
                    .create_room(&alice, &RoomOptions::default())
                    .await
            })
        })
        .collect();

    let mut created = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => created += 1,
            Err(e) => assert!(matches!(e, CoordinatorError::AlreadyInActiveRoom(_))),
        }
    }
    assert_eq!(created, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_last_seat_goes_to_exactly_one_joiner() {
    let engine = guest_engine();
    let room = engine
        .coordinator
        .create_room(&Participant::guest("g-host", "Host"), &RoomOptions::default())
        .await
        .unwrap();

    let handles: Vec<_> = (0..8)
        .map(|index| {
            let coordinator = Arc::clone(&engine.coordinator);
            let code = room.room_code.clone();
            tokio::spawn(async move {
                let joiner = Participant::guest(&format!("g-joiner-{}", index), "Joiner");
                coordinator.join_room(&joiner, &code, false).await
            })
        })
        .collect();

    let mut seated = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(JoinOutcome::Seated { color, .. }) => {
                assert_eq!(color, Stone::White);
                seated += 1;
            }
            Ok(other) => panic!("unexpected outcome {:?}", other),
            Err(e) => assert_eq!(e, CoordinatorError::RoomFull),
        }
    }
    assert_eq!(seated, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_leave_and_move_never_interleave() {
    let engine = guest_engine();
    let black = Participant::guest("g-black", "Black");
    let white = Participant::guest("g-white", "White");
    let code = playing_room(&engine.coordinator, &black, &white).await;

    let leave = {
        let coordinator = Arc::clone(&engine.coordinator);
        let black = black.clone();
        let code = code.clone();
        tokio::spawn(async move { coordinator.leave_room(&black, &code).await })
    };
    let play = {
        let coordinator = Arc::clone(&engine.coordinator);
        let code = code.clone();
        tokio::spawn(async move { coordinator.make_move(&black, &code, 0, 0, Stone::Black).await })
    };

    assert!(leave.await.unwrap().is_ok());
    match play.await.unwrap() {
        Ok(_) => {}
        Err(e) => assert!(matches!(
            e,
            CoordinatorError::NotYourSeat | CoordinatorError::GameInactive
        )),
    }
    let snapshot = engine.coordinator.snapshot(&code).await.unwrap();
    assert!(!snapshot.game_active);
    assert!(snapshot.black_player_id.is_none());
}
