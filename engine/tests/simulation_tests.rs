use std::sync::Arc;

use database::{config::IN_MEMORY_URL, DatabaseConfig, GameHandle, StreamingEventWriter};
use engine::{run_game, EngineError, Seat, Simulation};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use strategies::{DefaultStrategy, RandomStrategy};
use types::{GameSettings, Phase, Strategy};

fn make_seats(names_and_strategies: Vec<(&str, Box<dyn Strategy>)>) -> Vec<Seat> {
    names_and_strategies
        .into_iter()
        .map(|(name, strategy)| Seat::new(name, strategy))
        .collect()
}

fn default_seats(count: usize) -> Vec<Seat> {
    let names = ["Alice", "Bob", "Charlie", "Dana", "Eli", "Fran", "Gus", "Hana", "Ivo", "Jo"];
    make_seats(
        names
            .iter()
            .take(count)
            .map(|name| (*name, Box::new(DefaultStrategy::default()) as Box<dyn Strategy>))
            .collect(),
    )
}

fn seeded(seed: u64) -> Simulation {
    Simulation::new(|coordinator| coordinator.with_rng(Box::new(ChaCha20Rng::seed_from_u64(seed))))
}

#[tokio::test]
async fn test_run_game_with_default_strategies() {
    let simulation = seeded(1);
    let mut seats = default_seats(3);

    let result = run_game(&simulation, &GameSettings::default(), &mut seats, None)
        .await
        .expect("Game should complete successfully");

    assert_eq!(result.phase, Phase::Finished);
    assert!(result.winner.is_some());
    assert!(result.players.iter().all(|p| p.role.is_some()));
}

#[tokio::test]
async fn test_run_game_with_mixed_strategies() {
    let simulation = seeded(2);
    let mut seats = make_seats(vec![
        ("Alice", Box::new(DefaultStrategy::default()) as Box<dyn Strategy>),
        ("Bob", Box::new(RandomStrategy::default()) as Box<dyn Strategy>),
        ("Charlie", Box::new(DefaultStrategy::default()) as Box<dyn Strategy>),
        ("Dana", Box::new(RandomStrategy::default()) as Box<dyn Strategy>),
        ("Eli", Box::new(RandomStrategy::default()) as Box<dyn Strategy>),
        ("Fran", Box::new(DefaultStrategy::default()) as Box<dyn Strategy>),
    ]);

    let result = run_game(&simulation, &GameSettings::default(), &mut seats, None)
        .await
        .expect("Game should complete successfully");

    assert_eq!(result.phase, Phase::Finished);
    assert!(result.winner.is_some());
}

#[tokio::test]
async fn test_run_game_at_every_table_size() {
    for count in [3, 5, 8, 10] {
        let simulation = seeded(count as u64);
        let mut seats = default_seats(count);
        let result = run_game(&simulation, &GameSettings::default(), &mut seats, None)
            .await
            .expect("Game should complete successfully");
        assert_eq!(result.players.len(), count);
        assert_eq!(result.phase, Phase::Finished);
    }
}

#[tokio::test]
async fn test_run_game_with_delay() {
    let simulation = seeded(3);
    let mut seats = default_seats(3);

    let start = std::time::Instant::now();
    let result = run_game(&simulation, &GameSettings::classic(), &mut seats, Some(10))
        .await
        .expect("Game should complete successfully");
    let duration = start.elapsed();

    assert_eq!(result.phase, Phase::Finished);
    assert!(
        duration.as_millis() >= 10,
        "Game should take at least 10ms with delays"
    );
}

#[tokio::test]
async fn test_multiple_games_share_one_simulation() {
    let simulation = seeded(4);
    let mut first = default_seats(4);
    let mut second = default_seats(5);

    run_game(&simulation, &GameSettings::default(), &mut first, None)
        .await
        .expect("First game should complete successfully");
    run_game(&simulation, &GameSettings::default(), &mut second, None)
        .await
        .expect("Second game should complete successfully");

    assert_eq!(simulation.coordinator.game_count(), 2);
}

#[tokio::test]
async fn test_run_game_rejects_too_few_players() {
    let simulation = Simulation::default();
    let mut seats = default_seats(2);

    let err = run_game(&simulation, &GameSettings::default(), &mut seats, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Game(types::GameError::InvalidPlayerCount(2))
    ));
}

#[tokio::test]
async fn test_run_game_writes_the_event_log() {
    let config = DatabaseConfig::from_cli_or_env_or_yaml(Some(IN_MEMORY_URL.to_string()), None);
    let pool = config.create_pool().await.unwrap();
    database::run_migrations(&pool).await.unwrap();
    let writer = Arc::new(StreamingEventWriter::new(pool));

    let log_writer = writer.clone();
    let simulation = Simulation::new(move |coordinator| {
        coordinator
            .with_rng(Box::new(ChaCha20Rng::seed_from_u64(9)))
            .with_event_log(log_writer)
    });
    let mut seats = default_seats(5);
    run_game(&simulation, &GameSettings::default(), &mut seats, None)
        .await
        .expect("Game should complete successfully");

    let events = writer.events(GameHandle::new(1)).await.unwrap();
    assert_eq!(events.first().unwrap().event_type, "phase_changed");
    assert!(events.iter().any(|e| e.event_type == "roles_assigned"));
    assert_eq!(events.last().unwrap().event_type, "game_finished");
    let sequences: Vec<i64> = events.iter().map(|e| e.sequence).collect();
    assert!(sequences.windows(2).all(|pair| pair[0] < pair[1]));
}
