use std::{collections::BTreeMap, sync::Arc};

use clap::Parser;
use database::{DatabaseConfig, EventLogWriter, NoopRecorder};
use engine::{run_game, EngineConfig, EngineError, PlayerConfig, Seat, Simulation, StrategyKind};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

#[derive(Parser, Debug)]
struct Params {
    /// YAML file with game settings and the bot roster.
    #[arg(short, long)]
    config: Option<String>,

    /// `name` or `name=strategy` (default, random, input). Repeatable.
    #[arg(short, long)]
    player: Vec<String>,

    /// SQLite file for the event log. Falls back to DATABASE_URL.
    #[arg(short, long)]
    database: Option<String>,

    #[arg(short, long)]
    seed: Option<u64>,

    #[arg(short, long, default_value_t = 1)]
    games: usize,

    #[arg(long)]
    delay_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), EngineError> {
    env_logger::init();
    let args = Params::parse();
    log::info!("args: {args:?}");

    let mut config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    if !args.player.is_empty() {
        config.players = args
            .player
            .iter()
            .map(|p| p.parse::<PlayerConfig>())
            .collect::<Result<_, _>>()?;
    }
    if config.players.is_empty() {
        config.players = ["Ann", "Ben", "Cal", "Dee", "Eve", "Fay"]
            .iter()
            .map(|name| PlayerConfig {
                name: name.to_string(),
                strategy: StrategyKind::Default,
            })
            .collect();
    }
    config.seed = args.seed.or(config.seed);
    config.delay_ms = args.delay_ms.or(config.delay_ms);

    let writer: Arc<dyn EventLogWriter> =
        if args.database.is_some()
            || config.database_url.is_some()
            || std::env::var("DATABASE_URL").is_ok()
        {
            DatabaseConfig::from_cli_or_env_or_yaml(args.database.clone(), config.database_url.clone())
                .with_mode(config.writer_mode)
                .connect_writer()
                .await?
        } else {
            Arc::new(NoopRecorder)
        };

    let mut tally: BTreeMap<String, usize> = BTreeMap::new();
    for game in 0..args.games {
        let mut seats: Vec<Seat> = config
            .players
            .iter()
            .map(|p| Seat::new(&p.name, p.strategy.build()))
            .collect();
        let writer = writer.clone();
        let seed = config.seed.map(|seed| seed.wrapping_add(game as u64));
        let simulation = Simulation::new(move |coordinator| {
            let coordinator = coordinator.with_event_log(writer);
            match seed {
                Some(seed) => coordinator.with_rng(Box::new(ChaCha20Rng::seed_from_u64(seed))),
                None => coordinator,
            }
        });

        let result = run_game(&simulation, &config.game, &mut seats, config.delay_ms).await?;
        let winner = result
            .winner
            .map(|w| w.to_string())
            .unwrap_or("nobody".to_string());
        println!("Game {}: {winner} win after {} rounds", game + 1, result.round);
        for player in result.players.iter() {
            println!(
                "  {} ({}){}",
                player.name,
                player.role.map(|r| r.to_string()).unwrap_or("?".to_string()),
                if player.is_alive { "" } else { " - out" }
            );
        }
        *tally.entry(winner).or_default() += 1;
    }
    println!("Results: {tally:?}");
    Ok(())
}
