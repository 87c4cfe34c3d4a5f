use std::{
    io::{self, Write},
    sync::OnceLock,
};

use itertools::Itertools;
use regex::{Captures, Regex};
use types::{Ballot, GameSnapshot, PlayerAction, Strategy};
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct InputStrategy {}

impl Strategy for InputStrategy {
    fn select_action(
        &mut self,
        view: &GameSnapshot,
        available_actions: &[PlayerAction],
    ) -> PlayerAction {
        print_view(view);
        println!(
            "Available actions: {}",
            available_actions
                .iter()
                .map(|action| describe(view, action))
                .join(" || ")
        );

        // if only one available action, do it
        if let [action] = available_actions {
            log::info!("Only have one action available: {action}");
            return *action;
        }

        let mut buf = String::new();
        loop {
            match select_action_from_stdin(&mut buf, view, available_actions) {
                Ok(action) => return action,
                Err(err) => {
                    buf.clear();
                    log::error!("Error parsing message from stdin: {err}")
                }
            }
        }
    }
}

fn print_view(view: &GameSnapshot) {
    println!(
        "Round {}, {} (deadline {})",
        view.round,
        view.phase,
        view.deadline
            .map(|d| d.format("%H:%M:%S").to_string())
            .unwrap_or("none".to_string())
    );
    for (seat, player) in view.players.iter().enumerate() {
        println!(
            "  #{seat} {}{} ({}){}",
            player.name,
            if player.is_connected { "" } else { " [away]" },
            player
                .role
                .map(|r| r.to_string())
                .unwrap_or("?".to_string()),
            if player.is_alive { "" } else { " - out" },
        );
    }
    for investigation in view.investigations.iter() {
        println!(
            "Round {}: {} is {}",
            investigation.round,
            view.name_of(investigation.target_id),
            investigation.faction
        );
    }
    if let Some(ballot) = view.my_ballot {
        let choice = match ballot {
            Ballot::Skip => "skip".to_string(),
            Ballot::Target(id) => view.name_of(id).to_string(),
        };
        println!("Your current ballot: {choice}");
    }
}

fn describe(view: &GameSnapshot, action: &PlayerAction) -> String {
    match (action, action.target()) {
        (PlayerAction::PublicVote(_), Some(id)) => format!("vote {}", view.name_of(id)),
        (PlayerAction::PublicVote(_), None) => "skip".to_string(),
        (PlayerAction::MafiaVote { .. }, Some(id)) => format!("kill {}", view.name_of(id)),
        (PlayerAction::Investigate { .. }, Some(id)) => format!("check {}", view.name_of(id)),
        (PlayerAction::Protect { .. }, Some(id)) => format!("protect {}", view.name_of(id)),
        (PlayerAction::Revenge { .. }, Some(id)) => format!("revenge {}", view.name_of(id)),
        (PlayerAction::ConfirmAbility, _) => "confirm".to_string(),
        _ => "wait".to_string(),
    }
}

fn select_action_from_stdin(
    buf: &mut String,
    view: &GameSnapshot,
    actions: &[PlayerAction],
) -> Result<PlayerAction, String> {
    print!("Your action? >> ");
    let _ = io::stdout().flush();
    match io::stdin().read_line(buf) {
        Ok(_) => select_action_from_str(buf, view, actions),
        Err(err) => {
            buf.clear();
            Err(format!("Error reading line from stdin: {err}"))
        }
    }
}

fn targeted_command() -> Result<&'static Regex, String> {
    static TARGETED: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    TARGETED
        .get_or_init(|| Regex::new(r"^(?<verb>vote|kill|check|protect|revenge)\s+(?<who>.+)$"))
        .as_ref()
        .map_err(|err| err.to_string())
}

fn select_action_from_str(
    input: &str,
    view: &GameSnapshot,
    actions: &[PlayerAction],
) -> Result<PlayerAction, String> {
    let input = input.trim().to_lowercase();
    let input = input.as_str();

    if let Some(caps) = targeted_command()?.captures(input) {
        return targeted_action_from_captures(&caps, view, actions);
    }

    let bare = match input {
        "skip" => PlayerAction::PublicVote(Ballot::Skip),
        "confirm" => PlayerAction::ConfirmAbility,
        "wait" | "" => PlayerAction::Wait,
        _ => {
            return Err(format!(
                "Unable to parse a vote, kill, check, protect, revenge, skip, confirm or wait command from: {input}"
            ))
        }
    };
    permitted(bare, actions)
}

fn targeted_action_from_captures(
    caps: &Captures,
    view: &GameSnapshot,
    actions: &[PlayerAction],
) -> Result<PlayerAction, String> {
    log::debug!("Captured: {caps:?}");
    let who = caps.name("who").map(|m| m.as_str()).unwrap_or_default();
    let target = resolve_target(who, view)?;
    let action = match caps.name("verb").map(|m| m.as_str()) {
        Some("vote") => PlayerAction::PublicVote(Ballot::Target(target)),
        Some("kill") => PlayerAction::MafiaVote { target },
        Some("check") => PlayerAction::Investigate { target },
        Some("protect") => PlayerAction::Protect { target },
        Some("revenge") => PlayerAction::Revenge { target },
        other => return Err(format!("Unknown command {other:?}")),
    };
    permitted(action, actions)
}

fn permitted(action: PlayerAction, actions: &[PlayerAction]) -> Result<PlayerAction, String> {
    if actions.contains(&action) {
        Ok(action)
    } else {
        Err(format!("{action} is not a permitted action right now"))
    }
}

/// A seat number (`#2` or `2`) or an unambiguous name prefix.
fn resolve_target(who: &str, view: &GameSnapshot) -> Result<Uuid, String> {
    let who = who.trim();
    if let Ok(seat) = who.trim_start_matches('#').parse::<usize>() {
        return view
            .players
            .get(seat)
            .map(|p| p.id)
            .ok_or_else(|| format!("No seat #{seat}"));
    }
    let matches = view
        .players
        .iter()
        .filter(|p| p.name.to_lowercase().starts_with(who))
        .collect_vec();
    match matches.as_slice() {
        [player] => Ok(player.id),
        [] => Err(format!("Nobody is called {who:?}")),
        many => Err(format!(
            "{who:?} could be any of {}",
            many.iter().map(|p| &p.name).join(", ")
        )),
    }
}
