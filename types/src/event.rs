use std::{collections::BTreeMap, fmt::Display};

use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const MAX_PARAM_CHARS: usize = 64;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    PhaseChanged,
    RolesAssigned,
    PublicVoteResolved,
    PlayerEliminated,
    MafiaTiebreak,
    MafiaKillBlocked,
    InvestigationPerformed,
    ProtectionPlaced,
    AbilityPhaseComplete,
    RevengeWindowOpened,
    RevengeTaken,
    RevengeForfeited,
    PlayerConnection,
    GameFinished,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::PhaseChanged => "phase_changed",
            EventKind::RolesAssigned => "roles_assigned",
            EventKind::PublicVoteResolved => "public_vote_resolved",
            EventKind::PlayerEliminated => "player_eliminated",
            EventKind::MafiaTiebreak => "mafia_tiebreak",
            EventKind::MafiaKillBlocked => "mafia_kill_blocked",
            EventKind::InvestigationPerformed => "investigation_performed",
            EventKind::ProtectionPlaced => "protection_placed",
            EventKind::AbilityPhaseComplete => "ability_phase_complete",
            EventKind::RevengeWindowOpened => "revenge_window_opened",
            EventKind::RevengeTaken => "revenge_taken",
            EventKind::RevengeForfeited => "revenge_forfeited",
            EventKind::PlayerConnection => "player_connection",
            EventKind::GameFinished => "game_finished",
        }
    }

    /// Localisation key the timeline renders.
    pub fn message_key(self) -> String {
        format!("game.event.{}", self.as_str())
    }
}

impl Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Append-only timeline entry. Params are public by construction: callers
/// never put roles, factions or protection targets in here.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameEvent {
    pub game_id: Uuid,
    pub sequence: u64,
    pub round: u32,
    pub kind: EventKind,
    pub message_key: String,
    pub params: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
}

impl GameEvent {
    pub fn new(
        game_id: Uuid,
        sequence: u64,
        round: u32,
        kind: EventKind,
        params: &[(&str, String)],
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            game_id,
            sequence,
            round,
            kind,
            message_key: kind.message_key(),
            params: params
                .iter()
                .map(|(key, value)| (key.to_string(), sanitize_param(value)))
                .collect(),
            created_at,
        }
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}

/// Strips control characters, collapses whitespace and caps the length of a
/// user-influenced value before it reaches the timeline.
pub fn sanitize_param(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect::<String>()
        .split_whitespace()
        .join(" ")
        .chars()
        .take(MAX_PARAM_CHARS)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_control_characters() {
        assert_eq!(sanitize_param("Ali\u{1b}[31mce\n\tthe\r\nGreat"), "Ali [31mce the Great");
        assert_eq!(sanitize_param("  spaced   out  "), "spaced out");
    }

    #[test]
    fn test_sanitize_caps_length() {
        let long = "x".repeat(200);
        assert_eq!(sanitize_param(&long).chars().count(), MAX_PARAM_CHARS);
    }

    #[test]
    fn test_event_params_are_sanitized() {
        let event = GameEvent::new(
            Uuid::new_v4(),
            0,
            1,
            EventKind::PlayerEliminated,
            &[("player", "Bob\u{0}by".to_string())],
            Utc::now(),
        );
        assert_eq!(event.param("player"), Some("Bob by"));
        assert_eq!(event.message_key, "game.event.player_eliminated");
    }
}
