use crate::{player::Player, role::Faction};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct AliveCounts {
    pub mafia: usize,
    pub citizens: usize,
}

impl AliveCounts {
    pub fn from_players(players: &[Player]) -> Self {
        players
            .iter()
            .filter(|p| p.is_alive())
            .filter_map(|p| p.role())
            .fold(AliveCounts::default(), |mut counts, role| {
                match role.faction() {
                    Faction::Mafia => counts.mafia += 1,
                    Faction::Citizens => counts.citizens += 1,
                }
                counts
            })
    }
}

/// Faction win check, run after every elimination.
pub fn evaluate_winner(counts: AliveCounts) -> Option<Faction> {
    if counts.mafia == 0 {
        Some(Faction::Citizens)
    } else if counts.mafia >= counts.citizens {
        Some(Faction::Mafia)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(mafia: usize, citizens: usize) -> AliveCounts {
        AliveCounts { mafia, citizens }
    }

    #[test]
    fn test_no_mafia_means_citizens_win() {
        assert_eq!(evaluate_winner(counts(0, 4)), Some(Faction::Citizens));
        assert_eq!(evaluate_winner(counts(0, 0)), Some(Faction::Citizens));
    }

    #[test]
    fn test_parity_means_mafia_win() {
        assert_eq!(evaluate_winner(counts(1, 1)), Some(Faction::Mafia));
        assert_eq!(evaluate_winner(counts(2, 1)), Some(Faction::Mafia));
        assert_eq!(evaluate_winner(counts(3, 0)), Some(Faction::Mafia));
    }

    #[test]
    fn test_game_continues_while_citizens_outnumber_mafia() {
        assert_eq!(evaluate_winner(counts(1, 2)), None);
        assert_eq!(evaluate_winner(counts(3, 4)), None);
    }
}
