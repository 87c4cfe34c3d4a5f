use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteKind {
    Public,
    Mafia,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ballot {
    Target(Uuid),
    Skip,
}

impl Ballot {
    pub fn target(&self) -> Option<Uuid> {
        match self {
            Ballot::Target(id) => Some(*id),
            Ballot::Skip => None,
        }
    }
}

/// The active ballot of one voter for one (round, kind). Re-casting replaces it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub game_id: Uuid,
    pub round: u32,
    pub kind: VoteKind,
    pub voter_id: Uuid,
    pub ballot: Ballot,
    pub cast_at: DateTime<Utc>,
}

impl Vote {
    pub fn target(&self) -> Option<Uuid> {
        self.ballot.target()
    }

    pub fn is_skip(&self) -> bool {
        self.ballot == Ballot::Skip
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Tally {
    pub counts: BTreeMap<Uuid, usize>,
    pub skips: usize,
}

impl Tally {
    pub fn from_votes<'a>(votes: impl IntoIterator<Item = &'a Vote>) -> Self {
        let mut tally = Tally::default();
        for vote in votes {
            match vote.ballot {
                Ballot::Target(target) => *tally.counts.entry(target).or_default() += 1,
                Ballot::Skip => tally.skips += 1,
            }
        }
        tally
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Highest target count and every target sitting at it.
    pub fn leaders(&self) -> (usize, Vec<Uuid>) {
        let max = self.counts.values().copied().max().unwrap_or(0);
        let tied = self
            .counts
            .iter()
            .filter(|(_, count)| **count == max)
            .map(|(&target, _)| target)
            .collect_vec();
        (max, tied)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PublicOutcome {
    Eliminate(Uuid),
    NoVotes,
    Tie(Vec<Uuid>),
    SkipPrevails,
}

impl PublicOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublicOutcome::Eliminate(_) => "eliminated",
            PublicOutcome::NoVotes => "no_votes",
            PublicOutcome::Tie(_) => "tie",
            PublicOutcome::SkipPrevails => "skipped",
        }
    }
}

pub fn resolve_public(tally: &Tally) -> PublicOutcome {
    if tally.is_empty() {
        return PublicOutcome::NoVotes;
    }
    let (max, tied) = tally.leaders();
    if tied.len() > 1 {
        return PublicOutcome::Tie(tied);
    }
    if tally.skips >= max {
        return PublicOutcome::SkipPrevails;
    }
    match tied.first() {
        Some(&target) => PublicOutcome::Eliminate(target),
        None => PublicOutcome::NoVotes,
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MafiaOutcome {
    NoVotes,
    Decided(Uuid),
    /// Needs a random pick; the caller owns the random source.
    Tied(Vec<Uuid>),
}

pub fn resolve_mafia(tally: &Tally) -> MafiaOutcome {
    if tally.is_empty() {
        return MafiaOutcome::NoVotes;
    }
    let (_, tied) = tally.leaders();
    match tied.as_slice() {
        [single] => MafiaOutcome::Decided(*single),
        _ => MafiaOutcome::Tied(tied),
    }
}
