use std::{
    fmt::Debug,
    sync::{Arc, Mutex, PoisonError},
};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use types::TimerTicket;

use crate::clock::Clock;

/// Somewhere to park a deferred phase callback until it is due.
pub trait Scheduler: Debug + Send + Sync {
    fn schedule(&self, ticket: TimerTicket);
}

/// One sleeping task per ticket; due tickets come out of the receiver
/// handed back by `new`, which `Coordinator::spawn_timer_loop` consumes.
#[derive(Debug)]
pub struct TokioScheduler {
    sender: UnboundedSender<TimerTicket>,
    clock: Arc<dyn Clock>,
}

impl TokioScheduler {
    pub fn new(clock: Arc<dyn Clock>) -> (Self, UnboundedReceiver<TimerTicket>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender, clock }, receiver)
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, ticket: TimerTicket) {
        let delay = (ticket.fire_at - self.clock.now())
            .to_std()
            .unwrap_or_default();
        let sender = self.sender.clone();
        log::debug!(
            "Timer for {} ({}, token {}) in {delay:?}",
            ticket.game_id,
            ticket.expected_phase,
            ticket.expected_token
        );
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if sender.send(ticket).is_err() {
                log::debug!("Timer loop gone, dropping ticket for {}", ticket.game_id);
            }
        });
    }
}

/// Holds tickets until someone asks for the due ones.
#[derive(Debug, Default)]
pub struct ManualScheduler {
    queue: Mutex<Vec<TimerTicket>>,
}

impl ManualScheduler {
    pub fn pending(&self) -> Vec<TimerTicket> {
        self.lock().clone()
    }

    pub fn next_fire_at(&self) -> Option<DateTime<Utc>> {
        self.lock().iter().map(|t| t.fire_at).min()
    }

    /// Removes and returns every ticket due at `now`, earliest first.
    pub fn take_due(&self, now: DateTime<Utc>) -> Vec<TimerTicket> {
        let mut queue = self.lock();
        let (mut due, rest): (Vec<_>, Vec<_>) = queue.drain(..).partition(|t| t.fire_at <= now);
        *queue = rest;
        due.sort_by_key(|t| (t.fire_at, t.expected_token));
        due
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<TimerTicket>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, ticket: TimerTicket) {
        self.lock().push(ticket);
    }
}
