//! In-memory store of pending timers and scheduled events.
//!
//! The store is mutated only by the coordinator task: inserts from the
//! dispatcher's side effects and removals from the periodic poll. Each
//! [`poll`](ScheduledItemStore::poll) partitions and removes in one step, so
//! an item reported as expired is gone before the next tick.

use crate::scheduler::items::{
    EventDraft, ExpiredItem, ScheduledEvent, Timer, TimerDraft,
};
use chrono::{DateTime, Local};
use std::collections::BTreeMap;
use tracing::debug;

/// Pending timers and events.
#[derive(Debug, Default)]
pub struct ScheduledItemStore {
    timers: BTreeMap<u64, Timer>,
    events: BTreeMap<u64, ScheduledEvent>,
    next_id: u64,
}

impl ScheduledItemStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Insert a timer and return it with its assigned id.
    pub fn insert_timer(&mut self, draft: TimerDraft) -> Timer {
        let timer = Timer {
            id: self.allocate_id(),
            label: draft.label,
            initial_duration_secs: draft.duration_secs,
            end_time: draft.end_time,
        };
        debug!(id = timer.id, end_time = %timer.end_time, "timer scheduled");
        self.timers.insert(timer.id, timer.clone());
        timer
    }

    /// Insert an alarm/reminder and return it with its assigned id.
    pub fn insert_event(&mut self, draft: EventDraft) -> ScheduledEvent {
        let event = ScheduledEvent {
            id: self.allocate_id(),
            label: draft.label,
            subject: draft.subject,
            trigger_time: draft.trigger_time,
            kind: draft.kind,
        };
        debug!(id = event.id, kind = ?event.kind, trigger = %event.trigger_time, "event scheduled");
        self.events.insert(event.id, event.clone());
        event
    }

    /// Remove and return every item due at or before `now`.
    ///
    /// Timers come first, then events, each in insertion order.
    pub fn poll(&mut self, now: DateTime<Local>) -> Vec<ExpiredItem> {
        let due_timers: Vec<u64> = self
            .timers
            .values()
            .filter(|t| t.end_time <= now)
            .map(|t| t.id)
            .collect();
        let due_events: Vec<u64> = self
            .events
            .values()
            .filter(|e| e.trigger_time <= now)
            .map(|e| e.id)
            .collect();

        let mut expired = Vec::with_capacity(due_timers.len() + due_events.len());
        for id in due_timers {
            if let Some(timer) = self.timers.remove(&id) {
                expired.push(ExpiredItem::Timer(timer));
            }
        }
        for id in due_events {
            if let Some(event) = self.events.remove(&id) {
                expired.push(ExpiredItem::Event(event));
            }
        }
        expired
    }

    /// Pending timers, ordered by id.
    pub fn timers(&self) -> impl Iterator<Item = &Timer> {
        self.timers.values()
    }

    /// Pending events, ordered by id.
    pub fn events(&self) -> impl Iterator<Item = &ScheduledEvent> {
        self.events.values()
    }

    /// Number of pending items.
    pub fn len(&self) -> usize {
        self.timers.len() + self.events.len()
    }

    /// Whether nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.timers.is_empty() && self.events.is_empty()
    }
}
