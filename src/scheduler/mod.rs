//! Scheduled items: countdown timers, alarms and reminders.
//!
//! Items live in memory only. The coordinator polls the store once per
//! configured period and announces whatever expired.

pub mod items;
pub mod store;

pub use items::{EventDraft, EventKind, ExpiredItem, ScheduledEvent, Timer, TimerDraft};
pub use store::ScheduledItemStore;
