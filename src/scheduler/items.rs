//! Timer and scheduled event definitions.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Which phrasing an event uses when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Alarm: "Sir, it's time!".
    Alarm,
    /// Reminder: "A reminder, Sir: ...".
    Reminder,
}

impl EventKind {
    /// Lowercase noun used in confirmations.
    pub fn noun(self) -> &'static str {
        match self {
            Self::Alarm => "alarm",
            Self::Reminder => "reminder",
        }
    }

    /// Indefinite article for [`noun`](Self::noun).
    pub fn article(self) -> &'static str {
        match self {
            Self::Alarm => "an",
            Self::Reminder => "a",
        }
    }
}

/// A countdown timer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timer {
    /// Unique within the store for the process lifetime.
    pub id: u64,
    /// Optional label, e.g. "pizza".
    pub label: Option<String>,
    /// Requested duration in seconds.
    pub initial_duration_secs: u64,
    /// When the timer fires.
    pub end_time: DateTime<Local>,
}

impl Timer {
    /// Spoken/logged text when the timer expires.
    pub fn announcement(&self) -> String {
        format!("Sir, your {}timer is done!", label_prefix(self.label.as_deref()))
    }
}

/// An alarm or reminder at an absolute instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledEvent {
    /// Unique within the store for the process lifetime.
    pub id: u64,
    /// Optional label, e.g. "wake up".
    pub label: Option<String>,
    /// What to be reminded about.
    pub subject: Option<String>,
    /// When the event fires.
    pub trigger_time: DateTime<Local>,
    /// Alarm or reminder.
    pub kind: EventKind,
}

impl ScheduledEvent {
    /// Spoken/logged text when the event fires.
    pub fn announcement(&self) -> String {
        match self.kind {
            EventKind::Alarm => format!(
                "Sir, it's time! {}",
                non_empty(self.label.as_deref()).unwrap_or("Your alarm is going off.")
            ),
            EventKind::Reminder => format!(
                "A reminder, Sir: {}",
                non_empty(self.subject.as_deref())
                    .or_else(|| non_empty(self.label.as_deref()))
                    .unwrap_or("Time for your reminder.")
            ),
        }
    }
}

/// Timer fields supplied by the dispatcher; the store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerDraft {
    /// Optional label.
    pub label: Option<String>,
    /// Requested duration in seconds.
    pub duration_secs: u64,
    /// When the timer fires.
    pub end_time: DateTime<Local>,
}

/// Event fields supplied by the dispatcher; the store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDraft {
    /// Optional label.
    pub label: Option<String>,
    /// Optional subject.
    pub subject: Option<String>,
    /// When the event fires.
    pub trigger_time: DateTime<Local>,
    /// Alarm or reminder.
    pub kind: EventKind,
}

/// An item removed from the store because it expired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpiredItem {
    /// Expired timer.
    Timer(Timer),
    /// Fired alarm or reminder.
    Event(ScheduledEvent),
}

impl ExpiredItem {
    /// Text to log and speak for this item.
    pub fn announcement(&self) -> String {
        match self {
            Self::Timer(t) => t.announcement(),
            Self::Event(e) => e.announcement(),
        }
    }

    /// Item id.
    pub fn id(&self) -> u64 {
        match self {
            Self::Timer(t) => t.id,
            Self::Event(e) => e.id,
        }
    }
}

/// `"{label} "` or empty, for "a {label }timer" phrasing.
pub(crate) fn label_prefix(label: Option<&str>) -> String {
    match non_empty(label) {
        Some(label) => format!("{label} "),
        None => String::new(),
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
