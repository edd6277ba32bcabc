//! `setAlarm` and `setReminder`.

use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDate, NaiveTime, TimeZone};
use serde_json::{Value, json};

use super::{optional_str, required_str};
use crate::dispatch::registry::{SideEffect, Tool, ToolArgs, ToolContext, ToolError, ToolOutput};
use crate::scheduler::{EventDraft, EventKind};

/// Schedules an alarm or a reminder at a wall-clock time.
#[derive(Debug, Clone, Copy)]
pub struct ScheduleEventTool {
    kind: EventKind,
}

impl ScheduleEventTool {
    /// Tool for `kind` (`setAlarm` or `setReminder`).
    pub fn new(kind: EventKind) -> Self {
        Self { kind }
    }
}

#[async_trait]
impl Tool for ScheduleEventTool {
    fn name(&self) -> &str {
        match self.kind {
            EventKind::Alarm => "setAlarm",
            EventKind::Reminder => "setReminder",
        }
    }

    fn description(&self) -> &str {
        match self.kind {
            EventKind::Alarm => "Sets an alarm for a specific time and date.",
            EventKind::Reminder => "Sets a reminder for a specific time, date, and subject.",
        }
    }

    fn schema(&self) -> Value {
        let noun = self.kind.noun();
        let example = match self.kind {
            EventKind::Alarm => "e.g. 19:30:00 for 7:30 PM.",
            EventKind::Reminder => "e.g. 09:00:00 for 9:00 AM.",
        };
        let mut properties = json!({
            "time": {
                "type": "STRING",
                "description": format!("The time for the {noun} in HH:MM:SS format (24-hour clock). {example}")
            },
            "date": {
                "type": "STRING",
                "description": format!("The date for the {noun} in YYYY-MM-DD format. Defaults to today or tomorrow if not specified.")
            }
        });
        let required = match self.kind {
            EventKind::Alarm => {
                properties["label"] = json!({
                    "type": "STRING",
                    "description": "A label for the alarm, e.g., \"wake up\"."
                });
                json!(["time"])
            }
            EventKind::Reminder => {
                properties["subject"] = json!({
                    "type": "STRING",
                    "description": "What to be reminded about, e.g., \"Call mom\"."
                });
                json!(["time", "subject"])
            }
        };
        json!({ "type": "OBJECT", "properties": properties, "required": required })
    }

    async fn invoke(&self, args: &ToolArgs, ctx: &ToolContext) -> Result<ToolOutput, ToolError> {
        let time = required_str(args, "time")?;
        let date = optional_str(args, "date");
        let label = optional_str(args, "label").map(str::to_owned);
        let subject = optional_str(args, "subject").map(str::to_owned);

        let trigger_time = parse_trigger_time(date, time, ctx.clock.now())?;

        let target = subject.as_deref().or(label.as_deref()).unwrap_or_default();
        let confirmation = format!(
            "Got it, Sir. I'll set {} {} for {target} at {}.",
            self.kind.article(),
            self.kind.noun(),
            trigger_time.format("%H:%M:%S")
        );

        Ok(ToolOutput::with_effect(
            confirmation,
            SideEffect::InsertEvent(EventDraft {
                label,
                subject,
                trigger_time,
                kind: self.kind,
            }),
        ))
    }
}

/// Resolve a `date` (`YYYY-MM-DD`, defaults to today) and `time`
/// (`HH:MM:SS` or `HH:MM`) to a local instant.
///
/// An instant that is not after `now` is moved forward one day, so a time
/// without a date is always in the future.
///
/// # Errors
///
/// Returns [`ToolError::InvalidArgument`] for unparseable input or a local
/// time that does not exist (DST gap).
pub fn parse_trigger_time(
    date: Option<&str>,
    time: &str,
    now: DateTime<Local>,
) -> Result<DateTime<Local>, ToolError> {
    let day = match date {
        Some(date) => NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|_| {
            ToolError::InvalidArgument {
                name: "date",
                reason: format!("expected YYYY-MM-DD, got {date:?}"),
            }
        })?,
        None => now.date_naive(),
    };

    let clock_time = NaiveTime::parse_from_str(time, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(time, "%H:%M"))
        .map_err(|_| ToolError::InvalidArgument {
            name: "time",
            reason: format!("expected HH:MM:SS, got {time:?}"),
        })?;

    let local = |day: NaiveDate| {
        Local
            .from_local_datetime(&day.and_time(clock_time))
            .earliest()
            .ok_or(ToolError::InvalidArgument {
                name: "time",
                reason: format!("{day} {clock_time} does not exist in the local time zone"),
            })
    };

    let trigger = local(day)?;
    if trigger > now {
        return Ok(trigger);
    }
    let next_day = day.succ_opt().ok_or(ToolError::InvalidArgument {
        name: "date",
        reason: "date out of range".into(),
    })?;
    local(next_day)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::dispatch::test_support::{args, context_at};

    fn at(h: u32, m: u32, s: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 6, 1, h, m, s).unwrap()
    }

    #[test]
    fn later_today_stays_today() {
        let trigger = parse_trigger_time(None, "19:30:00", at(9, 0, 0)).unwrap();
        assert_eq!(trigger, at(19, 30, 0));
    }

    #[test]
    fn earlier_today_rolls_to_tomorrow() {
        let now = at(9, 0, 0);
        let trigger = parse_trigger_time(None, "07:15:00", now).unwrap();
        assert_eq!(
            trigger,
            Local.with_ymd_and_hms(2025, 6, 2, 7, 15, 0).unwrap()
        );
        assert!(trigger > now);
    }

    #[test]
    fn exactly_now_is_not_in_the_future() {
        let now = at(9, 0, 0);
        let trigger = parse_trigger_time(None, "09:00:00", now).unwrap();
        assert_eq!(trigger.date_naive(), now.date_naive().succ_opt().unwrap());
    }

    #[test]
    fn explicit_date_and_short_time() {
        let trigger = parse_trigger_time(Some("2025-12-24"), "18:00", at(9, 0, 0)).unwrap();
        assert_eq!(
            trigger,
            Local.with_ymd_and_hms(2025, 12, 24, 18, 0, 0).unwrap()
        );
    }

    #[test]
    fn past_explicit_date_rolls_one_day() {
        let trigger = parse_trigger_time(Some("2025-05-01"), "08:00:00", at(9, 0, 0)).unwrap();
        assert_eq!(trigger, Local.with_ymd_and_hms(2025, 5, 2, 8, 0, 0).unwrap());
    }

    #[test]
    fn garbage_is_invalid() {
        assert!(matches!(
            parse_trigger_time(None, "half past seven", at(9, 0, 0)),
            Err(ToolError::InvalidArgument { name: "time", .. })
        ));
        assert!(matches!(
            parse_trigger_time(Some("tomorrow"), "07:00:00", at(9, 0, 0)),
            Err(ToolError::InvalidArgument { name: "date", .. })
        ));
    }

    #[tokio::test]
    async fn alarm_confirmation_and_effect() {
        let (ctx, _) = context_at(at(9, 0, 0));
        let tool = ScheduleEventTool::new(EventKind::Alarm);
        let out = tool
            .invoke(&args(json!({"time": "06:45:00", "label": "wake up"})), &ctx)
            .await
            .unwrap();
        assert_eq!(
            out.confirmation,
            "Got it, Sir. I'll set an alarm for wake up at 06:45:00."
        );
        let Some(SideEffect::InsertEvent(draft)) = out.effect else {
            panic!("expected an event insert");
        };
        assert_eq!(draft.kind, EventKind::Alarm);
        assert!(draft.trigger_time > at(9, 0, 0));
    }

    #[tokio::test]
    async fn reminder_prefers_subject() {
        let (ctx, _) = context_at(at(9, 0, 0));
        let tool = ScheduleEventTool::new(EventKind::Reminder);
        let out = tool
            .invoke(
                &args(json!({"time": "17:00:00", "subject": "Call mom", "label": "family"})),
                &ctx,
            )
            .await
            .unwrap();
        assert_eq!(
            out.confirmation,
            "Got it, Sir. I'll set a reminder for Call mom at 17:00:00."
        );
    }

    #[tokio::test]
    async fn missing_time_is_rejected() {
        let (ctx, _) = context_at(at(9, 0, 0));
        let err = ScheduleEventTool::new(EventKind::Alarm)
            .invoke(&args(json!({"label": "x"})), &ctx)
            .await
            .unwrap_err();
        assert_eq!(err, ToolError::MissingArgument("time"));
    }

    #[test]
    fn reminder_schema_requires_subject() {
        let schema = ScheduleEventTool::new(EventKind::Reminder).schema();
        assert_eq!(schema["required"], json!(["time", "subject"]));
        assert!(schema["properties"]["label"].is_null());
    }
}
