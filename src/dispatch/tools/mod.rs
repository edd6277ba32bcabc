//! Built-in tools and shared argument helpers.

mod apps;
mod music;
mod schedule;
mod search;
mod time;
mod timer;

use std::sync::Arc;

use serde_json::Value;

pub use apps::OpenApplicationTool;
pub use music::FindMusicTool;
pub use schedule::{ScheduleEventTool, parse_trigger_time};
pub use search::{SearchWebTool, render_search};
pub use time::CurrentTimeTool;
pub use timer::SetTimerTool;

use super::registry::{Tool, ToolArgs, ToolError};
use crate::scheduler::EventKind;

/// Every tool the assistant declares to the model.
pub fn builtin_tools() -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(SetTimerTool),
        Arc::new(ScheduleEventTool::new(EventKind::Alarm)),
        Arc::new(ScheduleEventTool::new(EventKind::Reminder)),
        Arc::new(FindMusicTool),
        Arc::new(OpenApplicationTool),
        Arc::new(SearchWebTool),
        Arc::new(CurrentTimeTool),
    ]
}

/// Non-empty trimmed string argument, or [`ToolError::MissingArgument`].
pub(crate) fn required_str<'a>(args: &'a ToolArgs, name: &'static str) -> Result<&'a str, ToolError> {
    optional_str(args, name).ok_or(ToolError::MissingArgument(name))
}

/// Non-empty trimmed string argument, if present.
pub(crate) fn optional_str<'a>(args: &'a ToolArgs, name: &str) -> Option<&'a str> {
    args.get(name)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Positive whole number argument.
///
/// Accepts integers, integral floats (`300.0`) and numeric strings, since
/// models are not always strict about the declared type.
pub(crate) fn required_positive_int(args: &ToolArgs, name: &'static str) -> Result<u64, ToolError> {
    let value = args.get(name).ok_or(ToolError::MissingArgument(name))?;
    let invalid = |reason: &str| ToolError::InvalidArgument {
        name,
        reason: reason.to_string(),
    };

    let number = match value {
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                u
            } else if let Some(f) = n.as_f64() {
                if f.fract() != 0.0 || f < 0.0 || f > u32::MAX as f64 {
                    return Err(invalid("expected a whole number of seconds"));
                }
                f as u64
            } else {
                return Err(invalid("expected a positive number"));
            }
        }
        Value::String(s) => s
            .trim()
            .parse::<u64>()
            .map_err(|_| invalid("expected a whole number"))?,
        Value::Null => return Err(ToolError::MissingArgument(name)),
        _ => return Err(invalid("expected a number")),
    };

    if number == 0 {
        return Err(ToolError::MissingArgument(name));
    }
    Ok(number)
}
