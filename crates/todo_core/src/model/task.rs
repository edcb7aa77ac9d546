use crate::error::AppError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::macros::format_description;
use time::{Date, OffsetDateTime, UtcOffset};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Task {
    pub id: u64,
    pub title: String,
    pub completed: bool,
    pub created_at: String,
    pub due: Option<String>,
    pub completed_at: Option<String>,
}

impl Task {
    pub fn new(id: u64, title: String, due: Option<String>, created_at: String) -> Self {
        Self {
            id,
            title,
            completed: false,
            created_at,
            due,
            completed_at: None,
        }
    }

    /// Returns false when the task was already done.
    pub fn mark_done(&mut self, completed_at: String) -> bool {
        if self.completed {
            return false;
        }
        self.completed = true;
        self.completed_at = Some(completed_at);
        true
    }

    /// Returns false when the task was already pending.
    pub fn reopen(&mut self) -> bool {
        if !self.completed {
            return false;
        }
        self.completed = false;
        self.completed_at = None;
        true
    }

    /// `today` is a `YYYY-MM-DD` string; that format orders the same as the calendar.
    pub fn is_overdue(&self, today: &str) -> bool {
        !self.completed
            && self
                .due
                .as_deref()
                .is_some_and(|due| !due.is_empty() && due < today)
    }
}

/// A task as it sits on disk, before defaults are applied.
///
/// Files written by hand or by older versions may lack `completed` or
/// `created_at`, or carry the id as a string. [`TaskRecord::into_task`]
/// settles those cases and rejects records that cannot name their id.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskRecord {
    pub id: Value,
    #[serde(default)]
    pub title: Value,
    #[serde(default)]
    pub completed: Option<bool>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub due: Option<String>,
    #[serde(default)]
    pub completed_at: Option<String>,
}

impl TaskRecord {
    pub fn into_task(self) -> Result<Task, AppError> {
        let id = coerce_id(&self.id)?;
        let title = coerce_title(id, self.title)?;
        let created_at = match self.created_at {
            Some(value) if !value.is_empty() => value,
            _ => now_timestamp()?,
        };

        Ok(Task {
            id,
            title,
            completed: self.completed.unwrap_or(false),
            created_at,
            due: self.due,
            completed_at: self.completed_at,
        })
    }
}

fn coerce_id(value: &Value) -> Result<u64, AppError> {
    let id = match value {
        Value::Number(number) => number.as_u64().or_else(|| {
            number
                .as_f64()
                .filter(|float| *float >= 0.0 && float.fract() == 0.0)
                .map(|float| float as u64)
        }),
        Value::String(text) => text.trim().parse::<u64>().ok(),
        _ => None,
    };

    id.ok_or_else(|| {
        let negative = match value {
            Value::Number(number) => number.as_f64().is_some_and(|float| float < 0.0),
            Value::String(text) => text.trim().starts_with('-'),
            _ => false,
        };
        if negative {
            AppError::invalid_data(format!("task id {value} is negative"))
        } else {
            AppError::invalid_data(format!("task id {value} is not an integer"))
        }
    })
}

fn coerce_title(id: u64, value: Value) -> Result<String, AppError> {
    match value {
        Value::String(text) => Ok(text),
        Value::Number(number) => Ok(number.to_string()),
        Value::Bool(flag) => Ok(flag.to_string()),
        _ => Err(AppError::invalid_data(format!(
            "task #{id} has no usable title"
        ))),
    }
}

/// Current UTC time as `YYYY-MM-DDTHH:MM:SSZ`.
pub fn now_timestamp() -> Result<String, AppError> {
    OffsetDateTime::now_utc()
        .format(format_description!(
            "[year]-[month]-[day]T[hour]:[minute]:[second]Z"
        ))
        .map_err(|err| AppError::invalid_data(err.to_string()))
}

/// Today's date in the local zone, falling back to UTC when the offset is unknown.
pub fn local_today() -> Result<String, AppError> {
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    format_date(OffsetDateTime::now_utc().to_offset(offset).date())
}

/// `2025-09-01T08:30:00Z` becomes `2025-09-01 08:30:00`.
pub fn display_timestamp(timestamp: &str) -> String {
    timestamp.replacen('T', " ", 1).trim_end_matches('Z').to_string()
}

pub(crate) fn format_date(date: Date) -> Result<String, AppError> {
    date.format(format_description!("[year]-[month]-[day]"))
        .map_err(|err| AppError::invalid_data(err.to_string()))
}
