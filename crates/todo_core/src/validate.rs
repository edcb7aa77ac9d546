//! Input checks shared by the front ends.
//!
//! The operations in [`crate::task_api`] trust their arguments; anything a
//! user typed goes through here first.

use crate::error::AppError;
use crate::model::format_date;
use time::Date;
use time::macros::format_description;

pub fn normalize_title(raw: &str) -> Result<String, AppError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AppError::invalid_input("title is required"));
    }
    Ok(trimmed.to_string())
}

/// Parses a `YYYY-MM-DD` due date and returns it in canonical form.
pub fn parse_due(raw: &str) -> Result<String, AppError> {
    let trimmed = raw.trim();
    let date = Date::parse(trimmed, format_description!("[year]-[month]-[day]")).map_err(|_| {
        AppError::invalid_input(format!(
            "invalid date '{trimmed}'. Use YYYY-MM-DD (e.g., 2025-09-01)"
        ))
    })?;
    format_date(date)
}

/// Blank input means "no due date"; anything else must parse.
pub fn parse_optional_due(raw: Option<&str>) -> Result<Option<String>, AppError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => parse_due(value).map(Some),
    }
}
