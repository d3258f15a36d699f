use axum::{
    extract::{Path, State},
    Json,
};

use crate::errors::AppError;
use crate::roster::Assignee;
use crate::state::AppState;

/// Roster days are days of the month.
pub fn ensure_valid_day(day: u32) -> Result<(), AppError> {
    if !(1..=31).contains(&day) {
        return Err(AppError::Validation(format!(
            "day must be between 1 and 31, got {day}"
        )));
    }
    Ok(())
}

/// GET /api/v1/roster/:position/:day
///
/// Returns who answers for `position` on `day` (day of the month, 1–31).
pub async fn handle_resolve_assignee(
    State(state): State<AppState>,
    Path((position, day)): Path<(String, u32)>,
) -> Result<Json<Assignee>, AppError> {
    ensure_valid_day(day)?;

    state
        .roster
        .resolve_assignee(&position, day)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("No assignee for position '{position}'")))
}
