use crate::error::AppError;
use crate::model::{Task, local_today};
use crate::storage::Store;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub total: usize,
    pub pending: usize,
    pub done: usize,
    pub overdue: usize,
}

pub fn stats<S: Store>(store: &S) -> Result<Stats, AppError> {
    let today = local_today()?;
    Ok(compute_stats(&store.load()?.tasks, &today))
}

/// Counts for `tasks` as seen on `today` (`YYYY-MM-DD`).
pub fn compute_stats(tasks: &[Task], today: &str) -> Stats {
    let total = tasks.len();
    let done = tasks.iter().filter(|task| task.completed).count();
    let overdue = tasks.iter().filter(|task| task.is_overdue(today)).count();

    Stats {
        total,
        pending: total - done,
        done,
        overdue,
    }
}
