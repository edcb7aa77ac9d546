use crate::error::AppError;
use crate::model::Task;
use crate::storage::Store;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Sorts due-less tasks after every dated one.
pub const NO_DUE_SENTINEL: &str = "9999-12-31";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ListKind {
    #[default]
    Pending,
    All,
    Done,
}

impl ListKind {
    pub const ALL: [ListKind; 3] = [ListKind::Pending, ListKind::All, ListKind::Done];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::All => "all",
            Self::Done => "done",
        }
    }

    fn includes(self, task: &Task) -> bool {
        match self {
            Self::Pending => !task.completed,
            Self::Done => task.completed,
            Self::All => true,
        }
    }
}

impl FromStr for ListKind {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(Self::Pending),
            "all" => Ok(Self::All),
            "done" => Ok(Self::Done),
            other => Err(AppError::invalid_input(format!(
                "unknown list filter '{other}'"
            ))),
        }
    }
}

impl fmt::Display for ListKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn list_tasks<S: Store>(store: &S, kind: ListKind) -> Result<Vec<Task>, AppError> {
    Ok(select_tasks(store.load()?.tasks, kind))
}

/// Filters `tasks` for `kind` and puts them in display order.
pub fn select_tasks(tasks: Vec<Task>, kind: ListKind) -> Vec<Task> {
    let mut selected: Vec<Task> = tasks.into_iter().filter(|task| kind.includes(task)).collect();
    match kind {
        ListKind::Pending | ListKind::All => selected.sort_by(by_due_then_created),
        ListKind::Done => selected.sort_by(by_completion_desc),
    }
    selected
}

fn by_due_then_created(a: &Task, b: &Task) -> Ordering {
    let key = |task: &Task| {
        (
            task.due.is_none(),
            task.due
                .as_deref()
                .filter(|due| !due.is_empty())
                .unwrap_or(NO_DUE_SENTINEL)
                .to_owned(),
        )
    };
    key(a)
        .cmp(&key(b))
        .then_with(|| a.created_at.cmp(&b.created_at))
}

fn by_completion_desc(a: &Task, b: &Task) -> Ordering {
    let key = |task: &Task| task.completed_at.clone().unwrap_or_default();
    key(b).cmp(&key(a))
}
