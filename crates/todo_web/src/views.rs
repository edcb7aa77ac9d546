use crate::flash::Flash;
use askama::Template;
use todo_core::model::{Task, display_timestamp};
use todo_core::query::ListKind;
use todo_core::stats::Stats;

/// A task flattened into display strings.
#[derive(Debug, Clone)]
pub struct TaskView {
    pub id: u64,
    pub title: String,
    pub due: String,
    pub has_due: bool,
    pub overdue: bool,
    pub completed: bool,
    pub created: String,
    pub completed_at: String,
}

impl TaskView {
    pub fn new(task: &Task, today: &str) -> Self {
        Self {
            id: task.id,
            title: task.title.clone(),
            due: task.due.clone().unwrap_or_default(),
            has_due: task.due.is_some(),
            overdue: task.is_overdue(today),
            completed: task.completed,
            created: display_timestamp(&task.created_at),
            completed_at: task
                .completed_at
                .as_deref()
                .map(display_timestamp)
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FilterTab {
    pub name: &'static str,
    pub label: &'static str,
    pub active: bool,
}

pub fn filter_tabs(current: ListKind) -> Vec<FilterTab> {
    ListKind::ALL
        .into_iter()
        .map(|kind| FilterTab {
            name: kind.as_str(),
            label: match kind {
                ListKind::Pending => "Pending",
                ListKind::All => "All",
                ListKind::Done => "Done",
            },
            active: kind == current,
        })
        .collect()
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexPage {
    pub filter: &'static str,
    pub tabs: Vec<FilterTab>,
    pub tasks: Vec<TaskView>,
    pub stats: Stats,
    pub flashes: Vec<Flash>,
    pub today: String,
}

#[derive(Template)]
#[template(path = "edit.html")]
pub struct EditPage {
    pub filter: &'static str,
    pub task: TaskView,
    pub stats: Stats,
    pub flashes: Vec<Flash>,
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorPage {
    pub code: &'static str,
    pub message: String,
}
