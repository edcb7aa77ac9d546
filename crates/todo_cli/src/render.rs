use tabled::settings::Style;
use tabled::{Table, Tabled};
use todo_core::model::{Task, display_timestamp};
use todo_core::stats::Stats;

#[derive(Tabled)]
struct TaskRow {
    #[tabled(rename = "ID")]
    id: u64,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Due")]
    due: String,
    #[tabled(rename = "Status")]
    status: &'static str,
    #[tabled(rename = "Created")]
    created: String,
}

impl From<&Task> for TaskRow {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id,
            title: task.title.clone(),
            due: task.due.clone().unwrap_or_else(|| "-".to_string()),
            status: status_label(task),
            created: display_timestamp(&task.created_at),
        }
    }
}

pub fn status_label(task: &Task) -> &'static str {
    if task.completed { "done" } else { "pending" }
}

pub fn format_tasks(tasks: &[Task]) -> String {
    if tasks.is_empty() {
        return "(no tasks)".to_string();
    }

    let mut table = Table::new(tasks.iter().map(TaskRow::from));
    table.with(Style::psql());
    table.to_string()
}

pub fn format_stats(stats: &Stats) -> String {
    format!(
        "Total: {} | Pending: {} | Done: {} | Overdue: {}",
        stats.total, stats.pending, stats.done, stats.overdue
    )
}

pub fn format_id_list(tasks: &[Task]) -> String {
    tasks
        .iter()
        .map(|task| format!("#{}", task.id))
        .collect::<Vec<_>>()
        .join(", ")
}
