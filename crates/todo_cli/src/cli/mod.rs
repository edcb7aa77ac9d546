use clap::{Args, Parser, Subcommand};
use todo_core::query::ListKind;
use todo_core::task_api::{ClearMode, TaskEdit};
use todo_core::validate;

#[derive(Parser, Debug)]
#[command(name = "todo", author, version, about = "Simple ToDo CLI", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Output JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Override configuration values (format KEY=VALUE)
    #[arg(long = "config-override", value_name = "KEY=VALUE", global = true)]
    pub config_override: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Add a new task
    ///
    /// Example: todo add "Buy milk" --due 2025-09-01
    Add {
        title: String,
        /// Due date YYYY-MM-DD
        #[arg(long, value_name = "YYYY-MM-DD", value_parser = parse_due_arg)]
        due: Option<String>,
    },
    /// List tasks (pending by default)
    ///
    /// Example: todo list --all
    List {
        #[command(flatten)]
        filter: ListFilter,
    },
    /// Mark task(s) as done
    ///
    /// Example: todo done 3 4
    Done {
        #[arg(required = true, value_name = "ID")]
        ids: Vec<u64>,
    },
    /// Delete task(s)
    ///
    /// Example: todo delete 2
    Delete {
        #[arg(required = true, value_name = "ID")]
        ids: Vec<u64>,
    },
    /// Edit a task
    ///
    /// Example: todo edit 5 --title "Buy oat milk" --due 2025-09-03
    /// Example: todo edit 5 --clear-due
    /// Example: todo edit 5 --undone
    Edit {
        id: u64,
        /// New title
        #[arg(long)]
        title: Option<String>,
        /// New due date YYYY-MM-DD
        #[arg(long, value_name = "YYYY-MM-DD", value_parser = parse_due_arg, conflicts_with = "clear_due")]
        due: Option<String>,
        /// Clear due date
        #[arg(long)]
        clear_due: bool,
        /// Mark task back to pending
        #[arg(long)]
        undone: bool,
    },
    /// Clear tasks
    ///
    /// Example: todo clear --done
    /// Example: todo clear --all
    Clear {
        #[command(flatten)]
        target: ClearTarget,
    },
    /// Show simple stats
    Stats,
}

#[derive(Args, Debug, Default)]
#[group(multiple = false)]
pub struct ListFilter {
    /// Show all tasks
    #[arg(long)]
    pub all: bool,
    /// Show completed tasks
    #[arg(long)]
    pub done: bool,
    /// Show pending tasks (default)
    #[arg(long)]
    pub pending: bool,
}

impl ListFilter {
    pub fn kind(&self) -> ListKind {
        if self.all {
            ListKind::All
        } else if self.done {
            ListKind::Done
        } else {
            ListKind::Pending
        }
    }
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct ClearTarget {
    /// Remove completed tasks
    #[arg(long)]
    pub done: bool,
    /// Remove all tasks and reset IDs
    #[arg(long)]
    pub all: bool,
}

impl ClearTarget {
    pub fn mode(&self) -> ClearMode {
        if self.all {
            ClearMode::All
        } else {
            ClearMode::Done
        }
    }
}

/// Builds the operation input for `edit`, rejecting a blank `--title`.
pub fn edit_changes(
    title: Option<&str>,
    due: Option<String>,
    clear_due: bool,
    undone: bool,
) -> Result<TaskEdit, todo_core::error::AppError> {
    let title = title.map(validate::normalize_title).transpose()?;
    Ok(TaskEdit {
        title,
        due,
        clear_due,
        undone,
    })
}

fn parse_due_arg(raw: &str) -> Result<String, String> {
    validate::parse_due(raw).map_err(|err| err.message().to_string())
}
