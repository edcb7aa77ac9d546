mod task;

pub(crate) use task::format_date;
pub use task::{Task, TaskRecord, display_timestamp, local_today, now_timestamp};
