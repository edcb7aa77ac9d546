use crate::error::AppError;
use crate::model::{Task, now_timestamp};
use crate::storage::{Commit, Store};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Changes requested by `edit`. Title and due date must already be validated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskEdit {
    pub title: Option<String>,
    pub due: Option<String>,
    /// Wins over `due` when both are given.
    pub clear_due: bool,
    pub undone: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearMode {
    Done,
    All,
}

impl FromStr for ClearMode {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "done" => Ok(Self::Done),
            "all" => Ok(Self::All),
            other => Err(AppError::invalid_input(format!(
                "unknown clear mode '{other}'"
            ))),
        }
    }
}

impl fmt::Display for ClearMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Done => "done",
            Self::All => "all",
        })
    }
}

pub fn add_task<S: Store>(store: &S, title: &str, due: Option<&str>) -> Result<Task, AppError> {
    if title.trim().is_empty() {
        return Err(AppError::invalid_input("title is required"));
    }
    let created_at = now_timestamp()?;

    let task = store.transact(|collection| {
        let task = Task::new(
            collection.allocate_id()?,
            title.to_string(),
            due.map(str::to_string),
            created_at,
        );
        collection.tasks.push(task.clone());
        Ok(Commit::Save(task))
    })?;

    tracing::info!(id = task.id, "added task");
    Ok(task)
}

pub fn get_task<S: Store>(store: &S, id: u64) -> Result<Option<Task>, AppError> {
    Ok(store.load()?.find(id).cloned())
}

/// Marks pending tasks done. Unknown ids and finished tasks are skipped.
pub fn mark_done<S: Store>(store: &S, ids: &[u64]) -> Result<Vec<Task>, AppError> {
    let wanted: HashSet<u64> = ids.iter().copied().collect();
    let completed_at = now_timestamp()?;

    let updated = store.transact(|collection| {
        let mut updated = Vec::new();
        for task in collection
            .tasks
            .iter_mut()
            .filter(|task| wanted.contains(&task.id))
        {
            if task.mark_done(completed_at.clone()) {
                updated.push(task.clone());
            }
        }
        Ok(Commit::Save(updated))
    })?;

    tracing::info!(requested = ids.len(), updated = updated.len(), "marked tasks done");
    Ok(updated)
}

/// Applies `changes` to task `id`. `Ok(None)` means no such task; nothing is written then.
pub fn edit_task<S: Store>(
    store: &S,
    id: u64,
    changes: &TaskEdit,
) -> Result<Option<Task>, AppError> {
    let updated = store.transact(|collection| {
        let Some(task) = collection.find_mut(id) else {
            return Ok(Commit::Discard(None));
        };

        if let Some(title) = changes.title.as_ref() {
            task.title = title.clone();
        }
        if changes.clear_due {
            task.due = None;
        } else if let Some(due) = changes.due.as_ref() {
            task.due = Some(due.clone());
        }
        if changes.undone {
            task.reopen();
        }
        Ok(Commit::Save(Some(task.clone())))
    })?;

    match updated.as_ref() {
        Some(task) => tracing::info!(id = task.id, "edited task"),
        None => tracing::debug!(id, "edit target not found"),
    }
    Ok(updated)
}

/// Flips a task between done and pending. `Ok(None)` means no such task.
pub fn toggle_task<S: Store>(store: &S, id: u64) -> Result<Option<Task>, AppError> {
    let completed_at = now_timestamp()?;
    store.transact(|collection| {
        let Some(task) = collection.find_mut(id) else {
            return Ok(Commit::Discard(None));
        };
        if !task.reopen() {
            task.mark_done(completed_at);
        }
        Ok(Commit::Save(Some(task.clone())))
    })
}

/// Removes the given ids and returns how many existed. The id counter is untouched.
pub fn delete_tasks<S: Store>(store: &S, ids: &[u64]) -> Result<usize, AppError> {
    let wanted: HashSet<u64> = ids.iter().copied().collect();
    let removed = store.transact(|collection| {
        Ok(Commit::Save(
            collection.remove_where(|task| wanted.contains(&task.id)),
        ))
    })?;

    tracing::info!(requested = ids.len(), removed, "deleted tasks");
    Ok(removed)
}

/// `Done` drops finished tasks; `All` drops everything and restarts ids at 1.
pub fn clear_tasks<S: Store>(store: &S, mode: ClearMode) -> Result<usize, AppError> {
    let removed = store.transact(|collection| {
        let removed = match mode {
            ClearMode::Done => collection.remove_where(|task| task.completed),
            ClearMode::All => collection.reset(),
        };
        Ok(Commit::Save(removed))
    })?;

    tracing::info!(%mode, removed, "cleared tasks");
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::{
        ClearMode, TaskEdit, add_task, clear_tasks, delete_tasks, edit_task, get_task, mark_done,
        toggle_task,
    };
    use crate::model::Task;
    use crate::storage::{Collection, JsonStore, MemoryStore, Store};
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_path(file_name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("todoapp-{nanos}-{file_name}"))
    }

    fn seeded(tasks: Vec<Task>, next_id: u64) -> MemoryStore {
        MemoryStore::new(Collection { next_id, tasks })
    }

    fn done_task(id: u64, completed_at: &str) -> Task {
        let mut task = Task::new(id, format!("task {id}"), None, "2025-12-01T00:00:00Z".into());
        task.mark_done(completed_at.to_string());
        task
    }

    #[test]
    fn add_task_rejects_blank_title() {
        let store = MemoryStore::default();
        let err = add_task(&store, "  ", None).unwrap_err();

        assert_eq!(err.code(), "invalid_input");
        assert_eq!(store.save_count(), 0);
    }

    #[test]
    fn add_task_writes_to_store() {
        let path = temp_path("add-task.json");
        let store = JsonStore::new(&path);
        let task = add_task(&store, "Buy milk", Some("2099-01-01")).unwrap();
        let loaded = store.load().unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(task.id, 1);
        assert!(!task.completed);
        assert_eq!(loaded.next_id, 2);
        assert_eq!(loaded.tasks, vec![task]);
        assert_eq!(loaded.tasks[0].due.as_deref(), Some("2099-01-01"));
    }

    #[test]
    fn ids_increase_and_are_never_reused() {
        let store = MemoryStore::default();
        let ids: Vec<u64> = (0..3)
            .map(|n| add_task(&store, &format!("t{n}"), None).unwrap().id)
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);

        assert_eq!(delete_tasks(&store, &[3]).unwrap(), 1);
        assert_eq!(add_task(&store, "after delete", None).unwrap().id, 4);

        mark_done(&store, &[4]).unwrap();
        assert_eq!(clear_tasks(&store, ClearMode::Done).unwrap(), 1);
        assert_eq!(add_task(&store, "after clear done", None).unwrap().id, 5);
    }

    #[test]
    fn clear_all_restarts_ids() {
        let store = MemoryStore::default();
        for title in ["a", "b", "c"] {
            add_task(&store, title, None).unwrap();
        }

        assert_eq!(clear_tasks(&store, ClearMode::All).unwrap(), 3);
        assert_eq!(store.snapshot().next_id, 1);
        assert_eq!(add_task(&store, "fresh", None).unwrap().id, 1);
    }

    #[test]
    fn mark_done_skips_unknown_and_finished_tasks() {
        let store = seeded(
            vec![
                Task::new(1, "a".into(), None, "2025-12-01T00:00:00Z".into()),
                done_task(2, "2025-12-02T00:00:00Z"),
            ],
            3,
        );

        let updated = mark_done(&store, &[1, 2, 99]).unwrap();

        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0].id, 1);
        assert!(updated[0].completed_at.is_some());
        let snapshot = store.snapshot();
        assert_eq!(
            snapshot.tasks[1].completed_at.as_deref(),
            Some("2025-12-02T00:00:00Z")
        );
        assert_eq!(store.save_count(), 1);
    }

    #[test]
    fn mark_done_twice_keeps_first_timestamp() {
        let store = MemoryStore::default();
        let task = add_task(&store, "a", None).unwrap();

        let first = mark_done(&store, &[task.id]).unwrap();
        let second = mark_done(&store, &[task.id]).unwrap();

        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
        assert_eq!(
            store.snapshot().tasks[0].completed_at,
            first[0].completed_at
        );
    }

    #[test]
    fn mark_done_with_no_matches_still_saves() {
        let store = MemoryStore::default();
        assert!(mark_done(&store, &[1]).unwrap().is_empty());
        assert_eq!(store.save_count(), 1);
    }

    #[test]
    fn edit_task_missing_id_does_not_save() {
        let store = MemoryStore::default();
        let result = edit_task(&store, 7, &TaskEdit::default()).unwrap();

        assert!(result.is_none());
        assert_eq!(store.save_count(), 0);
    }

    #[test]
    fn edit_task_without_changes_still_saves() {
        let store = seeded(
            vec![Task::new(1, "a".into(), None, "2025-12-01T00:00:00Z".into())],
            2,
        );

        let updated = edit_task(&store, 1, &TaskEdit::default()).unwrap().unwrap();

        assert_eq!(updated.title, "a");
        assert_eq!(store.save_count(), 1);
    }

    #[test]
    fn edit_task_updates_title_and_due() {
        let store = seeded(
            vec![Task::new(1, "a".into(), None, "2025-12-01T00:00:00Z".into())],
            2,
        );
        let changes = TaskEdit {
            title: Some("Buy oat milk".into()),
            due: Some("2025-09-03".into()),
            ..TaskEdit::default()
        };

        let updated = edit_task(&store, 1, &changes).unwrap().unwrap();

        assert_eq!(updated.title, "Buy oat milk");
        assert_eq!(updated.due.as_deref(), Some("2025-09-03"));
        assert_eq!(store.snapshot().tasks[0], updated);
    }

    #[test]
    fn edit_task_clear_due_wins_over_new_due() {
        let store = seeded(
            vec![Task::new(
                1,
                "a".into(),
                Some("2025-01-01".into()),
                "2025-12-01T00:00:00Z".into(),
            )],
            2,
        );
        let changes = TaskEdit {
            due: Some("2025-09-03".into()),
            clear_due: true,
            ..TaskEdit::default()
        };

        let updated = edit_task(&store, 1, &changes).unwrap().unwrap();

        assert_eq!(updated.due, None);
    }

    #[test]
    fn edit_task_undone_reopens_completed_task() {
        let store = seeded(vec![done_task(1, "2025-12-02T00:00:00Z")], 2);
        let changes = TaskEdit {
            undone: true,
            ..TaskEdit::default()
        };

        let updated = edit_task(&store, 1, &changes).unwrap().unwrap();

        assert!(!updated.completed);
        assert_eq!(updated.completed_at, None);
    }

    #[test]
    fn toggle_task_flips_state() {
        let store = MemoryStore::default();
        let task = add_task(&store, "a", None).unwrap();

        let done = toggle_task(&store, task.id).unwrap().unwrap();
        assert!(done.completed);
        assert!(done.completed_at.is_some());

        let pending = toggle_task(&store, task.id).unwrap().unwrap();
        assert!(!pending.completed);
        assert_eq!(pending.completed_at, None);

        assert!(toggle_task(&store, 42).unwrap().is_none());
    }

    #[test]
    fn get_task_finds_by_id() {
        let store = MemoryStore::default();
        let task = add_task(&store, "a", None).unwrap();

        assert_eq!(get_task(&store, task.id).unwrap(), Some(task));
        assert_eq!(get_task(&store, 99).unwrap(), None);
    }

    #[test]
    fn delete_unknown_id_on_empty_store_returns_zero() {
        let path = temp_path("delete-empty.json");
        let store = JsonStore::new(&path);

        let removed = delete_tasks(&store, &[999]).unwrap();
        let loaded = store.load().unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(removed, 0);
        assert_eq!(loaded, Collection::default());
    }

    #[test]
    fn clear_done_keeps_pending_tasks_and_counter() {
        let store = seeded(
            vec![
                done_task(1, "2025-12-02T00:00:00Z"),
                Task::new(2, "b".into(), None, "2025-12-01T00:00:00Z".into()),
            ],
            3,
        );

        assert_eq!(clear_tasks(&store, ClearMode::Done).unwrap(), 1);
        let snapshot = store.snapshot();
        assert_eq!(snapshot.next_id, 3);
        assert_eq!(snapshot.tasks.len(), 1);
        assert_eq!(snapshot.tasks[0].id, 2);
    }

    #[test]
    fn clear_mode_parses_known_values() {
        assert_eq!("done".parse::<ClearMode>().unwrap(), ClearMode::Done);
        assert_eq!("all".parse::<ClearMode>().unwrap(), ClearMode::All);
        assert_eq!(
            "some".parse::<ClearMode>().unwrap_err().code(),
            "invalid_input"
        );
    }
}
