use crate::config::{self, Config};
use crate::error::AppError;
use crate::model::{Task, TaskRecord};
use crate::storage::lock::{DEFAULT_LOCK_TIMEOUT_MS, FileLock};
use crate::storage::{
    Collection, Commit, FIRST_ID, Store, id_counter_exhausted, run_transaction,
};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;

pub const SCHEMA_VERSION: u32 = 1;
const STORE_FILE_NAME: &str = "todos.json";
const STORE_ENV_VAR: &str = "TODOAPP_STORE_PATH";

#[derive(Debug, Deserialize)]
struct StoredCollection {
    #[serde(default = "default_schema_version")]
    schema_version: u32,
    #[serde(default = "default_next_id")]
    next_id: u64,
    #[serde(default)]
    tasks: Vec<TaskRecord>,
}

#[derive(Debug, Serialize)]
struct StoredCollectionRef<'a> {
    schema_version: u32,
    next_id: u64,
    tasks: &'a [Task],
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

fn default_next_id() -> u64 {
    FIRST_ID
}

/// `TODOAPP_STORE_PATH`, then the configured `data_file`, then the app directory.
pub fn store_path(config: &Config) -> Result<PathBuf, AppError> {
    if let Ok(path) = std::env::var(STORE_ENV_VAR)
        && !path.trim().is_empty()
    {
        return Ok(PathBuf::from(path));
    }

    if let Some(path) = config.data_file.as_ref() {
        return Ok(path.clone());
    }

    Ok(config::app_dir()?.join(STORE_FILE_NAME))
}

/// The collection as one pretty-printed JSON file.
///
/// Reads never lock: saves replace the file with a rename, so a reader sees
/// either the old or the new content. Transactions hold `<file>.lock`.
#[derive(Debug, Clone)]
pub struct JsonStore {
    path: PathBuf,
    lock_timeout: Duration,
}

impl JsonStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            lock_timeout: Duration::from_millis(DEFAULT_LOCK_TIMEOUT_MS),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let store = Self::new(store_path(config)?);
        Ok(match config.lock_timeout_ms {
            Some(millis) => store.with_lock_timeout(Duration::from_millis(millis)),
            None => store,
        })
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(".lock");
        PathBuf::from(name)
    }

    fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

impl Store for JsonStore {
    fn load(&self) -> Result<Collection, AppError> {
        if !self.path.exists() {
            tracing::debug!(path = %self.path.display(), "no data file yet, starting empty");
            return Ok(Collection::default());
        }

        let content = std::fs::read_to_string(&self.path)
            .map_err(|err| AppError::io(format!("{}: {}", self.path.display(), err)))?;
        let collection = parse_collection(&content).map_err(|err| match err {
            AppError::InvalidData(message) => AppError::invalid_data(format!(
                "failed to parse {} ({message}). Fix or delete it.",
                self.file_name()
            )),
            other => other,
        })?;

        tracing::debug!(
            path = %self.path.display(),
            tasks = collection.tasks.len(),
            next_id = collection.next_id,
            "loaded collection"
        );
        Ok(collection)
    }

    fn save(&self, collection: &Collection) -> Result<(), AppError> {
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent)
            .map_err(|err| AppError::io(format!("{}: {}", parent.display(), err)))?;

        let content = render_collection(collection)?;
        let mut temp = NamedTempFile::new_in(&parent)
            .map_err(|err| AppError::io(format!("{}: {}", parent.display(), err)))?;
        temp.write_all(content.as_bytes())
            .and_then(|()| temp.as_file().sync_all())
            .map_err(|err| AppError::io(err.to_string()))?;
        temp.persist(&self.path)
            .map_err(|err| AppError::io(format!("{}: {}", self.path.display(), err.error)))?;

        tracing::debug!(
            path = %self.path.display(),
            tasks = collection.tasks.len(),
            next_id = collection.next_id,
            "saved collection"
        );
        Ok(())
    }

    fn transact<T, F>(&self, apply: F) -> Result<T, AppError>
    where
        F: FnOnce(&mut Collection) -> Result<Commit<T>, AppError>,
    {
        let _lock = FileLock::acquire(&self.lock_path(), self.lock_timeout)?;
        run_transaction(self, apply)
    }
}

/// Parses file content into a normalized collection.
pub fn parse_collection(content: &str) -> Result<Collection, AppError> {
    let stored: StoredCollection =
        serde_json::from_str(content).map_err(|err| AppError::invalid_data(err.to_string()))?;

    if !(1..=SCHEMA_VERSION).contains(&stored.schema_version) {
        return Err(AppError::invalid_data(format!(
            "unsupported schema_version {}",
            stored.schema_version
        )));
    }

    let tasks = stored
        .tasks
        .into_iter()
        .map(TaskRecord::into_task)
        .collect::<Result<Vec<_>, _>>()?;

    // A hand-edited counter must never hand out an id that is still in use.
    let floor = match tasks.iter().map(|task| task.id).max() {
        Some(max_id) => max_id.checked_add(1).ok_or_else(id_counter_exhausted)?,
        None => FIRST_ID,
    };
    let next_id = stored.next_id.max(floor);

    Ok(Collection { next_id, tasks })
}

pub fn render_collection(collection: &Collection) -> Result<String, AppError> {
    let stored = StoredCollectionRef {
        schema_version: SCHEMA_VERSION,
        next_id: collection.next_id,
        tasks: &collection.tasks,
    };
    serde_json::to_string_pretty(&stored).map_err(|err| AppError::invalid_data(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::{JsonStore, SCHEMA_VERSION, parse_collection};
    use crate::error::AppError;
    use crate::model::Task;
    use crate::storage::{Collection, Commit, Store};
    use std::fs;
    use std::path::PathBuf;
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    fn temp_path(file_name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("todoapp-{nanos}-{file_name}"))
    }

    fn sample() -> Collection {
        let mut done = Task::new(
            2,
            "牛乳を買う".to_string(),
            Some("2025-12-24".to_string()),
            "2025-12-20T00:00:00Z".to_string(),
        );
        done.mark_done("2025-12-21T10:00:00Z".to_string());
        Collection {
            next_id: 3,
            tasks: vec![
                Task::new(1, "demo".into(), None, "2025-12-20T00:00:00Z".into()),
                done,
            ],
        }
    }

    #[test]
    fn missing_file_loads_empty_collection() {
        let store = JsonStore::new(temp_path("missing.json"));
        let loaded = store.load().unwrap();

        assert_eq!(loaded, Collection::default());
        assert_eq!(loaded.next_id, 1);
    }

    #[test]
    fn save_and_load_round_trip() {
        let path = temp_path("round-trip.json");
        let store = JsonStore::new(&path);

        store.save(&sample()).unwrap();
        let loaded = store.load().unwrap();
        store.save(&loaded).unwrap();
        let reloaded = store.load().unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(loaded, sample());
        assert_eq!(reloaded, sample());
    }

    #[test]
    fn saved_file_uses_documented_layout() {
        let path = temp_path("layout.json");
        let store = JsonStore::new(&path);
        store.save(&sample()).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&content).unwrap();
        fs::remove_file(&path).ok();

        assert!(content.contains("牛乳を買う"));
        assert!(content.contains("\n  \"next_id\": 3"));
        assert_eq!(value["schema_version"], SCHEMA_VERSION);
        assert_eq!(value["tasks"][0]["due"], serde_json::Value::Null);
        assert_eq!(value["tasks"][0]["completed_at"], serde_json::Value::Null);
        assert_eq!(value["tasks"][1]["completed"], true);
        assert_eq!(value["tasks"][1]["completed_at"], "2025-12-21T10:00:00Z");
    }

    #[test]
    fn save_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a").join("b").join("todos.json");
        let store = JsonStore::new(&path);

        store.save(&Collection::default()).unwrap();

        assert!(path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn saved_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("todos.json");
        JsonStore::new(&path).save(&sample()).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn legacy_file_without_schema_or_defaults_loads() {
        let collection = parse_collection(
            r#"{"tasks": [{"id": 1, "title": "old", "due": "2025-01-01"}]}"#,
        )
        .unwrap();

        assert_eq!(collection.next_id, 2);
        assert_eq!(collection.tasks.len(), 1);
        assert!(!collection.tasks[0].completed);
        assert_eq!(collection.tasks[0].due.as_deref(), Some("2025-01-01"));
    }

    #[test]
    fn empty_object_is_an_empty_collection() {
        assert_eq!(parse_collection("{}").unwrap(), Collection::default());
    }

    #[test]
    fn stale_counter_is_raised_past_existing_ids() {
        let collection = parse_collection(
            r#"{"next_id": 2, "tasks": [{"id": 5, "title": "a"}, {"id": 1, "title": "b"}]}"#,
        )
        .unwrap();

        assert_eq!(collection.next_id, 6);
    }

    #[test]
    fn counter_ahead_of_ids_is_kept() {
        let collection =
            parse_collection(r#"{"next_id": 40, "tasks": [{"id": 3, "title": "a"}]}"#).unwrap();

        assert_eq!(collection.next_id, 40);
    }

    #[test]
    fn unparseable_file_is_fatal() {
        let path = temp_path("corrupt.json");
        fs::write(&path, "{ not json").unwrap();

        let err = JsonStore::new(&path).load().unwrap_err();
        fs::remove_file(&path).ok();

        assert_eq!(err.code(), "invalid_data");
        assert!(err.message().contains("Fix or delete it"));
    }

    #[test]
    fn non_object_root_is_fatal() {
        let err = parse_collection("[1, 2, 3]").unwrap_err();
        assert_eq!(err.code(), "invalid_data");
    }

    #[test]
    fn non_integer_id_aborts_the_load() {
        let err = parse_collection(
            r#"{"next_id": 3, "tasks": [{"id": 1, "title": "ok"}, {"id": "two", "title": "bad"}]}"#,
        )
        .unwrap_err();

        assert_eq!(err.code(), "invalid_data");
    }

    #[test]
    fn largest_possible_id_is_data_error() {
        let err = parse_collection(r#"{"tasks": [{"id": 18446744073709551615, "title": "x"}]}"#)
            .unwrap_err();

        assert_eq!(err, AppError::invalid_data("id counter exhausted"));
    }

    #[test]
    fn corrupt_large_id_fails_load_with_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("todos.json");
        fs::write(
            &path,
            r#"{"next_id": 2, "tasks": [{"id": 18446744073709551615, "title": "x"}]}"#,
        )
        .unwrap();

        let err = JsonStore::new(&path).load().unwrap_err();
        assert_eq!(err.code(), "invalid_data");
        assert!(err.message().contains("todos.json"));
        assert!(err.message().contains("id counter exhausted"));
    }

    #[test]
    fn newer_schema_is_rejected() {
        let content = format!(r#"{{"schema_version": {}, "tasks": []}}"#, SCHEMA_VERSION + 1);
        let err = parse_collection(&content).unwrap_err();

        assert_eq!(err.code(), "invalid_data");
    }

    #[test]
    fn transaction_holds_lock_until_done() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("todos.json");
        let store = JsonStore::new(&path).with_lock_timeout(Duration::from_millis(50));
        let other = store.clone();

        let nested = store
            .transact(|collection| {
                collection.allocate_id()?;
                let blocked = other.transact(|_| Ok(Commit::Discard(())));
                Ok(Commit::Save(blocked))
            })
            .unwrap();

        assert_eq!(nested.unwrap_err().code(), "io_error");
        assert_eq!(store.load().unwrap().next_id, 2);
        other.transact(|_| Ok(Commit::Discard(()))).unwrap();
    }
}
