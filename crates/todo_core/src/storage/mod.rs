pub mod json_store;
pub mod lock;

use crate::error::AppError;
use crate::model::Task;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};

pub use json_store::JsonStore;

pub const FIRST_ID: u64 = 1;

/// The whole persisted unit: every task plus the id counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Collection {
    pub next_id: u64,
    pub tasks: Vec<Task>,
}

impl Default for Collection {
    fn default() -> Self {
        Self {
            next_id: FIRST_ID,
            tasks: Vec::new(),
        }
    }
}

pub(crate) fn id_counter_exhausted() -> AppError {
    AppError::invalid_data("id counter exhausted")
}

impl Collection {
    pub fn allocate_id(&mut self) -> Result<u64, AppError> {
        let id = self.next_id;
        self.next_id = id.checked_add(1).ok_or_else(id_counter_exhausted)?;
        Ok(id)
    }

    pub fn find(&self, id: u64) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    pub fn find_mut(&mut self, id: u64) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|task| task.id == id)
    }

    /// Removes every task matching `predicate` and returns how many went.
    pub fn remove_where<F>(&mut self, mut predicate: F) -> usize
    where
        F: FnMut(&Task) -> bool,
    {
        let before = self.tasks.len();
        self.tasks.retain(|task| !predicate(task));
        before - self.tasks.len()
    }

    pub fn reset(&mut self) -> usize {
        let removed = self.tasks.len();
        self.tasks.clear();
        self.next_id = FIRST_ID;
        removed
    }
}

/// What a transaction wants done with the collection it was handed.
#[derive(Debug)]
pub enum Commit<T> {
    Save(T),
    Discard(T),
}

pub trait Store {
    fn load(&self) -> Result<Collection, AppError>;

    fn save(&self, collection: &Collection) -> Result<(), AppError>;

    /// Load, let `apply` modify, then save if it asks to.
    ///
    /// Implementations backed by shared storage hold exclusive access for
    /// the whole call.
    fn transact<T, F>(&self, apply: F) -> Result<T, AppError>
    where
        F: FnOnce(&mut Collection) -> Result<Commit<T>, AppError>,
    {
        run_transaction(self, apply)
    }
}

pub(crate) fn run_transaction<S, T, F>(store: &S, apply: F) -> Result<T, AppError>
where
    S: Store + ?Sized,
    F: FnOnce(&mut Collection) -> Result<Commit<T>, AppError>,
{
    let mut collection = store.load()?;
    match apply(&mut collection)? {
        Commit::Save(value) => {
            store.save(&collection)?;
            Ok(value)
        }
        Commit::Discard(value) => Ok(value),
    }
}

/// Keeps the collection in memory. Used in tests and anywhere a file is unwanted.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collection: Mutex<Collection>,
    saves: AtomicUsize,
}

impl MemoryStore {
    pub fn new(collection: Collection) -> Self {
        Self {
            collection: Mutex::new(collection),
            saves: AtomicUsize::new(0),
        }
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> Collection {
        self.collection.lock().clone()
    }
}

impl Store for MemoryStore {
    fn load(&self) -> Result<Collection, AppError> {
        Ok(self.collection.lock().clone())
    }

    fn save(&self, collection: &Collection) -> Result<(), AppError> {
        *self.collection.lock() = collection.clone();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
