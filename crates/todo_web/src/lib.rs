//! Form-based web front end for the task list.
//!
//! Every handler parses the request, runs one core operation on a blocking
//! thread and either renders a page or redirects back to the listing with a
//! flash message for the requesting browser.

pub mod flash;
pub mod handlers;
pub mod views;

use axum::Router;
use axum::routing::{get, post};
use flash::FlashStore;
use std::sync::Arc;
use todo_core::storage::Store;

pub struct AppState<S> {
    pub store: Arc<S>,
    pub flashes: Arc<FlashStore>,
}

impl<S> AppState<S> {
    pub fn new(store: S) -> Self {
        Self {
            store: Arc::new(store),
            flashes: Arc::new(FlashStore::default()),
        }
    }
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            flashes: Arc::clone(&self.flashes),
        }
    }
}

pub fn router<S>(state: AppState<S>) -> Router
where
    S: Store + Send + Sync + 'static,
{
    Router::new()
        .route("/", get(handlers::index::<S>))
        .route("/add", post(handlers::add::<S>))
        .route("/toggle/{id}", post(handlers::toggle::<S>))
        .route("/delete/{id}", post(handlers::delete::<S>))
        .route(
            "/edit/{id}",
            get(handlers::edit_form::<S>).post(handlers::edit_submit::<S>),
        )
        .with_state(state)
}
