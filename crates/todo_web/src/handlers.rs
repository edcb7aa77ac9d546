use crate::AppState;
use crate::flash::{FlashLevel, FlashSession};
use crate::views::{EditPage, ErrorPage, IndexPage, TaskView, filter_tabs};
use askama::Template;
use axum::Form;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;
use todo_core::error::AppError;
use todo_core::model::local_today;
use todo_core::query::{self, ListKind};
use todo_core::stats;
use todo_core::storage::Store;
use todo_core::task_api::{self, TaskEdit};
use todo_core::validate;

const MSG_TITLE_REQUIRED: &str = "Please enter a title";
const MSG_BAD_DUE: &str = "Due dates must use the YYYY-MM-DD format";

#[derive(Debug, Error)]
pub enum WebError {
    #[error(transparent)]
    App(#[from] AppError),
    #[error("template rendering failed: {0}")]
    Render(#[from] askama::Error),
    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            Self::App(err) if !err.is_fatal() => {
                (StatusCode::BAD_REQUEST, err.code(), err.message().to_string())
            }
            Self::App(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                err.code(),
                err.message().to_string(),
            ),
            Self::Render(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "render_error",
                self.to_string(),
            ),
            Self::Join(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                self.to_string(),
            ),
        };
        tracing::error!(%status, code, "{message}");

        match (ErrorPage { code, message }).render() {
            Ok(body) => (status, Html(body)).into_response(),
            Err(_) => (status, self.to_string()).into_response(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub filter: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ToggleQuery {
    #[serde(default)]
    pub act: Option<String>,
    #[serde(default)]
    pub filter: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AddForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub due: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct EditForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub due: String,
    #[serde(default)]
    pub clear_due: Option<String>,
    #[serde(default)]
    pub undone: Option<String>,
}

/// Unknown or missing filters fall back to `pending`.
fn list_kind(raw: Option<&str>) -> ListKind {
    raw.and_then(|value| value.parse().ok()).unwrap_or_default()
}

fn checked(value: Option<&str>) -> bool {
    value == Some("on")
}

fn listing(kind: ListKind) -> Redirect {
    Redirect::to(&format!("/?filter={kind}"))
}

async fn blocking<S, T, F>(state: &AppState<S>, operation: F) -> Result<T, WebError>
where
    S: Store + Send + Sync + 'static,
    T: Send + 'static,
    F: FnOnce(&S) -> Result<T, AppError> + Send + 'static,
{
    let store = Arc::clone(&state.store);
    Ok(tokio::task::spawn_blocking(move || operation(&store)).await??)
}

pub async fn index<S>(
    State(state): State<AppState<S>>,
    Query(query): Query<ListQuery>,
    session: FlashSession,
) -> Result<(FlashSession, Html<String>), WebError>
where
    S: Store + Send + Sync + 'static,
{
    let kind = list_kind(query.filter.as_deref());
    let (tasks, counts, today) = blocking(&state, move |store| {
        let tasks = query::list_tasks(store, kind)?;
        let counts = stats::stats(store)?;
        Ok((tasks, counts, local_today()?))
    })
    .await?;

    let page = IndexPage {
        filter: kind.as_str(),
        tabs: filter_tabs(kind),
        tasks: tasks.iter().map(|task| TaskView::new(task, &today)).collect(),
        stats: counts,
        flashes: state.flashes.take(&session),
        today,
    };
    Ok((session, Html(page.render()?)))
}

pub async fn add<S>(
    State(state): State<AppState<S>>,
    Query(query): Query<ListQuery>,
    session: FlashSession,
    Form(form): Form<AddForm>,
) -> Result<(FlashSession, Redirect), WebError>
where
    S: Store + Send + Sync + 'static,
{
    let kind = list_kind(query.filter.as_deref());
    let Ok(title) = validate::normalize_title(&form.title) else {
        state.flashes.push(&session, FlashLevel::Warning, MSG_TITLE_REQUIRED);
        return Ok((session, listing(kind)));
    };
    let Ok(due) = validate::parse_optional_due(Some(&form.due)) else {
        state.flashes.push(&session, FlashLevel::Warning, MSG_BAD_DUE);
        return Ok((session, listing(kind)));
    };

    let task = blocking(&state, move |store| {
        task_api::add_task(store, &title, due.as_deref())
    })
    .await?;
    state.flashes.push(
        &session,
        FlashLevel::Success,
        format!("Added: #{} {}", task.id, task.title),
    );
    Ok((session, listing(kind)))
}

pub async fn toggle<S>(
    State(state): State<AppState<S>>,
    Path(id): Path<u64>,
    Query(query): Query<ToggleQuery>,
    session: FlashSession,
) -> Result<(FlashSession, Redirect), WebError>
where
    S: Store + Send + Sync + 'static,
{
    let kind = list_kind(query.filter.as_deref());
    let act = query.act.unwrap_or_default();

    let found = blocking(&state, move |store| match act.as_str() {
        "done" => {
            if !task_api::mark_done(store, &[id])?.is_empty() {
                return Ok(true);
            }
            Ok(task_api::get_task(store, id)?.is_some())
        }
        "undone" => {
            let changes = TaskEdit {
                undone: true,
                ..TaskEdit::default()
            };
            Ok(task_api::edit_task(store, id, &changes)?.is_some())
        }
        _ => Ok(task_api::toggle_task(store, id)?.is_some()),
    })
    .await?;

    if !found {
        state
            .flashes
            .push(&session, FlashLevel::Warning, format!("Not found: #{id}"));
    }
    Ok((session, listing(kind)))
}

pub async fn delete<S>(
    State(state): State<AppState<S>>,
    Path(id): Path<u64>,
    Query(query): Query<ListQuery>,
    session: FlashSession,
) -> Result<(FlashSession, Redirect), WebError>
where
    S: Store + Send + Sync + 'static,
{
    let kind = list_kind(query.filter.as_deref());
    let removed = blocking(&state, move |store| task_api::delete_tasks(store, &[id])).await?;

    if removed > 0 {
        state
            .flashes
            .push(&session, FlashLevel::Info, format!("Deleted: #{id}"));
    } else {
        state
            .flashes
            .push(&session, FlashLevel::Warning, format!("Not found: #{id}"));
    }
    Ok((session, listing(kind)))
}

pub async fn edit_form<S>(
    State(state): State<AppState<S>>,
    Path(id): Path<u64>,
    Query(query): Query<ListQuery>,
    session: FlashSession,
) -> Result<Response, WebError>
where
    S: Store + Send + Sync + 'static,
{
    let kind = list_kind(query.filter.as_deref());
    let found = blocking(&state, move |store| {
        let Some(task) = task_api::get_task(store, id)? else {
            return Ok(None);
        };
        Ok(Some((task, stats::stats(store)?, local_today()?)))
    })
    .await?;

    let Some((task, counts, today)) = found else {
        state
            .flashes
            .push(&session, FlashLevel::Warning, format!("Not found: #{id}"));
        return Ok((session, listing(kind)).into_response());
    };

    let page = EditPage {
        filter: kind.as_str(),
        task: TaskView::new(&task, &today),
        stats: counts,
        flashes: state.flashes.take(&session),
    };
    Ok((session, Html(page.render()?)).into_response())
}

pub async fn edit_submit<S>(
    State(state): State<AppState<S>>,
    Path(id): Path<u64>,
    Query(query): Query<ListQuery>,
    session: FlashSession,
    Form(form): Form<EditForm>,
) -> Result<(FlashSession, Redirect), WebError>
where
    S: Store + Send + Sync + 'static,
{
    let kind = list_kind(query.filter.as_deref());
    let back_to_form = Redirect::to(&format!("/edit/{id}?filter={kind}"));
    let clear_due = checked(form.clear_due.as_deref());

    let Ok(title) = validate::normalize_title(&form.title) else {
        state.flashes.push(&session, FlashLevel::Warning, MSG_TITLE_REQUIRED);
        return Ok((session, back_to_form));
    };
    let due = match validate::parse_optional_due(Some(&form.due)) {
        Ok(due) => due,
        Err(_) if clear_due => None,
        Err(_) => {
            state.flashes.push(&session, FlashLevel::Warning, MSG_BAD_DUE);
            return Ok((session, back_to_form));
        }
    };

    let changes = TaskEdit {
        title: Some(title),
        due,
        clear_due,
        undone: checked(form.undone.as_deref()),
    };
    let updated = blocking(&state, move |store| task_api::edit_task(store, id, &changes)).await?;

    match updated {
        Some(task) => state
            .flashes
            .push(&session, FlashLevel::Success, format!("Updated: #{}", task.id)),
        None => state
            .flashes
            .push(&session, FlashLevel::Warning, format!("Not found: #{id}")),
    }
    Ok((session, listing(kind)))
}
