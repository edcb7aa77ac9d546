use clap::Parser;
use clap::error::ErrorKind;
use todo_cli::cli::{Cli, Command, edit_changes};
use todo_cli::render;
use todo_core::config::{self, ConfigOverrides};
use todo_core::error::AppError;
use todo_core::model::Task;
use todo_core::storage::JsonStore;
use todo_core::{query, stats, task_api, validate};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const EXIT_NOT_FOUND: i32 = 1;

fn init_tracing() {
    // Off unless RUST_LOG asks for it, so stdout stays scriptable.
    let filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|raw| EnvFilter::try_new(raw.trim()).ok())
        .unwrap_or_else(|| EnvFilter::new("off"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn normalize_parse_error(err: clap::Error) -> AppError {
    let rendered = err.to_string();
    let first_line = rendered.lines().next().unwrap_or("invalid command").trim();
    let message = first_line
        .strip_prefix("error: ")
        .unwrap_or(first_line)
        .to_string();
    AppError::invalid_input(message)
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<(), AppError> {
    let rendered =
        serde_json::to_string(value).map_err(|err| AppError::invalid_data(err.to_string()))?;
    println!("{rendered}");
    Ok(())
}

fn open_store(cli: &Cli) -> Result<JsonStore, AppError> {
    let overrides = ConfigOverrides::from_args(&cli.config_override)?;
    let loaded = config::load_config_with_fallback();
    if let Some(err) = loaded.error.as_ref() {
        tracing::warn!(error = %err, "ignoring config file");
        eprintln!("WARNING: {err}");
    }
    let config = config::merge_overrides(&loaded.config, &overrides);
    let store = JsonStore::from_config(&config)?;
    tracing::debug!(path = %store.path().display(), "using data file");
    Ok(store)
}

fn run_command(cli: Cli) -> Result<i32, AppError> {
    let store = open_store(&cli)?;

    match cli.command {
        Command::Add { title, due } => {
            let title = validate::normalize_title(&title)?;
            let task = task_api::add_task(&store, &title, due.as_deref())?;
            if cli.json {
                print_json(&task)?;
            } else {
                println!("Added #{}: {}", task.id, task.title);
            }
        }
        Command::List { filter } => {
            let tasks = query::list_tasks(&store, filter.kind())?;
            if cli.json {
                print_json(&tasks)?;
            } else {
                println!("{}", render::format_tasks(&tasks));
            }
        }
        Command::Done { ids } => {
            let updated = task_api::mark_done(&store, &ids)?;
            if cli.json {
                print_json(&updated)?;
            } else if updated.is_empty() {
                println!("No tasks updated. Check IDs or status.");
            } else {
                println!("Marked done: {}", render::format_id_list(&updated));
            }
        }
        Command::Delete { ids } => {
            let removed = task_api::delete_tasks(&store, &ids)?;
            if cli.json {
                print_json(&serde_json::json!({ "deleted": removed }))?;
            } else {
                println!("Deleted {removed} task(s)");
            }
        }
        Command::Edit {
            id,
            title,
            due,
            clear_due,
            undone,
        } => {
            let changes = edit_changes(title.as_deref(), due, clear_due, undone)?;
            let updated: Option<Task> = task_api::edit_task(&store, id, &changes)?;
            let Some(task) = updated else {
                if cli.json {
                    print_json(&serde_json::json!({ "error": "not_found", "id": id }))?;
                } else {
                    println!("Task #{id} not found");
                }
                return Ok(EXIT_NOT_FOUND);
            };
            if cli.json {
                print_json(&task)?;
            } else {
                println!("Updated #{}", task.id);
            }
        }
        Command::Clear { target } => {
            let removed = task_api::clear_tasks(&store, target.mode())?;
            if cli.json {
                print_json(&serde_json::json!({ "removed": removed }))?;
            } else {
                println!("Removed {removed} task(s)");
            }
        }
        Command::Stats => {
            let counts = stats::stats(&store)?;
            if cli.json {
                print_json(&counts)?;
            } else {
                println!("{}", render::format_stats(&counts));
            }
        }
    }

    Ok(0)
}

fn main() {
    init_tracing();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            err.exit()
        }
        Err(err) => {
            eprintln!("ERROR: {}", normalize_parse_error(err));
            std::process::exit(1);
        }
    };

    match run_command(cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            if err.is_fatal() {
                tracing::error!(code = err.code(), "{}", err.message());
            }
            eprintln!("ERROR: {err}");
            std::process::exit(1);
        }
    }
}
