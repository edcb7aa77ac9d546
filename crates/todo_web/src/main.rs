use clap::Parser;
use todo_core::config::{self, ConfigOverrides};
use todo_core::error::AppError;
use todo_core::storage::JsonStore;
use todo_web::{AppState, router};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Debug, Parser)]
#[command(name = "todo-web", version, about = "Serve the task list over HTTP")]
struct Args {
    /// Address to listen on, e.g. 127.0.0.1:5000
    #[arg(long)]
    bind: Option<String>,

    /// Override a config key for this run (KEY=VALUE)
    #[arg(long = "config-override", value_name = "KEY=VALUE")]
    config_override: Vec<String>,
}

fn init_tracing() {
    let filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|raw| EnvFilter::try_new(raw.trim()).ok())
        .unwrap_or_else(|| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

async fn serve(args: Args) -> Result<(), AppError> {
    let mut overrides = ConfigOverrides::from_args(&args.config_override)?;
    if let Some(bind) = args.bind {
        overrides.bind = Some(bind);
    }

    let loaded = config::load_config_with_fallback();
    if let Some(err) = loaded.error.as_ref() {
        tracing::warn!(error = %err, "ignoring config file");
    }
    let config = config::merge_overrides(&loaded.config, &overrides);
    let store = JsonStore::from_config(&config)?;
    tracing::info!(path = %store.path().display(), "using data file");

    let bind = config.bind_or_default().to_string();
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    tracing::info!(%bind, "listening");

    axum::serve(listener, router(AppState::new(store)))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

#[tokio::main]
async fn main() {
    init_tracing();
    let args = Args::parse();

    if let Err(err) = serve(args).await {
        tracing::error!(code = err.code(), "{}", err.message());
        eprintln!("ERROR: {err}");
        std::process::exit(1);
    }
}
