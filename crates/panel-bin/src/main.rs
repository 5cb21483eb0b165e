use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use proxy_panel_lib::{
    auth::hash_password,
    config::{LogFormat, Settings},
    create_router, AppState,
};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "proxy-panel", version, about = "Admin panel for proxy server accounts")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the panel
    Serve {
        /// Path to the configuration file
        #[arg(short, long, env = "PANEL_CONFIG")]
        config: Option<PathBuf>,

        /// Override the listen address
        #[arg(short, long)]
        bind: Option<SocketAddr>,

        /// Override the log level
        #[arg(long)]
        log_level: Option<String>,
    },
    /// Print the digest to put under `auth.users` for a password
    HashPassword {
        password: String,
    },
}

fn init_tracing(settings: &Settings) {
    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.log_level.to_lowercase()));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match settings.log_format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("unable to listen for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!("unable to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("shutdown signal received");
}

async fn serve(
    config: Option<PathBuf>,
    bind: Option<SocketAddr>,
    log_level: Option<String>,
) -> anyhow::Result<()> {
    let mut settings = Settings::load(config.as_deref()).context("failed to load configuration")?;
    if let Some(bind) = bind {
        settings.bind_addr = bind;
    }
    if let Some(level) = log_level {
        settings.log_level = level;
    }
    settings.validate().context("invalid configuration")?;

    init_tracing(&settings);
    if settings.auth.users.is_empty() {
        tracing::warn!("no operators configured under auth.users; nobody can log in");
    }

    let addr = settings.bind_addr;
    let state = AppState::new(settings).context("failed to initialise application state")?;
    let app = create_router(state.clone());

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("listening on {addr}");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    state.shutdown().await;
    info!("server stopped");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            config,
            bind,
            log_level,
        } => serve(config, bind, log_level).await,
        Command::HashPassword { password } => {
            println!("{}", hash_password(&password));
            Ok(())
        },
    }
}
