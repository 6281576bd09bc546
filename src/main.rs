use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use std::{
    io::{self, BufRead, Write},
    path::{Path, PathBuf},
};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use dropshelf::{
    build_router,
    config::{Config, DEFAULT_CONFIG_FILE},
    state::AppState,
    tunnel,
};

#[derive(Parser, Debug)]
#[command(
    name = "dropshelf",
    version,
    about = "Share a directory over HTTP",
    disable_version_flag = true
)]
struct Args {
    /// Print version
    #[arg(short = 'v', long = "version", action = ArgAction::Version)]
    version: Option<bool>,

    /// Configuration file
    #[arg(long, env = "DROPSHELF_CONFIG", default_value = DEFAULT_CONFIG_FILE, global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a default configuration file
    Init {
        /// Where to write it (defaults to the --config path)
        path: Option<PathBuf>,
    },
    /// Print version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dropshelf=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load .env file if present (silently ignored if absent).
    dotenvy::dotenv().ok();

    let args = Args::parse();

    match args.command {
        Some(Command::Init { path }) => init(&path.unwrap_or(args.config)),
        Some(Command::Version) => {
            println!("dropshelf {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        None => serve(&args.config).await,
    }
}

fn init(path: &Path) -> anyhow::Result<()> {
    if path.exists() && !confirm(&format!(
        "The file {} already exists. Overwrite it? (y/n): ",
        path.display()
    ))? {
        println!("Operation cancelled.");
        return Ok(());
    }

    let config = Config::default();
    config.save(path)?;
    println!("Configuration file generated: {}", path.display());
    println!(
        "Default user: {} / Password: {}",
        config.username, config.password
    );
    println!("IMPORTANT: change the default credentials.");
    Ok(())
}

fn confirm(prompt: &str) -> anyhow::Result<bool> {
    print!("{prompt}");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(answer.trim().eq_ignore_ascii_case("y"))
}

async fn serve(config_path: &Path) -> anyhow::Result<()> {
    let config = match Config::load(config_path)? {
        Some(config) => config,
        None => {
            tracing::info!(
                "configuration file not found, creating {} with default values",
                config_path.display()
            );
            let config = Config::default();
            config.save(config_path)?;
            tracing::warn!(
                "default user: {} / password: {}. Change the default credentials.",
                config.username,
                config.password
            );
            config
        }
    };

    let state = AppState::new(config, config_path)
        .await
        .context("Cannot prepare the root directory")?;
    tracing::info!("sharing {}", state.root.display());

    let port = state.config.port;
    let tunnel_settings = state.config.tunnel.clone();
    let hostname = state.config.hostname.clone();
    let app = build_router(state);

    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Cannot bind to {addr}"))?;
    tracing::info!(
        "dropshelf v{} listening on http://localhost:{port}",
        env!("CARGO_PKG_VERSION")
    );

    let (stop_tx, mut stop_rx) = tokio::sync::watch::channel(());
    let server = async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown_signal().await;
                let _ = stop_tx.send(());
            })
            .await
            .context("Server error")
    };

    match tunnel_settings {
        None => server.await?,
        Some(settings) => {
            let stopped = async move {
                let _ = stop_rx.changed().await;
            };
            let tunnel = async {
                tunnel::run(&settings, port, hostname, config_path, stopped)
                    .await
                    .context("Tunnel failed")
            };
            tokio::try_join!(server, tunnel)?;
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to register SIGTERM handler");
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result { tracing::error!("ctrl-c error: {}", e); }
            }
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM");
            }
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.ok();
    }
    tracing::info!("Shutting down gracefully");
}
