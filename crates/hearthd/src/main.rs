//! hearthd — the Hearth daemon.
//!
//! `serve` assembles the state store, the HTTP collaborators and the
//! orchestrator service behind the REST API. `watch` is the client side:
//! it polls a running API until in-flight work settles.
//!
//! # Usage
//!
//! ```text
//! hearthd serve --config /etc/hearth/hearth.toml --port 8080 --data-dir /var/lib/hearth
//! hearthd watch --api-url http://127.0.0.1:8080 --user ada --role admin
//! hearthd config --config hearth.toml
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use hearth_core::{Caller, HearthConfig, Role};
use hearth_orchestrator::{HearthService, PollerSettings, RefreshPoller};
use hearth_remote::{ApiClient, GithubReleaseFeed, HttpProvisioningApi, HttpTaskExecutor};
use hearth_state::{ServerRecord, StateStore};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "hearthd", about = "Hearth game server coordinator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the API server.
    Serve {
        /// Path to hearth.toml. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Port to listen on.
        #[arg(long, default_value = "8080")]
        port: u16,

        /// Data directory for persistent state.
        #[arg(long, default_value = "/var/lib/hearth")]
        data_dir: PathBuf,
    },

    /// Poll a running API until no server has work in flight.
    Watch {
        #[arg(long, default_value = "http://127.0.0.1:8080")]
        api_url: String,

        #[arg(long)]
        user: String,

        #[arg(long, default_value = "new")]
        role: Role,

        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Print the effective configuration.
    Config {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,hearthd=debug,hearth=debug".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            config,
            port,
            data_dir,
        } => serve(&load_config(config.as_deref())?, port, data_dir).await,
        Command::Watch {
            api_url,
            user,
            role,
            config,
        } => watch(&load_config(config.as_deref())?, api_url, Caller::new(user, role)).await,
        Command::Config { config } => {
            print!("{}", load_config(config.as_deref())?.to_toml_string()?);
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<HearthConfig> {
    match path {
        Some(path) => {
            let config = HearthConfig::from_file(path)?;
            info!(path = ?path, "configuration loaded");
            Ok(config)
        }
        None => Ok(HearthConfig::default()),
    }
}

async fn serve(config: &HearthConfig, port: u16, data_dir: PathBuf) -> anyhow::Result<()> {
    info!("Hearth daemon starting");

    std::fs::create_dir_all(&data_dir)?;
    let db_path = data_dir.join("hearth.redb");
    let store = StateStore::open(&db_path)?;
    info!(path = ?db_path, "state store opened");

    let provisioning = Arc::new(HttpProvisioningApi::new(&config.provisioning.url));
    let executor = Arc::new(HttpTaskExecutor::new(&config.executor.url));
    let feed = Arc::new(GithubReleaseFeed::new(config.release_feed.clone()));
    info!(
        provisioning = %config.provisioning.url,
        executor = %config.executor.url,
        "collaborators configured"
    );

    let service = HearthService::new(store, config, provisioning, executor, feed);
    let router = hearth_api::build_router(service);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!(%addr, "API server starting");
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            info!("shutdown signal received");
        })
        .await?;

    info!("Hearth daemon stopped");
    Ok(())
}

async fn watch(config: &HearthConfig, api_url: String, caller: Caller) -> anyhow::Result<()> {
    let settings = PollerSettings::from_config(config);
    let mut poller = RefreshPoller::new(ApiClient::new(api_url, caller), settings);

    let initial = poller.load().await?;
    print_servers(initial);

    tokio::select! {
        servers = poller.refresh_after_mutation() => {
            println!();
            print_servers(servers);
        }
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted");
            return Ok(());
        }
    }
    info!(attempts = poller.attempts(), in_flight = poller.in_flight(), "watch finished");
    Ok(())
}

fn print_servers(servers: &[ServerRecord]) {
    println!("{:<24} {:<16} {:<14} {:<10} WORKFLOW", "NAME", "INSTANCE", "COMPUTE", "STATE");
    for server in servers {
        let compute = server.compute.as_ref();
        let instance = compute.and_then(|c| c.instance_id.as_deref()).unwrap_or("-");
        let compute_status = compute.map(|c| format!("{:?}", c.status)).unwrap_or_default();
        let state = server
            .status
            .as_ref()
            .and_then(|s| s.status.as_deref())
            .unwrap_or("-");
        let workflow = server
            .workflow
            .as_ref()
            .map(|w| format!("{} ({:?})", w.current_task, w.status))
            .unwrap_or_else(|| "-".to_string());
        println!("{:<24} {:<16} {:<14} {:<10} {}", server.name, instance, compute_status, state, workflow);
    }
}
