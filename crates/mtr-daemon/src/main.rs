//! mtr-daemon entry point.
//!
//! Thin: parses the command line, layers configuration, sets up tracing,
//! seeds the in-process store, then runs the reconciliation engine next to
//! the HTTP surface until SIGINT/SIGTERM. Handlers live in `routes.rs`,
//! shared state in `state.rs`.

use std::{future::IntoFuture, net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use axum::http::{HeaderValue, Method};
use clap::{Args, Parser, Subcommand};
use mtr_config::{env_overlay_from_process, load_layered_yaml, resolve_presto_password, LogConfig};
use mtr_daemon::{manifests, routes, state};
use mtr_operator::Reporting;
use mtr_store::MemoryStore;
use mtr_view::PrestoViewCreator;
use serde_json::{json, Value};
use tokio::sync::watch;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{error, info, Level};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "mtr-daemon")]
#[command(about = "Reporting operator: materializes GenerationQuery views", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the reconciliation engine and the HTTP surface
    Start(StartArgs),

    /// Compute the layered config hash and print the canonical JSON
    ConfigHash {
        /// Paths in merge order
        #[arg(required = true)]
        paths: Vec<String>,
    },
}

#[derive(Args, Debug, Default)]
struct StartArgs {
    /// YAML config layers in merge order (repeatable)
    #[arg(long = "config")]
    config_paths: Vec<String>,

    /// Directory of YAML manifests to seed the store with
    #[arg(long)]
    manifests: Option<PathBuf>,

    #[arg(long)]
    log_level: Option<String>,

    /// Presto coordinator, host:port
    #[arg(long)]
    presto_host: Option<String>,

    #[arg(long)]
    listen_addr: Option<String>,

    /// Only reconcile objects in this namespace
    #[arg(long)]
    namespace: Option<String>,
}

impl StartArgs {
    /// Command-line overrides, applied after YAML and environment layers.
    fn overlay(&self) -> Value {
        let mut v = json!({});
        if let Some(level) = &self.log_level {
            v["log"]["level"] = json!(level);
        }
        if let Some(host) = &self.presto_host {
            v["presto"]["host"] = json!(host);
        }
        if let Some(addr) = &self.listen_addr {
            v["api"]["listen_addr"] = json!(addr);
        }
        if let Some(ns) = &self.namespace {
            v["namespace"] = json!(ns);
        }
        v
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Silent if the file does not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    match Cli::parse().cmd {
        Commands::Start(args) => start(args).await,
        Commands::ConfigHash { paths } => {
            let refs: Vec<&str> = paths.iter().map(String::as_str).collect();
            let loaded = load_layered_yaml(&refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
            Ok(())
        }
    }
}

async fn start(args: StartArgs) -> Result<()> {
    let refs: Vec<&str> = args.config_paths.iter().map(String::as_str).collect();
    let loaded = load_layered_yaml(&refs)?
        .with_overlay(env_overlay_from_process()?)?
        .with_overlay(args.overlay())?;
    let cfg = loaded.operator_config()?;

    init_tracing(&cfg.log);
    info!(config_hash = %loaded.config_hash, "configuration loaded");

    let addr: SocketAddr = cfg
        .api
        .listen_addr
        .parse()
        .with_context(|| format!("invalid api.listen_addr: {}", cfg.api.listen_addr))?;

    let store = Arc::new(MemoryStore::new());
    if let Some(dir) = &args.manifests {
        let objects = manifests::load_dir(dir)?;
        let n = manifests::seed(&store, objects).await?;
        info!(dir = %dir.display(), objects = n, "store seeded from manifests");
    }

    let password = resolve_presto_password(&cfg.presto)?;
    let views = Arc::new(PrestoViewCreator::new(&cfg.presto, password));
    info!(presto = %cfg.presto.base_url(), "presto view creator ready");

    let op = Arc::new(Reporting::new(cfg, store.clone(), views));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let engine = tokio::spawn(op.clone().run(shutdown_rx.clone()));

    let shared = Arc::new(state::AppState::new(op, store, loaded.config_hash));
    let heartbeat = state::spawn_heartbeat(shared.clone(), HEARTBEAT_INTERVAL, shutdown_rx.clone());

    // Owns the sender: dropping it (abort) also stops the server.
    let signals = tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    let app = routes::build_router(shared)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("mtr-daemon listening on http://{}", addr);
    let server = tokio::spawn(
        axum::serve(listener, app)
            .with_graceful_shutdown(wait_for_shutdown(shutdown_rx))
            .into_future(),
    );

    // The engine returns on shutdown, or early if an informer cannot sync.
    let engine_result = engine.await.context("engine task panicked")?;
    if let Err(e) = &engine_result {
        error!(error = %e, "reconciliation engine stopped");
    }
    signals.abort();

    server
        .await
        .context("server task panicked")?
        .context("server crashed")?;
    let _ = heartbeat.await;

    engine_result.context("reconciliation engine failed")
}

fn init_tracing(log: &LogConfig) {
    // RUST_LOG wins over the configured level.
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if log.disable_timestamp {
        builder.without_time().init();
    } else {
        builder.init();
    }
}

async fn wait_for_shutdown(mut rx: watch::Receiver<bool>) {
    // A dropped sender counts as shutdown.
    let _ = rx.wait_for(|stop| *stop).await;
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// CORS: allow only localhost origins.
fn cors_localhost_only() -> CorsLayer {
    let allowed_origins = [
        "http://localhost",
        "http://127.0.0.1",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
    ];

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::PUT, Method::DELETE])
        .allow_headers(tower_http::cors::Any)
}
