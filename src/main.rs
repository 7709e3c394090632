// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! ingestd — multi-source video ingestion and fan-out engine
//!
//! Usage:
//!   ingestd serve  --config config.toml
//!   ingestd status --config config.toml

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use ingestd::adapter::detect_source_type;
use ingestd::api::{self, AppState};
use ingestd::config::Config;
use ingestd::distributor::{self, LatestFrameCache};
use ingestd::registry::{AddSourceRequest, SourceManager};

#[derive(Parser)]
#[command(name = "ingestd", about = "Multi-source video ingestion and fan-out engine", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the ingestion engine and HTTP/WebSocket boundary.
    Serve {
        #[arg(short, long, default_value = "config.toml")]
        config: PathBuf,
    },
    /// Print a brief status snapshot for configured sources and exit. Connects to a
    /// running instance's catalog only in spirit — this engine keeps no on-disk state,
    /// so this prints the static configuration rather than live counters.
    Status {
        #[arg(short, long, default_value = "config.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    gstreamer::init().expect("failed to initialize GStreamer");

    let cli = Cli::parse();
    match cli.command {
        Command::Serve { config } => run_serve(config).await,
        Command::Status { config } => run_status(config),
    }
}

async fn run_serve(config_path: PathBuf) {
    let cfg = match Config::from_file(&config_path) {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "failed to load config");
            std::process::exit(1);
        }
    };

    info!(
        sources = cfg.sources.len(),
        host = %cfg.server.host,
        port = cfg.server.port,
        queue_size = cfg.defaults.queue_size,
        "starting ingestion engine"
    );

    let (queue_tx, queue_rx) = tokio::sync::mpsc::channel(cfg.defaults.queue_size);
    let cache = Arc::new(LatestFrameCache::new());

    let manager = Arc::new(SourceManager::new(
        queue_tx,
        cache.clone(),
        cfg.defaults.max_sources,
        cfg.defaults.target_fps,
        cfg.defaults.reconnect_attempts,
        cfg.defaults.reconnect_delay_s,
        cfg.defaults.timeout_s,
    ));

    let distributor_handle = tokio::spawn(distributor::run(queue_rx, cache.clone()));

    for source in &cfg.sources {
        let source_id = match Uuid::parse_str(&source.source_id) {
            Ok(id) => id,
            Err(e) => {
                error!(source_id = %source.source_id, error = %e, "invalid source_id in config, skipping");
                continue;
            }
        };
        let req = AddSourceRequest {
            source_id,
            name: source.name.clone(),
            source_type: source.source_type.clone(),
            uri: source.uri.clone(),
            target_fps: source.target_fps,
            reconnect_attempts: source.reconnect_attempts,
            reconnect_delay_s: source.reconnect_delay_s,
            timeout_s: source.timeout_s,
            username: source.username.clone(),
            password: source.password.clone(),
            loop_playback: Some(source.loop_playback),
        };
        if let Err(e) = manager.add_source(req).await {
            error!(source_id = %source_id, error = %e, "failed to start configured source");
        }
    }

    let state = Arc::new(AppState { manager: manager.clone(), cache: cache.clone() });
    let host = cfg.server.host.clone();
    let port = cfg.server.port;
    let server_handle = tokio::spawn(async move {
        api::serve(state, &host, port).await;
    });

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("received CTRL+C, shutting down…"),
        Err(e) => error!(error = %e, "signal error"),
    }

    manager.stop_all().await;
    server_handle.abort();
    distributor_handle.abort();
}

fn run_status(config_path: PathBuf) {
    let cfg = match Config::from_file(&config_path) {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "failed to load config");
            std::process::exit(1);
        }
    };

    println!("=== Ingestion Engine Configuration ===");
    println!("Server      : {}:{}", cfg.server.host, cfg.server.port);
    println!("Queue size  : {}", cfg.defaults.queue_size);
    println!("Default FPS : {}", cfg.defaults.target_fps);
    println!("Max sources : {}", cfg.defaults.max_sources);
    println!("Sources     : {}", cfg.sources.len());
    for src in &cfg.sources {
        let detected = src.source_type.clone().unwrap_or_else(|| detect_source_type(&src.uri).to_string());
        println!("  {} ({}): {} — type={}", src.source_id, src.name, src.uri, detected);
    }
    if cfg.sources.is_empty() {
        warn!("no sources configured");
    }
}
