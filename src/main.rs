//! # Mumble Soundboard - Main Application Entry Point
//!
//! Connects to a Mumble server, joins a channel, and serves the HTTP
//! control surface a browser UI uses to trigger sound playback.
//!
//! ## Application Architecture:
//! - **config**: layered configuration (defaults, config.toml, env, CLI)
//! - **library**: one-shot sound file discovery at startup
//! - **voice**: the Mumble session (TLS control channel + audio tunnel)
//! - **audio**: file decoding and the Opus encoder
//! - **playback**: the single-slot playback session, an owning task
//! - **handlers**: HTTP request handlers translating controller results
//! - **error**: error types and their HTTP mappings
//!
//! ## Startup Order:
//! Configuration and the sound library come first, then the voice
//! connection (channel resolution failures are fatal), and only then the
//! HTTP server — so every request handler can assume a live session.

mod audio;
mod config;
mod error;
mod handlers;
mod library;
mod playback;
mod state;
mod voice;

use actix_files::Files;
use actix_web::{web, App, HttpServer};
use anyhow::Result;
use clap::Parser;
use config::{AppConfig, Cli};
use state::AppState;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::audio::FileSource;
use crate::library::SoundLibrary;
use crate::playback::PlaybackController;

#[actix_web::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing()?;

    let cli = Cli::parse();
    let config = AppConfig::load(cli)?;
    config.validate()?;

    info!("Starting mumble-soundboard v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Maximum volume: {}%",
        config.playback.max_volume_percent
    );

    // Discovery happens once; the table is immutable afterwards.
    let library = Arc::new(SoundLibrary::scan(&config.sound_dirs()));
    if library.is_empty() {
        warn!("no sound files discovered, the soundboard will be empty");
    }
    info!(files = library.len(), "sound library loaded");

    // Fatal on reject or an unresolvable channel path: exit 1.
    let connection = voice::connect(&config.mumble, &config.playback.channel).await?;
    let mut disconnected = connection.disconnected.clone();

    let playback = PlaybackController::spawn(
        Arc::clone(&library),
        Arc::new(connection.handle.clone()),
        Arc::new(FileSource),
        config.playback.max_volume_percent,
        config.playback.bitrate,
    );

    let app_state = AppState::new(config.clone(), library, playback);
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let asset_dir = config.server.asset_dir.clone();

    info!("Starting HTTP server on {}", bind_addr);

    let server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .wrap(TracingLogger::default())
            .route("/files.json", web::get().to(handlers::list_files))
            .route("/play/{file}", web::get().to(handlers::play))
            .route("/volume/{volume}", web::get().to(handlers::set_volume))
            .route("/stop", web::get().to(handlers::stop))
            .route("/status.json", web::get().to(handlers::status))
            // Everything else is the browser UI.
            .service(Files::new("/", asset_dir.clone()).index_file("index.html"))
    })
    .bind(&bind_addr)?
    .run();

    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    tokio::select! {
        result = server_task => {
            match result {
                Ok(server_result) => {
                    if let Err(e) = server_result {
                        error!("Server error: {}", e);
                    }
                }
                Err(e) => {
                    error!("Server task error: {}", e);
                }
            }
        }
        _ = disconnected.changed() => {
            // No reconnection logic; a lost session is fatal.
            error!("lost connection to the mumble server");
            std::process::exit(1);
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received, stopping server...");
            server_handle.stop(true).await;
        }
    }

    info!("Server stopped gracefully");
    Ok(())
}

fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mumble_soundboard=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    Ok(())
}

/// Resolves when SIGTERM or SIGINT arrives.
async fn shutdown_signal() {
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        .expect("Failed to install SIGTERM handler");
    let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())
        .expect("Failed to install SIGINT handler");

    tokio::select! {
        _ = sigterm.recv() => {
            info!("Received SIGTERM");
        }
        _ = sigint.recv() => {
            info!("Received SIGINT");
        }
    }
}
