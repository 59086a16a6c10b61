// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Switchboard WebSocket server - route messages between browser clients.
//!
//! Every WebSocket client gets a numeric ID and can send to one peer,
//! broadcast to all, or ask for the IDs currently connected.
//!
//! # Usage
//!
//! ```bash
//! # Start on default port 5000
//! switchboard-ws
//!
//! # Custom port, raw relay instead of envelopes
//! switchboard-ws --port 8080 --router relay
//!
//! # Serve extra pages next to the WebSocket endpoint
//! switchboard-ws --route /chat=static/chat.html
//!
//! # Using configuration file
//! switchboard-ws --config switchboard.toml
//! ```
//!
//! # Protocol
//!
//! With the default envelope router, messages are JSON:
//!
//! ```json
//! // Send to client 2
//! {"MsgType": 1, "DestinationID": 2, "Payload": "hello"}
//!
//! // Broadcast to everyone, sender included
//! {"MsgType": 2, "Payload": {"text": "hi all"}}
//!
//! // Ask for the other connected IDs
//! {"MsgType": 3}
//! // -> {"MsgType": 3, "DestinationID": 1, "SenderID": 1, "Ids": [2, 3], "Payload": null}
//! ```

mod config;
mod socket;

use axum::{
    extract::{State, WebSocketUpgrade},
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::get,
    Router,
};
use clap::{Parser, Subcommand};
use config::{ConfigError, RouterKind, ServerConfig, StaticRoute, HEALTH_PATH};
use socket::{ClientSlot, WsTransport};
use std::path::PathBuf;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use switchboard::{EnvelopeRouter, Hub, RelayRouter};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeFile;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Switchboard WebSocket server
#[derive(Parser, Debug)]
#[command(name = "switchboard-ws")]
#[command(about = "Switchboard WebSocket server - route messages between browser clients")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen port
    #[arg(short, long, conflicts_with = "config")]
    port: Option<u16>,

    /// Bind address
    #[arg(short, long, conflicts_with = "config")]
    bind: Option<String>,

    /// WebSocket endpoint path
    #[arg(long, conflicts_with = "config")]
    ws_path: Option<String>,

    /// Routing strategy
    #[arg(short, long, value_enum, conflicts_with = "config")]
    router: Option<RouterKind>,

    /// Maximum concurrent WebSocket connections (0 = unlimited)
    #[arg(long, conflicts_with = "config")]
    max_clients: Option<usize>,

    /// Static file routes (format: "/path=file", can repeat)
    #[arg(long, value_delimiter = ',', conflicts_with = "config")]
    route: Option<Vec<String>>,

    /// Answer malformed envelopes with an Error envelope
    #[arg(long, conflicts_with = "config")]
    bounce_malformed: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate example configuration file
    GenConfig {
        /// Output file path
        #[arg(short, long, default_value = "switchboard.toml")]
        output: PathBuf,
    },

    /// Validate a configuration file
    Validate {
        /// Configuration file path
        #[arg(short, long)]
        config: PathBuf,
    },
}

/// Shared application state
struct AppState {
    hub: Hub,
    config: ServerConfig,
    clients: Arc<AtomicUsize>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    if let Some(cmd) = args.command {
        init_logging(args.log_level.as_deref().unwrap_or("info"));
        return match cmd {
            Commands::GenConfig { output } => cmd_gen_config(output),
            Commands::Validate { config } => cmd_validate(config),
        };
    }

    let config = build_config(&args)?;
    init_logging(args.log_level.as_deref().unwrap_or(&config.log_level));

    info!("Switchboard WebSocket server v{}", env!("CARGO_PKG_VERSION"));
    info!("Router: {}", config.router);

    let addr = config.listen_addr();
    let hub = match config.router {
        RouterKind::Envelope => Hub::with_config(
            EnvelopeRouter::new().bounce_malformed(config.hub.bounce_malformed),
            config.hub.clone(),
        ),
        RouterKind::Relay => Hub::with_config(RelayRouter::new(), config.hub.clone()),
    };

    let state = Arc::new(AppState {
        hub,
        config,
        clients: Arc::new(AtomicUsize::new(0)),
    });
    let app = build_app(Arc::clone(&state));

    info!("WebSocket endpoint: ws://{}{}", addr, state.config.ws_path);
    if !state.config.serves_root() {
        info!("Demo page: http://{}/", addr);
    }

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn build_config(args: &Args) -> Result<ServerConfig, ConfigError> {
    if let Some(ref config_path) = args.config {
        return ServerConfig::from_file(config_path);
    }

    let mut config = ServerConfig::default();
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(ref bind) = args.bind {
        config.bind = bind.clone();
    }
    if let Some(ref ws_path) = args.ws_path {
        config.ws_path = ws_path.clone();
    }
    if let Some(router) = args.router {
        config.router = router;
    }
    if let Some(max_clients) = args.max_clients {
        config.max_clients = max_clients;
    }
    if let Some(ref level) = args.log_level {
        config.log_level = level.clone();
    }
    config.hub.bounce_malformed = args.bounce_malformed;

    for entry in args.route.iter().flatten() {
        match entry.split_once('=') {
            Some((path, file)) => config.add_route(StaticRoute::new(path, file)),
            None => {
                return Err(ConfigError::Invalid(format!(
                    "Invalid route format: {} (expected /path=file)",
                    entry
                )))
            }
        }
    }

    config.validate()?;
    Ok(config)
}

fn build_app(state: Arc<AppState>) -> Router {
    let mut app = Router::new()
        .route(&state.config.ws_path, get(ws_handler))
        .route(HEALTH_PATH, get(health_handler));

    for route in &state.config.routes {
        info!("Serving {} at {}", route.file.display(), route.path);
        app = app.route_service(&route.path, ServeFile::new(&route.file));
    }
    if !state.config.serves_root() {
        app = app.route("/", get(serve_demo_page));
    }

    app.layer(
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    )
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

/// WebSocket upgrade handler
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let Some(slot) = ClientSlot::acquire(&state.clients, state.config.max_clients) else {
        warn!("Connection rejected: max clients reached");
        return (StatusCode::SERVICE_UNAVAILABLE, "Too many connections").into_response();
    };

    ws.on_upgrade(move |socket| async move {
        let capacity = state.hub.config().outbound_capacity;
        let transport = WsTransport::new(socket, capacity).with_slot(slot);
        match state.hub.accept(transport) {
            Ok(id) => info!(connection = %id, "WebSocket client connected"),
            Err(e) => warn!(error = %e, "WebSocket handshake failed"),
        }
    })
    .into_response()
}

/// Health check endpoint
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let stats = state.hub.stats().snapshot();
    let clients = match state.hub.connection_count().await {
        Ok(n) => n as u64,
        Err(_) => stats.active_connections(),
    };

    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "router": state.config.router,
        "clients": clients,
        "max_clients": state.config.max_clients,
        "hub": state.hub.config(),
        "stats": stats,
    }))
}

/// Serve embedded demo page
async fn serve_demo_page(State(state): State<Arc<AppState>>) -> Html<String> {
    Html(include_str!("client.html").replace("__WS_PATH__", &state.config.ws_path))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    info!("Shutting down...");
}

fn cmd_gen_config(output: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = ServerConfig::default();
    config.add_route(StaticRoute::new("/chat", "static/chat.html"));

    let toml_str = toml::to_string_pretty(&config)?;

    let content = format!(
        r#"# Switchboard WebSocket server configuration
# Generated by switchboard-ws gen-config
#
# router: "envelope" (Send/Broadcast/FetchIDs) or "relay" (raw broadcast)
# max_clients: 0 = unlimited

{}
"#,
        toml_str
    );

    std::fs::write(&output, content)?;
    println!("Generated configuration file: {}", output.display());
    Ok(())
}

fn cmd_validate(config_path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    match ServerConfig::from_file(&config_path) {
        Ok(config) => {
            println!("Configuration valid!");
            println!();
            println!("Listen:      {}", config.listen_addr());
            println!("WebSocket:   {}", config.ws_path);
            println!("Router:      {}", config.router);
            println!("Max clients: {}", config.max_clients);
            println!("Routes:      {}", config.routes.len());
            for (i, route) in config.routes.iter().enumerate() {
                println!("  [{}] {} -> {}", i, route.path, route.file.display());
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("Configuration invalid: {}", e);
            std::process::exit(1);
        }
    }
}
