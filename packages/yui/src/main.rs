use anyhow::{Context, Result};
use axum::{
    Router,
    routing::{get, patch},
};
use clap::{Parser, Subcommand};
use companion_core::{ConversationRouter, Envelope, SessionRegistry};
use std::path::PathBuf;
use std::{net::SocketAddr, sync::Arc};
use tower_http::cors::CorsLayer;
use tower_http::trace::MakeSpan;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::prelude::*;
use uuid::Uuid;

mod cli;
mod config;
mod db;
mod emotion;
mod handlers;
mod llm;
mod memory;
mod metrics;
mod models;
mod repository;
mod tools;
mod ws;

#[cfg(test)]
mod test_helpers;

use crate::config::{ChatFileConfig, FileConfig, Profile, YuiConfig};
use crate::db::Database;
use crate::llm::{HttpProvider, ProviderSettings};
use crate::memory::SqliteMemory;
use crate::metrics::ServerMetrics;
use crate::repository::MemoryRepository;
use crate::tools::HelperTools;

/// Custom span maker that adds a unique request ID to each incoming request
#[derive(Clone)]
struct RequestIdMakeSpan;

impl<B> MakeSpan<B> for RequestIdMakeSpan {
    fn make_span(&mut self, request: &axum::http::Request<B>) -> tracing::Span {
        let request_id = Uuid::new_v4().to_string();
        tracing::info_span!(
            "request",
            method = %request.method(),
            uri = %request.uri(),
            request_id = %request_id,
        )
    }
}

#[derive(Parser)]
#[command(name = "yui")]
#[command(about = "Yui AI companion: chat server and terminal client")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Custom data directory (defaults to ~/.yui)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the chat server in the foreground
    Server(ServerArgs),

    /// Chat with a running server from the terminal
    Chat(ChatArgs),
}

#[derive(Parser, Default)]
struct ServerArgs {
    /// Port for the web server (defaults to config, then 8000)
    #[arg(short, long)]
    port: Option<u16>,

    /// Host to bind to (defaults to config, then 127.0.0.1)
    #[arg(short = 'b', long)]
    host: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Configuration preset
    #[arg(long, value_enum)]
    profile: Option<Profile>,
}

#[derive(Parser)]
struct ChatArgs {
    /// Server base URL (defaults to config, then http://127.0.0.1:8000)
    #[arg(long)]
    url: Option<String>,

    /// Your name; prompted for when neither given nor configured
    #[arg(long)]
    name: Option<String>,
}

#[derive(Clone)]
pub(crate) struct AppState {
    pub chat: Arc<ChatFileConfig>,
    pub db: Arc<Database>,
    pub repository: Arc<MemoryRepository>,
    /// Live chat sessions keyed by user name
    pub registry: Arc<SessionRegistry>,
    pub router: Arc<ConversationRouter>,
    /// Server metrics for observability
    pub metrics: Arc<ServerMetrics>,
}

pub(crate) fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root_handler))
        .route("/api/health", get(handlers::api_health_handler))
        .route("/api/stats", get(handlers::get_database_stats))
        .route("/api/users/{user_name}/history", get(handlers::get_history))
        .route("/api/users/{user_name}/search", get(handlers::search_history))
        .route("/api/users/{user_name}/stats", get(handlers::get_user_stats))
        .route("/api/users/{user_name}/profile", get(handlers::get_profile))
        .route(
            "/api/users/{user_name}/preferences",
            patch(handlers::patch_preferences),
        )
        .route("/api/sessions/{session_id}", get(handlers::get_session))
        .route("/health/live", get(handlers::health_live_handler))
        .route("/health/ready", get(handlers::health_ready_handler))
        .route("/metrics", get(handlers::metrics_handler))
        .route("/ws/{user_name}", get(handlers::websocket_handler))
        .layer(TraceLayer::new_for_http().make_span_with(RequestIdMakeSpan))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = YuiConfig::new(cli.data_dir.clone())?;

    match cli.command {
        None => run_server(ServerArgs::default(), config).await,
        Some(Commands::Server(args)) => run_server(args, config).await,
        Some(Commands::Chat(args)) => run_chat(args, config).await,
    }
}

fn init_logging(default_directive: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}

async fn run_chat(args: ChatArgs, config: YuiConfig) -> Result<()> {
    init_logging("warn");

    let file_config: FileConfig = config::load_config(&config.data_dir, None)
        .extract()
        .context("Failed to load configuration")?;

    cli::chat_command(&file_config.client, args.url, args.name).await
}

async fn run_server(args: ServerArgs, config: YuiConfig) -> Result<()> {
    // Setup logging
    init_logging(if args.debug {
        "yui=debug,companion_core=debug,tower_http=debug,info"
    } else {
        "yui=info,companion_core=info,tower_http=info,warn"
    });

    info!("Starting Yui AI Companion");

    let file_config: FileConfig = config::load_config(&config.data_dir, args.profile.as_ref())
        .extract()
        .context("Failed to load configuration")?;

    // Pick the LLM first so a missing key fails before anything else is opened
    let settings = ProviderSettings::resolve(&file_config.llm, file_config.chat.max_history_turns)?;
    info!(
        provider = %settings.kind,
        model = %settings.model,
        "Using LLM provider"
    );
    let llm = Arc::new(HttpProvider::new(settings)?);

    info!("Initializing database...");
    let db = Arc::new(Database::new(&config).await?);
    let repository = Arc::new(MemoryRepository::new(db.pool.clone()));
    let memory = Arc::new(SqliteMemory::new(
        repository.as_ref().clone(),
        file_config.chat.max_history_turns,
    ));

    let mut router = ConversationRouter::new(llm, memory, file_config.router_config());
    if file_config.tools.enabled {
        let tools = HelperTools::new(std::time::Duration::from_secs(
            file_config.tools.timeout_secs,
        ))?;
        router = router.with_tools(Arc::new(tools));
        info!("Helper tools enabled");
    }

    let app_state = AppState {
        chat: Arc::new(file_config.chat.clone()),
        db,
        repository,
        registry: Arc::new(SessionRegistry::new()),
        router: Arc::new(router),
        metrics: Arc::new(ServerMetrics::new()),
    };
    let registry_for_shutdown = app_state.registry.clone();

    let app = build_app(app_state);

    let host = args
        .host
        .or(file_config.server.host)
        .unwrap_or_else(|| config::DEFAULT_HOST.to_string());
    let port = args
        .port
        .or(file_config.server.port)
        .unwrap_or(config::DEFAULT_PORT);
    let addr = format!("{}:{}", host, port)
        .parse::<SocketAddr>()
        .with_context(|| format!("Invalid listen address {}:{}", host, port))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    let actual_addr = listener.local_addr()?;

    info!("Yui listening on http://{}", actual_addr);
    info!("WebSocket: ws://{}/ws/{{user_name}}", actual_addr);
    info!("Config file: {}", config.config_toml_path().display());

    // Open sockets hold graceful shutdown until their sessions close.
    let shutdown_signal = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received shutdown signal, cleaning up...");
        let notified = registry_for_shutdown
            .broadcast(Envelope::system("Server is shutting down. Goodbye! 👋"))
            .await;
        for user_id in registry_for_shutdown.user_ids().await {
            if let Some(session) = registry_for_shutdown.unregister(&user_id).await {
                session.close();
            }
        }
        info!("Closed {} chat sessions", notified);
    };

    let server_result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .context("Server error");

    info!("Shutdown complete");
    server_result
}
