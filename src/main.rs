//! mesh-control main entry point
//!
//! This binary runs the control daemon and offers offline commands that
//! operate directly on a fleet file. It handles CLI parsing, logging setup
//! and HTTP config delivery.

use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use axum::{
    extract::{Path as UrlPath, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use mesh_control::{
    config::{Config, DEFAULT_CONFIG_PATH},
    control::{CommandHandler, ControlServer, MemoryFleetStore},
    fleet::{migration::backfill_virtual_ips, Fleet, NodeKind},
    monitoring::MetricsCollector,
    MeshError, APP_NAME, VERSION,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;

/// Address allocation and WireGuard topology for an Agent/Gateway mesh
#[derive(Parser, Debug)]
#[command(name = APP_NAME, version = VERSION, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Fleet file, overriding the configured one
    #[arg(short, long, global = true)]
    fleet: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the control socket and HTTP config endpoint
    Serve,

    /// Allocate a tunnel between an agent and a gateway
    Allocate {
        /// Agent id
        agent_id: String,
        /// Gateway id
        gateway_id: String,
    },

    /// Print the structured topology of a node as JSON
    Topology {
        /// `agent` or `gateway`
        kind: NodeKind,
        /// Node id
        id: String,
    },

    /// Print the WireGuard config of a node
    Render {
        /// `agent` or `gateway`
        kind: NodeKind,
        /// Node id
        id: String,
    },

    /// Derive agent virtual IPs from legacy per-agent subnets
    MigrateLegacy {
        /// Write the updates back to the fleet file
        #[arg(long)]
        write: bool,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Initialize structured logging with tracing
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Resolve configuration from file, environment and flags
fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = Config::load_or_default(&cli.config)?;
    config.apply_env_overrides()?;
    if let Some(fleet) = &cli.fleet {
        config.fleet_path = fleet.clone();
    }
    config.validate()?;
    Ok(config)
}

fn build_handler(config: &Config, metrics: MetricsCollector) -> anyhow::Result<CommandHandler> {
    let store = Arc::new(MemoryFleetStore::open(&config.fleet_path)?);
    Ok(
        CommandHandler::new(store, config.allocation, config.topology_options())
            .with_metrics(metrics),
    )
}

/// Run the CLI command
async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Commands::Version = cli.command {
        println!("{} v{}", APP_NAME, VERSION);
        return Ok(());
    }

    let config = load_config(&cli)?;

    match cli.command {
        Commands::Serve => serve(config).await,
        Commands::Allocate {
            agent_id,
            gateway_id,
        } => {
            let handler = build_handler(&config, MetricsCollector::new())?;
            let tunnel = handler.allocate_tunnel(&agent_id, &gateway_id).await?;
            println!("{}", serde_json::to_string_pretty(&tunnel)?);
            Ok(())
        }
        Commands::Topology { kind, id } => {
            let handler = build_handler(&config, MetricsCollector::new())?;
            let topology = handler.topology(kind, &id)?;
            println!("{}", serde_json::to_string_pretty(&topology)?);
            Ok(())
        }
        Commands::Render { kind, id } => {
            let handler = build_handler(&config, MetricsCollector::new())?;
            print!("{}", handler.render_config(kind, &id)?);
            Ok(())
        }
        Commands::MigrateLegacy { write } => migrate_legacy(&config, write),
        Commands::Version => Ok(()),
    }
}

/// Print, and optionally apply, the legacy virtual IP backfill
fn migrate_legacy(config: &Config, write: bool) -> anyhow::Result<()> {
    let mut fleet = Fleet::from_file(&config.fleet_path)?;
    let report = backfill_virtual_ips(&fleet);

    for update in &report.updates {
        println!(
            "{} ({}): {} -> {}",
            update.agent_name,
            update.agent_id,
            update.previous.as_deref().unwrap_or("unset"),
            update.virtual_ip
        );
    }
    for skipped in &report.skipped {
        warn!("Skipped agent {}: {}", skipped.agent_id, skipped.reason);
    }

    if write && !report.updates.is_empty() {
        let applied = report.apply(&mut fleet);
        fleet.save(&config.fleet_path)?;
        println!("Wrote {} update(s) to {:?}", applied, config.fleet_path);
    } else if !report.updates.is_empty() {
        println!("Dry run; pass --write to apply");
    }

    Ok(())
}

/// Run the control socket and HTTP server until a shutdown signal
async fn serve(config: Config) -> anyhow::Result<()> {
    info!("Starting {} v{}", APP_NAME, VERSION);

    let metrics = MetricsCollector::new();
    let handler = Arc::new(build_handler(&config, metrics.clone())?);

    let control = Arc::new(ControlServer::new(
        config.control.socket_path.clone(),
        handler.clone(),
    ));
    let listener = control.bind()?;
    let control_task = {
        let control = control.clone();
        tokio::spawn(async move {
            if let Err(e) = control.serve(listener).await {
                error!("Control server stopped: {}", e);
            }
        })
    };

    let app = create_http_server(AppState { handler, metrics });

    let addr = &config.http.bind_address;
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("HTTP server listening on {}", addr);

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down");
    control_task.abort();
    control.shutdown().await?;
    Ok(())
}

#[derive(Clone)]
struct AppState {
    handler: Arc<CommandHandler>,
    metrics: MetricsCollector,
}

/// Create HTTP server with routes
fn create_http_server(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .route("/nodes/:kind/:id/config", get(node_config))
        .route("/nodes/:kind/:id/topology", get(node_topology))
        .with_state(state)
}

/// Health check endpoint
async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Metrics endpoint (Prometheus format)
async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let mut output = String::new();

    output.push_str("# HELP mesh_control_info Build information\n");
    output.push_str("# TYPE mesh_control_info gauge\n");
    output.push_str(&format!("mesh_control_info{{version=\"{}\"}} 1\n", VERSION));
    output.push_str(&state.metrics.export_prometheus());

    (StatusCode::OK, output)
}

/// Rendered WireGuard config of one node
async fn node_config(
    State(state): State<AppState>,
    UrlPath((kind, id)): UrlPath<(String, String)>,
) -> Response {
    let result = kind
        .parse::<NodeKind>()
        .and_then(|kind| state.handler.render_config(kind, &id));

    match result {
        Ok(config) => (StatusCode::OK, config).into_response(),
        Err(e) => error_response(e),
    }
}

/// Structured topology of one node
async fn node_topology(
    State(state): State<AppState>,
    UrlPath((kind, id)): UrlPath<(String, String)>,
) -> Response {
    let result = kind
        .parse::<NodeKind>()
        .and_then(|kind| state.handler.topology(kind, &id));

    match result {
        Ok(topology) => (StatusCode::OK, Json(topology)).into_response(),
        Err(e) => error_response(e),
    }
}

fn error_response(err: MeshError) -> Response {
    let status = match err {
        MeshError::NotFound(_) => StatusCode::NOT_FOUND,
        MeshError::Validation(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!("Request failed: {}", err);
    }
    (status, err.to_string()).into_response()
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}
