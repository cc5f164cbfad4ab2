//! qlik-mcp: Qlik Cloud app lifecycle over MCP.
//!
//! Two subcommands:
//! - `qlik-mcp serve`: Streamable HTTP MCP server
//! - `qlik-mcp stdio`: STDIO transport for desktop MCP clients

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use axum::http::Request;
use axum::response::IntoResponse;
use axum::Router;
use clap::{Parser, Subcommand};
use qlik_mcp::{QlikClient, QlikConfig, QlikMcpServer, TokioProcessRunner};
use rmcp::transport::streamable_http_server::{
    session::local::LocalSessionManager, StreamableHttpServerConfig, StreamableHttpService,
};
use rmcp::ServiceExt;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt as TowerServiceExt;
use tracing_subscriber::EnvFilter;

const CONFIG_FILE: &str = "qlik-mcp.toml";

/// Qlik Cloud app lifecycle operations as MCP tools.
#[derive(Parser)]
#[command(
    name = "qlik-mcp",
    version,
    about = "Qlik Cloud app lifecycle operations as MCP tools, driven through qlik-cli"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a Streamable HTTP MCP server
    Serve {
        /// Path to qlik-mcp.toml [default: ./qlik-mcp.toml or ~/.config/qlik-mcp/qlik-mcp.toml]
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// HTTP port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,
        /// Bind address
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },
    /// Serve over STDIO
    Stdio {
        /// Path to qlik-mcp.toml [default: ./qlik-mcp.toml or ~/.config/qlik-mcp/qlik-mcp.toml]
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = match &cli.command {
        Commands::Serve { config, .. } | Commands::Stdio { config } => config.clone(),
    };
    let config = load_config(resolve_config(config_path)).await?;

    // RUST_LOG wins over the configured level. stdout is reserved for STDIO.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let server = build_server(&config).await?;
    let cancel = CancellationToken::new();

    let cancel_for_signal = cancel.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Shutting down qlik-mcp...");
        cancel_for_signal.cancel();
    });

    match cli.command {
        Commands::Serve { port, host, .. } => run_serve(server, host, port, cancel).await?,
        Commands::Stdio { .. } => run_stdio(server, cancel).await?,
    }

    Ok(())
}

/// Build the MCP server, refusing to start when qlik-cli cannot be run.
async fn build_server(config: &QlikConfig) -> Result<QlikMcpServer> {
    let client = QlikClient::new(config, Arc::new(TokioProcessRunner::new()));

    let version = client.cli_version().await.map_err(|e| {
        anyhow::anyhow!(
            "qlik-cli is not available at '{}': {}. Install qlik-cli or set QLIK_CLI_PATH.",
            config.qlik.cli_path,
            e
        )
    })?;
    tracing::info!(
        cli = %config.qlik.cli_path,
        version = %version.stdout.trim(),
        tenant = ?config.qlik.tenant_url,
        "qlik-cli available"
    );

    Ok(QlikMcpServer::new(client, config.server.name.clone()))
}

/// Serve over Streamable HTTP via axum.
async fn run_serve(
    server: QlikMcpServer,
    host: String,
    port: u16,
    cancel: CancellationToken,
) -> Result<()> {
    let session_manager = Arc::new(LocalSessionManager::default());
    let http_config = StreamableHttpServerConfig {
        cancellation_token: cancel.clone(),
        ..Default::default()
    };
    let mcp_service = StreamableHttpService::new(
        move || Ok(server.clone()),
        session_manager,
        http_config,
    );

    let app = Router::new().fallback(move |req: Request<axum::body::Body>| {
        let svc = mcp_service.clone();
        async move {
            match svc.oneshot(req).await {
                Ok(response) => response.into_response(),
                Err(never) => match never {},
            }
        }
    });

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", addr, e))?;

    tracing::info!(host = %host, port = %port, "qlik-mcp HTTP server listening");
    tracing::info!("Connect your MCP client to http://{}:{}/mcp", host, port);

    axum::serve(listener, app)
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await
        .map_err(|e| anyhow::anyhow!("qlik-mcp HTTP server error: {}", e))?;

    tracing::info!("qlik-mcp HTTP server stopped");
    Ok(())
}

/// Serve over stdin/stdout.
async fn run_stdio(server: QlikMcpServer, cancel: CancellationToken) -> Result<()> {
    let transport = (tokio::io::stdin(), tokio::io::stdout());
    let running = server
        .serve_with_ct(transport, cancel.clone())
        .await
        .map_err(|e| anyhow::anyhow!("Failed to initialize stdio transport: {:?}", e))?;

    tracing::info!("qlik-mcp stdio transport initialized, waiting for messages");

    tokio::select! {
        result = running.waiting() => {
            match result {
                Ok(reason) => {
                    tracing::info!(?reason, "stdio transport completed");
                }
                Err(e) => {
                    tracing::error!(error = %e, "stdio transport error");
                    return Err(anyhow::anyhow!("stdio transport error: {}", e));
                }
            }
        }
        _ = cancel.cancelled() => {
            tracing::info!("stdio transport cancelled");
        }
    }

    Ok(())
}

/// Explicit flag, then ./qlik-mcp.toml, then ~/.config/qlik-mcp/qlik-mcp.toml.
/// `None` means run on defaults and environment alone.
fn resolve_config(explicit: Option<PathBuf>) -> Option<PathBuf> {
    if explicit.is_some() {
        return explicit;
    }

    let local = Path::new(CONFIG_FILE);
    if local.exists() {
        return Some(local.to_path_buf());
    }

    dirs::config_dir()
        .map(|dir| dir.join("qlik-mcp").join(CONFIG_FILE))
        .filter(|path| path.exists())
}

/// Read the config file if there is one, apply env overrides and validate.
async fn load_config(config_path: Option<PathBuf>) -> Result<QlikConfig> {
    let mut config = match &config_path {
        Some(path) => {
            let content = tokio::fs::read_to_string(path)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to read config file {:?}: {}", path, e))?;
            QlikConfig::from_toml(&content)
                .map_err(|e| anyhow::anyhow!("Failed to parse config file {:?}: {}", path, e))?
        }
        None => QlikConfig::default(),
    };

    config.apply_env_overrides()?;
    config.validate()?;
    Ok(config)
}
