//! Collaborative editing sync server.
//!
//! Run with: cargo run -p collab-server -- --port 9090

use std::{net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use collab_assist::{ChatCompletionsGenerator, DiagramConfig, DiagramService};
use collab_session::{RegistryConfig, SessionRegistry};
use collab_transport::{AppState, create_router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Collaborative editing sync server.
#[derive(Parser, Debug)]
#[command(name = "collab-server", about = "Collaborative editing sync server")]
struct Cli {
    /// Host to bind.
    #[arg(long, env = "COLLAB_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port to bind.
    #[arg(long, env = "COLLAB_PORT", default_value_t = 9090)]
    port: u16,

    /// Updates buffered per subscriber before it is disconnected as lagging.
    #[arg(long, env = "COLLAB_QUEUE_CAPACITY", default_value_t = collab_session::config::DEFAULT_QUEUE_CAPACITY)]
    queue_capacity: usize,

    /// API key for the diagram assistant backend.
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,

    /// Base URL of the chat-completions API.
    #[arg(long, env = "OPENAI_BASE_URL")]
    openai_base_url: Option<String>,

    /// Model used by the diagram assistant.
    #[arg(long, env = "OPENAI_MODEL")]
    openai_model: Option<String>,
}

impl Cli {
    fn registry_config(&self) -> RegistryConfig {
        RegistryConfig::default().with_queue_capacity(self.queue_capacity)
    }

    fn diagram_config(&self) -> DiagramConfig {
        let defaults = DiagramConfig::default();
        DiagramConfig {
            api_key: self.openai_api_key.clone(),
            base_url: self.openai_base_url.clone().unwrap_or(defaults.base_url),
            model: self.openai_model.clone().unwrap_or(defaults.model),
            ..defaults
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    let registry = Arc::new(SessionRegistry::new(cli.registry_config()));
    let diagrams = match ChatCompletionsGenerator::from_config(&cli.diagram_config())
        .context("Failed to build diagram assistant client")?
    {
        Some(generator) => DiagramService::new(Arc::new(generator)),
        None => {
            tracing::warn!("No OPENAI_API_KEY set, diagram assistant will return fallback diagrams");
            DiagramService::fallback_only()
        }
    };

    let app = create_router(AppState::new(Arc::clone(&registry), Arc::new(diagrams)))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("{}:{}", cli.host, cli.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", cli.host, cli.port))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("Server listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(registry))
        .await
        .context("Server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Resolve on SIGINT/SIGTERM after closing every open subscription.
async fn shutdown_signal(registry: Arc<SessionRegistry>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }

    tracing::info!("Shutting down, closing subscription streams");
    registry.shutdown();
}
