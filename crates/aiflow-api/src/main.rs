//! Aiflow REST API entry point.
//!
//! Binary name: `aiflow`
//!
//! Parses CLI arguments, loads configuration, initializes the database and
//! engine, then starts the REST API server.

mod http;
mod state;

use clap::{Parser, Subcommand};

use aiflow_infra::config::{load_ai_config, resolve_data_dir};
use state::AppState;

#[derive(Parser)]
#[command(name = "aiflow", version, about = "AI-powered workflow execution engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the REST API server.
    Serve {
        /// Port to listen on.
        #[arg(short, long, default_value = "8080")]
        port: u16,

        /// Host to bind to.
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Export spans via OpenTelemetry (stdout exporter).
        #[arg(long)]
        otel: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let data_dir = resolve_data_dir();
    let config = load_ai_config(&data_dir).await;

    match cli.command {
        Commands::Serve { port, host, otel } => {
            if config.enable_logging {
                aiflow_observe::tracing_setup::init_tracing(otel)
                    .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;
            }

            let state = AppState::init(data_dir, config).await?;

            let addr = format!("{host}:{port}");
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            tracing::info!("Aiflow API listening on http://{addr}");

            let router = http::router::build_router(state);

            axum::serve(listener, router)
                .with_graceful_shutdown(shutdown_signal())
                .await?;

            aiflow_observe::tracing_setup::shutdown_tracing();
        }
    }

    Ok(())
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_structure_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn serve_defaults() {
        let cli = Cli::parse_from(["aiflow", "serve"]);
        let Commands::Serve { port, host, otel } = cli.command;
        assert_eq!(port, 8080);
        assert_eq!(host, "127.0.0.1");
        assert!(!otel);
    }
}
