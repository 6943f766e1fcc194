use clap::Parser;
use docchat::{api, config, logging, processing, session};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

/// Serve the document Q&A web app.
#[derive(Parser, Debug)]
#[command(name = "docchat", version, about)]
struct Cli {
    /// Port to listen on; overrides SERVER_PORT.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    config::init_config();
    logging::init_tracing();

    let config = config::get_config();
    let startup_credentials = match (&config.gemini_api_key, &config.llama_cloud_api_key) {
        (Some(gemini), Some(llama)) => {
            session::Credentials::new(gemini.as_str(), llama.as_str()).ok()
        }
        _ => None,
    };
    if startup_credentials.is_some() {
        tracing::info!("API keys loaded from environment; new sessions start configured");
    }

    let sessions = Arc::new(session::SessionStore::new(
        startup_credentials,
        Duration::from_secs(config.idle_session_secs),
    ));
    sessions.spawn_sweeper();

    let app = api::create_router(Arc::new(processing::ProcessingService::new()), sessions);

    let (listener, port) = bind_listener(cli.port.or(config.server_port)).await?;
    tracing::info!("Listening on http://0.0.0.0:{}", port);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn bind_listener(port: Option<u16>) -> Result<(TcpListener, u16), std::io::Error> {
    use std::net::Ipv4Addr;

    if let Some(port) = port {
        return TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))
            .await
            .map(|listener| (listener, port));
    }

    const PORT_RANGE: std::ops::RangeInclusive<u16> = 8501..=8599;
    for port in PORT_RANGE {
        match TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await {
            Ok(listener) => {
                tracing::debug!(port, "Bound server port");
                return Ok((listener, port));
            }
            Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => {
                tracing::debug!(port, "Port already in use; trying next");
                continue;
            }
            Err(err) => return Err(err),
        }
    }

    Err(std::io::Error::new(
        std::io::ErrorKind::AddrNotAvailable,
        "No available port found in range 8501-8599",
    ))
}
