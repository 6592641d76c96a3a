use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Fixture server for the users API.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Port to listen on (loopback only).
    #[arg(long, env = "PORT", default_value_t = 3000)]
    port: u16,

    /// Artificial latency of the /slow endpoint, in milliseconds.
    #[arg(long, env = "SLOW_DELAY_MS", default_value_t = 2000)]
    slow_delay_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let addr = format!("127.0.0.1:{}", cli.port);
    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, "listening");

    let config = mock_server::AppConfig {
        slow_delay: Duration::from_millis(cli.slow_delay_ms),
    };
    mock_server::run_with(listener, config).await
}
