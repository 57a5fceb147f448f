//! claude-relay binary: load config, wire state, serve until ctrl-c.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use relay_server::{AppState, Config, RelayServer};

/// OpenAI-compatible proxy in front of the Anthropic Messages API.
#[derive(Debug, Parser)]
#[command(name = "claude-relay", version)]
struct Args {
    /// Listen host (overrides HOST).
    #[arg(long)]
    host: Option<String>,

    /// Listen port (overrides PORT).
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let mut config = Config::from_env()?;
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }

    init_tracing(config.debug_enabled());

    let state = AppState::from_config(config)?;
    let server = RelayServer::new(state);
    let (addr, handle) = server.listen().await?;
    tracing::info!("claude-relay ready on http://{addr} — open it in a browser to log in");

    let shutdown = server.shutdown().clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("ctrl-c received, shutting down");
            shutdown.shutdown();
        }
    });

    handle.await?;
    Ok(())
}

/// Default to `info` level; `DEBUG` drops it to `debug`. `RUST_LOG` wins
/// over both.
fn init_tracing(debug: bool) {
    let default_filter = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
